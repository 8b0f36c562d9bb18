// Shared helpers for the canon crates.

/// Declares a typed index over a `Vec<$type_name>`, so state ids, production
/// ids and friends cannot be mixed up or indexed into the wrong table.
///
/// The consuming crate must have `serde` (with the `derive` feature) in its
/// dependency table; the generated ids serialize as plain integers so they
/// can appear inside persisted table artifacts.
#[macro_export]
macro_rules! make_type_idx {
    ($type_idx_name:tt, $type_name:ty) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $type_idx_name(pub u32);

        impl $type_idx_name {
            pub fn new(idx: usize) -> $type_idx_name {
                $type_idx_name(idx as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub fn from_push(vec: &mut Vec<$type_name>, val: $type_name) -> $type_idx_name {
                let idx = $type_idx_name(vec.len() as u32);
                vec.push(val);
                idx
            }
        }

        impl std::fmt::Display for $type_idx_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::ops::Index<$type_idx_name> for [$type_name] {
            type Output = $type_name;

            fn index(&self, index: $type_idx_name) -> &Self::Output {
                &self[index.index()]
            }
        }

        impl std::ops::Index<$type_idx_name> for Vec<$type_name> {
            type Output = $type_name;

            fn index(&self, index: $type_idx_name) -> &Self::Output {
                self.as_slice().index(index)
            }
        }
    };
}
