pub mod grammar;
pub mod lr;

pub use grammar::{Grammar, GrammarError, Production, Symbol};
pub use lr::engine::{parse, ParseError, ParseOutcome, Recognize, Semantics, Verdict};
pub use lr::table::{Action, ParseTable, TableBuild};
pub use lr::Automaton;
