use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grammar::{Grammar, NontermIdx, ProdIdx, Symbol};

use super::{Automaton, Lookahead, StateIdx};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Shift(StateIdx),
    Reduce(ProdIdx),
    Accept,
}

impl Action {
    pub fn render(self) -> String {
        match self {
            Action::Shift(j) => format!("s{}", j),
            Action::Reduce(p) => format!("r{}", p),
            Action::Accept => "acc".to_owned(),
        }
    }
}

/// Two different legal actions computed for one (state, lookahead) cell.
/// The first-written action stays in the table; the collision is recorded
/// instead of guessed away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub state: StateIdx,
    pub lookahead: Lookahead,
    pub existing: Action,
    pub proposed: Action,
}

impl Conflict {
    pub fn render(&self, grammar: &Grammar) -> String {
        format!(
            "state {}, lookahead {}: {} vs {}",
            self.state,
            self.lookahead.render(grammar),
            self.existing.render(),
            self.proposed.render()
        )
    }
}

/// Dense ACTION/GOTO table. Rows are automaton states; ACTION columns are
/// the end marker followed by the terminals, GOTO columns are the
/// nonterminals. A missing entry is an explicit `None`, never an absent map
/// key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseTable {
    n_states: usize,
    n_terminals: usize,
    n_nonterminals: usize,
    n_productions: usize,
    actions: Vec<Option<Action>>,
    gotos: Vec<Option<StateIdx>>,
}

impl ParseTable {
    pub(crate) fn empty(
        n_states: usize,
        n_terminals: usize,
        n_nonterminals: usize,
        n_productions: usize,
    ) -> ParseTable {
        ParseTable {
            n_states,
            n_terminals,
            n_nonterminals,
            n_productions,
            actions: vec![None; n_states * (n_terminals + 1)],
            gotos: vec![None; n_states * n_nonterminals],
        }
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn action(&self, state: StateIdx, lookahead: Lookahead) -> Option<Action> {
        self.actions[state.index() * (self.n_terminals + 1) + lookahead.column()]
    }

    pub fn goto(&self, state: StateIdx, nonterminal: NontermIdx) -> Option<StateIdx> {
        self.gotos[state.index() * self.n_nonterminals + nonterminal.index()]
    }

    pub(crate) fn set_action(&mut self, state: StateIdx, lookahead: Lookahead, action: Action) {
        self.actions[state.index() * (self.n_terminals + 1) + lookahead.column()] = Some(action);
    }

    pub(crate) fn set_goto(&mut self, state: StateIdx, nonterminal: NontermIdx, to: StateIdx) {
        self.gotos[state.index() * self.n_nonterminals + nonterminal.index()] = Some(to);
    }

    /// Flat entry-list form of the table, sufficient to rebuild it without
    /// re-running construction. Actions are flattened to a `(tag, target)`
    /// integer pair so every entry has the same width on the wire.
    pub fn to_artifact(&self) -> TableArtifact {
        let mut actions = Vec::new();
        for state in 0..self.n_states {
            for column in 0..=self.n_terminals {
                if let Some(action) = self.actions[state * (self.n_terminals + 1) + column] {
                    let (tag, target) = match action {
                        Action::Shift(j) => (TAG_SHIFT, j.0),
                        Action::Reduce(p) => (TAG_REDUCE, p.0),
                        Action::Accept => (TAG_ACCEPT, 0),
                    };
                    actions.push(ActionEntry {
                        state: state as u32,
                        column: column as u32,
                        tag,
                        target,
                    });
                }
            }
        }
        let mut gotos = Vec::new();
        for state in 0..self.n_states {
            for nonterminal in 0..self.n_nonterminals {
                if let Some(to) = self.gotos[state * self.n_nonterminals + nonterminal] {
                    gotos.push(GotoEntry {
                        state: state as u32,
                        nonterminal: nonterminal as u32,
                        to: to.0,
                    });
                }
            }
        }
        TableArtifact {
            n_states: self.n_states as u32,
            n_terminals: self.n_terminals as u32,
            n_nonterminals: self.n_nonterminals as u32,
            n_productions: self.n_productions as u32,
            actions,
            gotos,
        }
    }

    /// Rebuilds a table, rejecting any entry whose coordinates or action
    /// payload fall outside the declared dimensions. Nothing loaded from
    /// bytes may index past a table row or the production list.
    pub fn from_artifact(artifact: &TableArtifact) -> Result<ParseTable, ArtifactError> {
        let mut table = ParseTable::empty(
            artifact.n_states as usize,
            artifact.n_terminals as usize,
            artifact.n_nonterminals as usize,
            artifact.n_productions as usize,
        );
        for entry in &artifact.actions {
            if entry.state >= artifact.n_states || entry.column > artifact.n_terminals {
                return Err(ArtifactError::EntryOutOfRange);
            }
            let action = match entry.tag {
                TAG_SHIFT if entry.target < artifact.n_states => Action::Shift(StateIdx(entry.target)),
                TAG_REDUCE if entry.target < artifact.n_productions => {
                    Action::Reduce(ProdIdx(entry.target))
                }
                TAG_SHIFT | TAG_REDUCE => return Err(ArtifactError::EntryOutOfRange),
                TAG_ACCEPT => Action::Accept,
                _ => return Err(ArtifactError::BadActionTag),
            };
            table.set_action(
                StateIdx(entry.state),
                Lookahead::from_column(entry.column as usize),
                action,
            );
        }
        for entry in &artifact.gotos {
            if entry.state >= artifact.n_states
                || entry.nonterminal >= artifact.n_nonterminals
                || entry.to >= artifact.n_states
            {
                return Err(ArtifactError::EntryOutOfRange);
            }
            table.set_goto(
                StateIdx(entry.state),
                NontermIdx(entry.nonterminal),
                StateIdx(entry.to),
            );
        }
        Ok(table)
    }

    pub fn compile_table(&self) -> Result<Vec<u8>, ArtifactError> {
        let bytes = serde_binary::to_vec(&self.to_artifact(), serde_binary::binary_stream::Endian::Little)?;
        Ok(bytes)
    }

    pub fn load_table(bytes: &[u8]) -> Result<ParseTable, ArtifactError> {
        let artifact: TableArtifact =
            serde_binary::from_slice(bytes, serde_binary::binary_stream::Endian::Little)?;
        ParseTable::from_artifact(&artifact)
    }
}

pub const TAG_SHIFT: u32 = 0;
pub const TAG_REDUCE: u32 = 1;
pub const TAG_ACCEPT: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionEntry {
    pub state: u32,
    pub column: u32,
    pub tag: u32,
    pub target: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GotoEntry {
    pub state: u32,
    pub nonterminal: u32,
    pub to: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TableArtifact {
    pub n_states: u32,
    pub n_terminals: u32,
    pub n_nonterminals: u32,
    pub n_productions: u32,
    pub actions: Vec<ActionEntry>,
    pub gotos: Vec<GotoEntry>,
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("table artifact entry out of range")]
    EntryOutOfRange,
    #[error("unrecognized action tag in table artifact")]
    BadActionTag,
    #[error("table artifact encoding failed")]
    Encoding(#[from] serde_binary::Error),
}

/// Result of table synthesis. Conflicts do not abort the walk; they are all
/// collected, and their presence marks the table as outside the LR(1) class
/// (a deterministic parse must not use it).
#[derive(Debug)]
pub struct TableBuild {
    pub table: ParseTable,
    pub conflicts: Vec<Conflict>,
}

impl TableBuild {
    pub fn is_lr1(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Walks every automaton state once: shift entries from terminal
    /// transitions, reduce/accept entries from completed items, GOTO entries
    /// from nonterminal transitions.
    pub fn synthesize(grammar: &Grammar, automaton: &Automaton) -> TableBuild {
        let mut table = ParseTable::empty(
            automaton.states().len(),
            grammar.n_terminals(),
            grammar.n_nonterminals(),
            grammar.productions().len(),
        );
        let mut conflicts = Vec::new();

        let mut set_action = |table: &mut ParseTable, state, lookahead, action| {
            match table.action(state, lookahead) {
                Some(existing) if existing != action => conflicts.push(Conflict {
                    state,
                    lookahead,
                    existing,
                    proposed: action,
                }),
                Some(_) => {}
                None => table.set_action(state, lookahead, action),
            }
        };

        for (id, state) in automaton.states().iter().enumerate() {
            let k = StateIdx::new(id);

            for item in state.items() {
                match item.next_symbol(grammar) {
                    Some(Symbol::Terminal(a)) => {
                        if let Some(j) = automaton.transition(k, Symbol::Terminal(a)) {
                            set_action(&mut table, k, Lookahead::Terminal(a), Action::Shift(j));
                        }
                    }
                    Some(Symbol::Nonterminal(_)) => {}
                    None => {
                        let lhs = grammar.production(item.production).nonterminal();
                        if lhs == grammar.augmented_start() && item.lookahead == Lookahead::End {
                            set_action(&mut table, k, Lookahead::End, Action::Accept);
                        } else {
                            set_action(
                                &mut table,
                                k,
                                item.lookahead,
                                Action::Reduce(item.production),
                            );
                        }
                    }
                }
            }

            for nt in grammar.nonterminal_symbols() {
                if let (Symbol::Nonterminal(a), Some(j)) = (nt, automaton.transition(k, nt)) {
                    table.set_goto(k, a, j);
                }
            }
        }

        TableBuild { table, conflicts }
    }
}
