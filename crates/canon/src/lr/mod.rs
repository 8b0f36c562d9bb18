//! Canonical LR(1) construction: item sets, the goto graph, the ACTION/GOTO
//! table and the table-driven engine that consumes it.

use std::collections::{HashMap, VecDeque};

use canon_util::make_type_idx;
use petgraph::graph::DiGraph;

use crate::grammar::sets::{LookaheadSets, TermSet};
use crate::grammar::{Grammar, ProdIdx, Symbol, TermIdx, END_MARK};

pub mod engine;
pub mod table;
pub mod tac;

#[cfg(test)]
mod lr_tests;

make_type_idx!(StateIdx, ItemSet);

/// A lookahead is a terminal or the end-of-input marker. The `Ord` impl
/// matches the table column layout (end marker first).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lookahead {
    End,
    Terminal(TermIdx),
}

impl Lookahead {
    /// Column id in the dense ACTION table: end marker 0, terminal t at t+1.
    pub fn column(self) -> usize {
        match self {
            Lookahead::End => 0,
            Lookahead::Terminal(t) => t.index() + 1,
        }
    }

    pub fn from_column(column: usize) -> Lookahead {
        if column == 0 {
            Lookahead::End
        } else {
            Lookahead::Terminal(TermIdx::new(column - 1))
        }
    }

    pub fn render(self, grammar: &Grammar) -> &str {
        match self {
            Lookahead::End => END_MARK,
            Lookahead::Terminal(t) => grammar.terminal_name(t),
        }
    }
}

/// `[A -> α · β, a]`: a production, how far its body has been matched, and
/// one lookahead terminal. Items with the same core but different lookaheads
/// are distinct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lr1Item {
    pub production: ProdIdx,
    pub dot: u32,
    pub lookahead: Lookahead,
}

impl Lr1Item {
    fn next_symbol(self, grammar: &Grammar) -> Option<Symbol> {
        grammar
            .production(self.production)
            .body()
            .get(self.dot as usize)
            .copied()
    }

    fn advanced(self) -> Lr1Item {
        Lr1Item {
            dot: self.dot + 1,
            ..self
        }
    }

    pub fn render(self, grammar: &Grammar) -> String {
        let production = grammar.production(self.production);
        let mut out = format!("{} ->", grammar.nonterminal_name(production.nonterminal()));
        for (i, sym) in production.body().iter().enumerate() {
            if i == self.dot as usize {
                out.push_str(" .");
            }
            out.push(' ');
            out.push_str(grammar.symbol_name(*sym));
        }
        if self.dot as usize == production.len() {
            out.push_str(" .");
        }
        out.push_str(", ");
        out.push_str(self.lookahead.render(grammar));
        out
    }
}

/// A deduplicated item set kept in sorted order, so two states with the same
/// items compare equal (and hash equal) no matter the insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ItemSet {
    items: Vec<Lr1Item>,
}

impl ItemSet {
    fn insert(&mut self, item: Lr1Item) -> bool {
        match self.items.binary_search(&item) {
            Ok(_) => false,
            Err(pos) => {
                self.items.insert(pos, item);
                true
            }
        }
    }

    pub fn items(&self) -> &[Lr1Item] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn render(&self, grammar: &Grammar) -> String {
        self.items
            .iter()
            .map(|item| item.render(grammar))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The canonical LR(1) collection: every reachable item set gets exactly one
/// integer id, and the goto function is recorded per (state, symbol).
#[derive(Debug)]
pub struct Automaton {
    states: Vec<ItemSet>,
    transitions: HashMap<(StateIdx, Symbol), StateIdx>,
}

impl Automaton {
    pub fn build(grammar: &Grammar, sets: &LookaheadSets) -> Automaton {
        let by_nonterminal = grammar.productions_by_nonterminal();

        let mut seed = ItemSet::default();
        seed.insert(Lr1Item {
            production: ProdIdx(0),
            dot: 0,
            lookahead: Lookahead::End,
        });
        let start = closure(grammar, sets, &by_nonterminal, seed);

        let mut states = Vec::new();
        // Dedup by full item-set content; sorted items make the map key
        // canonical, so structurally equal sets always collide here.
        let mut ids: HashMap<ItemSet, StateIdx> = HashMap::new();
        let mut transitions = HashMap::new();
        let mut queue = VecDeque::new();

        let start_id = StateIdx::from_push(&mut states, start.clone());
        ids.insert(start, start_id);
        queue.push_back(start_id);

        // Terminals first, then nonterminals; affects only discovery order,
        // never the resulting collection.
        let symbols: Vec<Symbol> = grammar
            .terminal_symbols()
            .chain(grammar.nonterminal_symbols())
            .collect();

        while let Some(from) = queue.pop_front() {
            for &sym in &symbols {
                let target = goto_set(grammar, sets, &by_nonterminal, &states[from], sym);
                if target.is_empty() {
                    continue;
                }
                let to = match ids.get(&target) {
                    Some(id) => *id,
                    None => {
                        let id = StateIdx::from_push(&mut states, target.clone());
                        ids.insert(target, id);
                        queue.push_back(id);
                        id
                    }
                };
                transitions.insert((from, sym), to);
            }
        }

        Automaton {
            states,
            transitions,
        }
    }

    pub fn states(&self) -> &[ItemSet] {
        &self.states
    }

    pub fn state(&self, id: StateIdx) -> &ItemSet {
        &self.states[id]
    }

    pub fn transition(&self, from: StateIdx, sym: Symbol) -> Option<StateIdx> {
        self.transitions.get(&(from, sym)).copied()
    }

    pub fn transitions(&self) -> impl Iterator<Item = (StateIdx, Symbol, StateIdx)> + '_ {
        self.transitions
            .iter()
            .map(|((from, sym), to)| (*from, *sym, *to))
    }

    /// Graph view of the goto function for GraphViz dot output.
    pub fn to_graph(&self, grammar: &Grammar) -> DiGraph<String, String> {
        let mut graph = DiGraph::new();
        let nodes: Vec<_> = (0..self.states.len())
            .map(|id| graph.add_node(format!("I{}", id)))
            .collect();
        let mut edges: Vec<_> = self.transitions().collect();
        edges.sort();
        for (from, sym, to) in edges {
            graph.add_edge(
                nodes[from.index()],
                nodes[to.index()],
                grammar.symbol_name(sym).to_owned(),
            );
        }
        graph
    }
}

/// Saturates an item set: for every `[A -> α · B β, a]` with B a
/// nonterminal, adds `[B -> · γ, b]` for every production of B and every b
/// in FIRST(βa), until nothing new appears.
fn closure(
    grammar: &Grammar,
    sets: &LookaheadSets,
    by_nonterminal: &[Vec<ProdIdx>],
    seed: ItemSet,
) -> ItemSet {
    let mut result = seed;
    let mut pending: VecDeque<Lr1Item> = result.items.iter().copied().collect();

    while let Some(item) = pending.pop_front() {
        let Some(Symbol::Nonterminal(b)) = item.next_symbol(grammar) else {
            continue;
        };
        let body = grammar.production(item.production).body();
        let beta = &body[item.dot as usize + 1..];

        let mut tail = TermSet::new(grammar.n_terminals());
        match item.lookahead {
            Lookahead::End => tail.insert_end(),
            Lookahead::Terminal(t) => tail.insert_terminal(t),
        };
        let first = sets.sequence_first(grammar, beta, Some(&tail));

        for production in &by_nonterminal[b.index()] {
            let mut add = |lookahead| {
                let item = Lr1Item {
                    production: *production,
                    dot: 0,
                    lookahead,
                };
                if result.insert(item) {
                    pending.push_back(item);
                }
            };
            for t in first.terminals() {
                add(Lookahead::Terminal(t));
            }
            if first.contains_end() {
                add(Lookahead::End);
            }
        }
    }
    result
}

/// Moves the dot over `sym` in every item that expects it, then closes the
/// result. An empty result means no transition on `sym`.
fn goto_set(
    grammar: &Grammar,
    sets: &LookaheadSets,
    by_nonterminal: &[Vec<ProdIdx>],
    from: &ItemSet,
    sym: Symbol,
) -> ItemSet {
    let mut moved = ItemSet::default();
    for item in from.items() {
        if item.next_symbol(grammar) == Some(sym) {
            moved.insert(item.advanced());
        }
    }
    if moved.is_empty() {
        moved
    } else {
        closure(grammar, sets, by_nonterminal, moved)
    }
}
