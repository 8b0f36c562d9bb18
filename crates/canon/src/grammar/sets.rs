use bit_set::BitSet;

use super::{Grammar, NontermIdx, Production, Symbol, TermIdx, EMPTY_MARK, END_MARK};

/// A set of terminals plus the two reserved sentinels. Backed by a `BitSet`
/// with |VT| + 2 slots: terminal t at slot t, the end marker at |VT|, the
/// empty marker at |VT| + 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermSet {
    data: BitSet,
    n_terminals: usize,
}

impl TermSet {
    pub fn new(n_terminals: usize) -> TermSet {
        TermSet {
            data: BitSet::with_capacity(n_terminals + 2),
            n_terminals,
        }
    }

    pub fn insert_terminal(&mut self, terminal: TermIdx) -> bool {
        self.data.insert(terminal.index())
    }

    pub fn insert_end(&mut self) -> bool {
        self.data.insert(self.n_terminals)
    }

    pub fn insert_empty(&mut self) -> bool {
        self.data.insert(self.n_terminals + 1)
    }

    pub fn contains_terminal(&self, terminal: TermIdx) -> bool {
        self.data.contains(terminal.index())
    }

    pub fn contains_end(&self) -> bool {
        self.data.contains(self.n_terminals)
    }

    pub fn contains_empty(&self) -> bool {
        self.data.contains(self.n_terminals + 1)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Unions in every member of `other` except the empty marker. Returns
    /// whether the set grew.
    pub fn union_without_empty(&mut self, other: &TermSet) -> bool {
        let before = self.data.len();
        let had_empty = self.contains_empty();
        self.data.union_with(&other.data);
        if !had_empty {
            self.data.remove(self.n_terminals + 1);
        }
        self.data.len() > before
    }

    /// Unions in all of `other`, empty marker included. Returns whether the
    /// set grew.
    pub fn union_with(&mut self, other: &TermSet) -> bool {
        let before = self.data.len();
        self.data.union_with(&other.data);
        self.data.len() > before
    }

    /// Iterates the terminal members; the sentinels are reported through
    /// [`TermSet::contains_end`] / [`TermSet::contains_empty`] instead.
    pub fn terminals(&self) -> impl Iterator<Item = TermIdx> + '_ {
        let n = self.n_terminals;
        self.data
            .iter()
            .filter(move |slot| *slot < n)
            .map(TermIdx::new)
    }

    pub fn render(&self, grammar: &Grammar) -> String {
        let mut names: Vec<&str> = self
            .terminals()
            .map(|t| grammar.terminal_name(t))
            .collect();
        if self.contains_end() {
            names.push(END_MARK);
        }
        if self.contains_empty() {
            names.push(EMPTY_MARK);
        }
        format!("{{ {} }}", names.join(" "))
    }
}

/// Converged FIRST/FOLLOW sets for one grammar. Both families are computed
/// by full passes over the production list until nothing grows; the sets
/// only ever grow and are bounded by the terminal alphabet, so the loops
/// terminate.
#[derive(Debug, PartialEq, Eq)]
pub struct LookaheadSets {
    nullable: Vec<bool>,
    first: Vec<TermSet>,
    follow: Vec<TermSet>,
}

impl LookaheadSets {
    pub fn compute(grammar: &Grammar) -> LookaheadSets {
        let nullable = compute_nullable(grammar);
        let first = compute_first(grammar, &nullable);
        let follow = compute_follow(grammar, &nullable, &first);
        LookaheadSets {
            nullable,
            first,
            follow,
        }
    }

    pub fn nullable(&self, nonterminal: NontermIdx) -> bool {
        self.nullable[nonterminal.index()]
    }

    pub fn first(&self, nonterminal: NontermIdx) -> &TermSet {
        &self.first[nonterminal.index()]
    }

    pub fn follow(&self, nonterminal: NontermIdx) -> &TermSet {
        &self.follow[nonterminal.index()]
    }

    /// FIRST of one symbol: a terminal's FIRST is itself.
    pub fn symbol_first(&self, grammar: &Grammar, sym: Symbol) -> TermSet {
        match sym {
            Symbol::Terminal(t) => {
                let mut set = TermSet::new(grammar.n_terminals());
                set.insert_terminal(t);
                set
            }
            Symbol::Nonterminal(nt) => self.first[nt.index()].clone(),
        }
    }

    /// FIRST of a symbol sequence, scanning left to right and stopping at
    /// the first non-nullable symbol. If the whole sequence is nullable the
    /// result gains `tail` when given (the closure case, FIRST(βa)) or the
    /// empty marker otherwise.
    pub fn sequence_first(
        &self,
        grammar: &Grammar,
        symbols: &[Symbol],
        tail: Option<&TermSet>,
    ) -> TermSet {
        let mut result = TermSet::new(grammar.n_terminals());
        for sym in symbols {
            match sym {
                Symbol::Terminal(t) => {
                    result.insert_terminal(*t);
                    return result;
                }
                Symbol::Nonterminal(nt) => {
                    result.union_without_empty(&self.first[nt.index()]);
                    if !self.nullable[nt.index()] {
                        return result;
                    }
                }
            }
        }
        match tail {
            Some(tail) => {
                result.union_with(tail);
            }
            None => {
                result.insert_empty();
            }
        }
        result
    }

    /// SELECT sets for LL-style table construction; unused by the LR path.
    pub fn select_sets(&self, grammar: &Grammar) -> Vec<TermSet> {
        grammar
            .productions()
            .iter()
            .map(|p| self.select(grammar, p))
            .collect()
    }

    fn select(&self, grammar: &Grammar, production: &Production) -> TermSet {
        let first = self.sequence_first(grammar, production.body(), None);
        let mut result = TermSet::new(grammar.n_terminals());
        result.union_without_empty(&first);
        if first.contains_empty() {
            result.union_with(&self.follow[production.nonterminal().index()]);
        }
        result
    }
}

fn compute_nullable(grammar: &Grammar) -> Vec<bool> {
    let mut nullable = vec![false; grammar.n_nonterminals()];
    loop {
        let mut changed = false;
        for production in grammar.productions() {
            let all_nullable = production.body().iter().all(|sym| match sym {
                Symbol::Terminal(_) => false,
                Symbol::Nonterminal(nt) => nullable[nt.index()],
            });
            if all_nullable {
                let nt = production.nonterminal().index();
                changed |= !nullable[nt];
                nullable[nt] = true;
            }
        }
        if !changed {
            break;
        }
    }
    nullable
}

fn compute_first(grammar: &Grammar, nullable: &[bool]) -> Vec<TermSet> {
    let mut first = vec![TermSet::new(grammar.n_terminals()); grammar.n_nonterminals()];
    loop {
        let mut changed = false;
        for production in grammar.productions() {
            let mut buf = TermSet::new(grammar.n_terminals());
            let mut all_nullable = true;
            for sym in production.body() {
                match sym {
                    Symbol::Terminal(t) => {
                        buf.insert_terminal(*t);
                        all_nullable = false;
                        break;
                    }
                    Symbol::Nonterminal(nt) => {
                        buf.union_without_empty(&first[nt.index()]);
                        if !nullable[nt.index()] {
                            all_nullable = false;
                            break;
                        }
                    }
                }
            }
            if all_nullable {
                buf.insert_empty();
            }
            changed |= first[production.nonterminal().index()].union_with(&buf);
        }
        if !changed {
            break;
        }
    }
    first
}

fn compute_follow(grammar: &Grammar, nullable: &[bool], first: &[TermSet]) -> Vec<TermSet> {
    let mut follow = vec![TermSet::new(grammar.n_terminals()); grammar.n_nonterminals()];
    // The end marker follows both the declared start and its augmented alias.
    follow[grammar.augmented_start().index()].insert_end();
    follow[grammar.start().index()].insert_end();

    loop {
        let mut changed = false;
        for production in grammar.productions() {
            let lhs = production.nonterminal().index();
            let body = production.body();
            for (i, sym) in body.iter().enumerate() {
                let Symbol::Nonterminal(b) = sym else { continue };
                let beta = &body[i + 1..];

                let mut beta_first = TermSet::new(grammar.n_terminals());
                let mut beta_nullable = true;
                for sym in beta {
                    match sym {
                        Symbol::Terminal(t) => {
                            beta_first.insert_terminal(*t);
                            beta_nullable = false;
                            break;
                        }
                        Symbol::Nonterminal(nt) => {
                            beta_first.union_without_empty(&first[nt.index()]);
                            if !nullable[nt.index()] {
                                beta_nullable = false;
                                break;
                            }
                        }
                    }
                }

                changed |= follow[b.index()].union_without_empty(&beta_first);
                if beta_nullable {
                    let lhs_follow = follow[lhs].clone();
                    changed |= follow[b.index()].union_with(&lhs_follow);
                }
            }
        }
        if !changed {
            break;
        }
    }
    follow
}
