use std::collections::HashMap;
use std::fmt;

use canon_util::make_type_idx;
use thiserror::Error;

pub mod sets;

/// End-of-input marker as it appears in grammar, token and table files.
pub const END_MARK: &str = "#";
/// Stands for the empty string on a production's right-hand side.
pub const EMPTY_MARK: &str = "ε";
/// Production separator in the flat grammar format.
const ARROW: &str = "->";

make_type_idx!(TermIdx, String);
make_type_idx!(NontermIdx, String);
make_type_idx!(ProdIdx, Production);

/// Grammar symbols are compact indices into the owning [`Grammar`]; two
/// symbols are the same symbol exactly when their kind and index agree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    Terminal(TermIdx),
    Nonterminal(NontermIdx),
}

/// A production either derives the empty string or a non-empty body.
/// Identity is the production's index in [`Grammar::productions`]; nothing
/// downstream ever copies a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Production {
    Empty(NontermIdx),
    Nonempty(NontermIdx, Vec<Symbol>),
}

impl Production {
    pub fn nonterminal(&self) -> NontermIdx {
        match self {
            Production::Empty(nt) => *nt,
            Production::Nonempty(nt, _) => *nt,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Production::Empty(_) => 0,
            Production::Nonempty(_, rhs) => rhs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Production::Empty(_))
    }

    pub fn body(&self) -> &[Symbol] {
        match self {
            Production::Empty(_) => &[],
            Production::Nonempty(_, rhs) => rhs,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("expected a count, found `{0}`")]
    BadCount(String),
    #[error("declared {declared} {kind} symbols but listed {listed}")]
    CountMismatch {
        kind: &'static str,
        declared: usize,
        listed: usize,
    },
    #[error("symbol `{0}` declared twice")]
    DuplicateSymbol(String),
    #[error("reserved marker `{0}` cannot be declared as a grammar symbol")]
    ReservedSymbol(String),
    #[error("production `{0}` is missing the `->` separator")]
    MissingArrow(String),
    #[error("production {0} has no left-hand side")]
    MissingLhs(usize),
    #[error("left-hand side `{0}` is not a declared nonterminal")]
    BadLhs(String),
    #[error("production {production} references undeclared symbol `{symbol}`")]
    UndeclaredSymbol { production: usize, symbol: String },
    #[error("empty marker may only stand alone on a right-hand side")]
    MisplacedEmptyMark,
    #[error("start symbol `{0}` is not a declared nonterminal")]
    BadStartSymbol(String),
    #[error("missing start symbol after production list")]
    MissingStartSymbol,
    #[error("first production must be the augmented start `S' -> S`, found `{0}`")]
    BadAugmentedStart(String),
    #[error("unexpected trailing input `{0}`")]
    TrailingInput(String),
}

/// An immutable context-free grammar in augmented form: nonterminal 0 is the
/// augmented start symbol S' and production 0 is `S' -> S`.
#[derive(Debug)]
pub struct Grammar {
    nonterminals: Vec<String>,
    terminals: Vec<String>,
    productions: Vec<Production>,
    start: NontermIdx,
    nonterm_ids: HashMap<String, NontermIdx>,
    term_ids: HashMap<String, TermIdx>,
}

impl Grammar {
    /// Parses the flat counts-based grammar format:
    ///
    /// ```text
    /// <nVN>
    /// <VN names>
    /// <nVT>
    /// <VT names>
    /// <nP>
    /// lhs -> sym sym ...      (ε alone for an empty production)
    /// ...
    /// <start symbol>
    /// ```
    pub fn parse(text: &str) -> Result<Grammar, GrammarError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let nonterminals = read_symbol_list(&mut lines, "nonterminal")?;
        let terminals = read_symbol_list(&mut lines, "terminal")?;

        let mut nonterm_ids = HashMap::new();
        for (i, name) in nonterminals.iter().enumerate() {
            check_name(name)?;
            if nonterm_ids.insert(name.clone(), NontermIdx::new(i)).is_some() {
                return Err(GrammarError::DuplicateSymbol(name.clone()));
            }
        }
        let mut term_ids = HashMap::new();
        for (i, name) in terminals.iter().enumerate() {
            check_name(name)?;
            if nonterm_ids.contains_key(name) {
                return Err(GrammarError::DuplicateSymbol(name.clone()));
            }
            if term_ids.insert(name.clone(), TermIdx::new(i)).is_some() {
                return Err(GrammarError::DuplicateSymbol(name.clone()));
            }
        }

        let n_prods = read_count(&mut lines)?;
        let mut productions = Vec::with_capacity(n_prods);
        for i in 0..n_prods {
            let line = lines
                .next()
                .ok_or(GrammarError::CountMismatch {
                    kind: "production",
                    declared: n_prods,
                    listed: i,
                })?
                .trim();
            productions.push(parse_production(line, i, &nonterm_ids, &term_ids)?);
        }

        let start_name = lines
            .next()
            .ok_or(GrammarError::MissingStartSymbol)?
            .trim()
            .to_owned();
        let start = *nonterm_ids
            .get(&start_name)
            .ok_or(GrammarError::BadStartSymbol(start_name))?;

        if let Some(extra) = lines.next() {
            return Err(GrammarError::TrailingInput(extra.trim().to_owned()));
        }

        let grammar = Grammar {
            nonterminals,
            terminals,
            productions,
            start,
            nonterm_ids,
            term_ids,
        };
        grammar.check_augmented_start()?;
        Ok(grammar)
    }

    // Nonterminal 0 plays the role of S'; its single production must rewrite
    // to exactly the declared start symbol.
    fn check_augmented_start(&self) -> Result<(), GrammarError> {
        let ok = match self.productions.first() {
            Some(Production::Nonempty(lhs, rhs)) => {
                *lhs == self.augmented_start()
                    && rhs.as_slice() == [Symbol::Nonterminal(self.start)]
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            let rendered = self
                .productions
                .first()
                .map(|p| self.render_production(p))
                .unwrap_or_default();
            Err(GrammarError::BadAugmentedStart(rendered))
        }
    }

    pub fn augmented_start(&self) -> NontermIdx {
        NontermIdx(0)
    }

    pub fn start(&self) -> NontermIdx {
        self.start
    }

    pub fn n_terminals(&self) -> usize {
        self.terminals.len()
    }

    pub fn n_nonterminals(&self) -> usize {
        self.nonterminals.len()
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn production(&self, idx: ProdIdx) -> &Production {
        &self.productions[idx]
    }

    pub fn terminal(&self, name: &str) -> Option<TermIdx> {
        self.term_ids.get(name).copied()
    }

    pub fn nonterminal(&self, name: &str) -> Option<NontermIdx> {
        self.nonterm_ids.get(name).copied()
    }

    pub fn terminal_name(&self, idx: TermIdx) -> &str {
        &self.terminals[idx]
    }

    pub fn nonterminal_name(&self, idx: NontermIdx) -> &str {
        &self.nonterminals[idx]
    }

    pub fn symbol_name(&self, sym: Symbol) -> &str {
        match sym {
            Symbol::Terminal(t) => self.terminal_name(t),
            Symbol::Nonterminal(nt) => self.nonterminal_name(nt),
        }
    }

    pub fn terminal_symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        (0..self.terminals.len()).map(|i| Symbol::Terminal(TermIdx::new(i)))
    }

    pub fn nonterminal_symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        (0..self.nonterminals.len()).map(|i| Symbol::Nonterminal(NontermIdx::new(i)))
    }

    /// Production indices grouped by left-hand nonterminal, so closure does
    /// not rescan the whole production list per item.
    pub fn productions_by_nonterminal(&self) -> Vec<Vec<ProdIdx>> {
        let mut map: Vec<Vec<ProdIdx>> = vec![Vec::new(); self.nonterminals.len()];
        for (i, production) in self.productions.iter().enumerate() {
            map[production.nonterminal().index()].push(ProdIdx::new(i));
        }
        map
    }

    pub fn render_production(&self, production: &Production) -> String {
        let mut out = format!(
            "{} {} ",
            self.nonterminal_name(production.nonterminal()),
            ARROW
        );
        if production.is_empty() {
            out.push_str(EMPTY_MARK);
        } else {
            let body: Vec<&str> = production.body().iter().map(|s| self.symbol_name(*s)).collect();
            out.push_str(&body.join(" "));
        }
        out
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CFG = (VN, VT, P, S)")?;
        writeln!(f, "  VN: {}", self.nonterminals.join(" "))?;
        writeln!(f, "  VT: {}", self.terminals.join(" "))?;
        writeln!(f, "  P:")?;
        for (i, p) in self.productions.iter().enumerate() {
            writeln!(f, "    {}: {}", i, self.render_production(p))?;
        }
        write!(f, "  S: {}", self.nonterminal_name(self.start))
    }
}

fn check_name(name: &str) -> Result<(), GrammarError> {
    if name == END_MARK || name == EMPTY_MARK {
        Err(GrammarError::ReservedSymbol(name.to_owned()))
    } else {
        Ok(())
    }
}

fn read_count<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Result<usize, GrammarError> {
    let line = lines.next().unwrap_or("").trim();
    line.parse()
        .map_err(|_| GrammarError::BadCount(line.to_owned()))
}

fn read_symbol_list<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    kind: &'static str,
) -> Result<Vec<String>, GrammarError> {
    let declared = read_count(lines)?;
    let names: Vec<String> = lines
        .next()
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_owned)
        .collect();
    if names.len() != declared {
        return Err(GrammarError::CountMismatch {
            kind,
            declared,
            listed: names.len(),
        });
    }
    Ok(names)
}

fn parse_production(
    line: &str,
    index: usize,
    nonterm_ids: &HashMap<String, NontermIdx>,
    term_ids: &HashMap<String, TermIdx>,
) -> Result<Production, GrammarError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let arrow = words
        .iter()
        .position(|w| *w == ARROW)
        .ok_or_else(|| GrammarError::MissingArrow(line.to_owned()))?;
    if arrow == 0 {
        return Err(GrammarError::MissingLhs(index));
    }

    let lhs_name = words[0];
    let lhs = *nonterm_ids
        .get(lhs_name)
        .ok_or_else(|| GrammarError::BadLhs(lhs_name.to_owned()))?;

    let body = &words[arrow + 1..];
    if body == [EMPTY_MARK] || body.is_empty() {
        return Ok(Production::Empty(lhs));
    }

    let mut rhs = Vec::with_capacity(body.len());
    for word in body {
        if *word == EMPTY_MARK {
            return Err(GrammarError::MisplacedEmptyMark);
        }
        let sym = if let Some(nt) = nonterm_ids.get(*word) {
            Symbol::Nonterminal(*nt)
        } else if let Some(t) = term_ids.get(*word) {
            Symbol::Terminal(*t)
        } else {
            return Err(GrammarError::UndeclaredSymbol {
                production: index,
                symbol: (*word).to_owned(),
            });
        };
        rhs.push(sym);
    }
    Ok(Production::Nonempty(lhs, rhs))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSIGN: &str = r"
        4
        S' S L R
        3
        = * i
        6
        S' -> S
        S -> L = R
        S -> R
        L -> * R
        L -> i
        R -> L
        S
    ";

    #[test]
    fn parses_assignment_grammar() {
        let g = Grammar::parse(ASSIGN).expect("grammar should parse");
        assert_eq!(g.n_nonterminals(), 4);
        assert_eq!(g.n_terminals(), 3);
        assert_eq!(g.productions().len(), 6);
        assert_eq!(g.start(), g.nonterminal("S").unwrap());
        assert_eq!(g.production(ProdIdx(1)).len(), 3);
        assert_eq!(
            g.render_production(g.production(ProdIdx(3))),
            "L -> * R"
        );
    }

    #[test]
    fn rejects_missing_arrow() {
        let text = ASSIGN.replace("S -> R", "S R");
        assert_eq!(
            Grammar::parse(&text).unwrap_err(),
            GrammarError::MissingArrow("S R".to_owned())
        );
    }

    #[test]
    fn rejects_undeclared_symbol() {
        let text = ASSIGN.replace("L -> i", "L -> j");
        assert_eq!(
            Grammar::parse(&text).unwrap_err(),
            GrammarError::UndeclaredSymbol {
                production: 4,
                symbol: "j".to_owned()
            }
        );
    }

    #[test]
    fn rejects_count_mismatch() {
        let text = ASSIGN.replace("= * i", "= *");
        assert_eq!(
            Grammar::parse(&text).unwrap_err(),
            GrammarError::CountMismatch {
                kind: "terminal",
                declared: 3,
                listed: 2
            }
        );
    }

    #[test]
    fn rejects_bad_augmented_start() {
        let text = ASSIGN.replace("S' -> S", "S' -> L");
        assert!(matches!(
            Grammar::parse(&text).unwrap_err(),
            GrammarError::BadAugmentedStart(_)
        ));
    }

    #[test]
    fn empty_production_round_trips() {
        let text = r"
            2
            S' S
            1
            a
            3
            S' -> S
            S -> a S
            S -> ε
            S
        ";
        let g = Grammar::parse(text).expect("grammar should parse");
        assert!(g.production(ProdIdx(2)).is_empty());
        assert_eq!(g.render_production(g.production(ProdIdx(2))), "S -> ε");
    }
}
