//! Three-address-code emission as a semantic layer over the parse engine.

use std::fmt;

use crate::grammar::{Grammar, ProdIdx, Production, Symbol, TermIdx};

use super::engine::Semantics;

/// One flat instruction: an operator, up to two operand places and a result
/// place. Unused slots stay empty; no optimization is ever applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quad {
    pub op: String,
    pub arg1: String,
    pub arg2: String,
    pub result: String,
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.op, self.arg1, self.arg2, self.result
        )
    }
}

/// Attribute evaluator for assignment-style grammars: every value is a
/// `place` (a variable name or temporary) and reductions append quadruples
/// to the instruction log.
///
/// Productions are handled by shape rather than by hard-coded index:
/// - `A -> X op Y` with a terminal `op` in the middle emits
///   `(op, Y.place, -, X.place)`, the assignment form;
/// - `A -> op X` with a leading terminal emits `(op, X.place, -, t)` into a
///   fresh temporary `t`, which becomes the synthesized place;
/// - a single-symbol body propagates its child's place;
/// - a shifted terminal's place is its own spelling.
///
/// Temporaries `t0, t1, ...` come from a counter owned by this translator,
/// so concurrent parses never share numbering.
#[derive(Debug, Default)]
pub struct Translator {
    quads: Vec<Quad>,
    next_temp: u32,
}

impl Translator {
    pub fn new() -> Translator {
        Translator::default()
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    pub fn into_quads(self) -> Vec<Quad> {
        self.quads
    }

    fn new_temp(&mut self) -> String {
        let name = format!("t{}", self.next_temp);
        self.next_temp += 1;
        name
    }

    fn emit(&mut self, op: &str, arg1: String, arg2: String, result: String) {
        self.quads.push(Quad {
            op: op.to_owned(),
            arg1,
            arg2,
            result,
        });
    }
}

impl Semantics for Translator {
    type Value = String;

    fn shift(&mut self, grammar: &Grammar, terminal: TermIdx) -> String {
        grammar.terminal_name(terminal).to_owned()
    }

    fn reduce(
        &mut self,
        grammar: &Grammar,
        production: ProdIdx,
        mut children: Vec<String>,
    ) -> String {
        let production = grammar.production(production);
        match production {
            // A -> X op Y: store Y's place into X's place.
            Production::Nonempty(_, body)
                if body.len() == 3 && matches!(body[1], Symbol::Terminal(_)) =>
            {
                let Symbol::Terminal(op) = body[1] else {
                    unreachable!()
                };
                let rhs = children.pop().unwrap_or_default();
                children.pop();
                let lhs = children.pop().unwrap_or_default();
                self.emit(grammar.terminal_name(op), rhs, String::new(), lhs.clone());
                lhs
            }
            // A -> op X: apply the operator, landing in a fresh temporary.
            Production::Nonempty(_, body)
                if body.len() == 2 && matches!(body[0], Symbol::Terminal(_)) =>
            {
                let Symbol::Terminal(op) = body[0] else {
                    unreachable!()
                };
                let operand = children.pop().unwrap_or_default();
                let temp = self.new_temp();
                self.emit(grammar.terminal_name(op), operand, String::new(), temp.clone());
                temp
            }
            // Unit productions (and the augmented start) propagate.
            _ => children.pop().unwrap_or_default(),
        }
    }
}
