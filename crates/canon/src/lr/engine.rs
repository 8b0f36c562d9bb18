use thiserror::Error;

use crate::grammar::{Grammar, ProdIdx, TermIdx, END_MARK};

use super::table::{Action, ParseTable};
use super::{Lookahead, StateIdx};

/// Per-production attribute evaluation. `shift` synthesizes the value pushed
/// for a consumed terminal; `reduce` folds the popped child values (in
/// left-to-right body order) into the value pushed for the left-hand side.
pub trait Semantics {
    type Value;

    fn shift(&mut self, grammar: &Grammar, terminal: TermIdx) -> Self::Value;

    fn reduce(
        &mut self,
        grammar: &Grammar,
        production: ProdIdx,
        children: Vec<Self::Value>,
    ) -> Self::Value;
}

/// Value-less semantics for plain accept/reject runs.
pub struct Recognize;

impl Semantics for Recognize {
    type Value = ();

    fn shift(&mut self, _: &Grammar, _: TermIdx) {}

    fn reduce(&mut self, _: &Grammar, _: ProdIdx, _: Vec<()>) {}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Token name outside the grammar's VT; rejected before any stack work.
    #[error("unknown terminal `{0}`")]
    UnknownTerminal(String),
    /// The table or engine is broken. Never caused by input; an input
    /// problem surfaces as [`Verdict::Rejected`] instead.
    #[error("internal inconsistency: {0}")]
    Internal(#[from] InternalFault),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InternalFault {
    #[error("no GOTO entry for state {state}, nonterminal {nonterminal} after reduce")]
    MissingGoto { state: StateIdx, nonterminal: u32 },
    #[error("reduce popped through the bottom of the stack in state {state}")]
    StackUnderflow { state: StateIdx },
    #[error("{count} reduces without a shift in state {state}; table loops")]
    ReduceLoop { state: StateIdx, count: usize },
    #[error("shift action recorded under the end marker in state {state}")]
    ShiftOnEndMarker { state: StateIdx },
}

/// Where a rejected parse stopped: the live state, the lookahead that had no
/// action, and how many tokens had been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub state: StateIdx,
    pub lookahead: Lookahead,
    pub consumed: usize,
}

#[derive(Debug)]
pub enum Verdict<V> {
    Accepted(V),
    Rejected(Rejection),
}

impl<V> Verdict<V> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

/// One step's observable record: the stack, the unread input and the chosen
/// action, all rendered at the moment the action was taken.
#[derive(Debug, Clone)]
pub struct TraceStep {
    pub stack: String,
    pub input: String,
    pub action: String,
}

#[derive(Debug)]
pub struct ParseOutcome<V> {
    pub verdict: Verdict<V>,
    pub trace: Vec<TraceStep>,
    /// Grammar symbols left on the stack at the end, bottom first; the
    /// bottom end marker is always present.
    pub final_stack: Vec<String>,
}

// State, symbol and semantic value travel as one frame, so the three logical
// stacks can never go out of step.
struct Frame<V> {
    state: StateIdx,
    symbol: String,
    value: Option<V>,
}

/// Drives the ACTION/GOTO table over one token sequence. `tokens` are
/// terminal names; a trailing end marker is optional. The engine owns all of
/// its state, so concurrent parses over one shared table need no
/// coordination.
pub fn parse<S: Semantics>(
    grammar: &Grammar,
    table: &ParseTable,
    semantics: &mut S,
    tokens: &[&str],
) -> Result<ParseOutcome<S::Value>, ParseError> {
    // Resolve the whole input up front: an unknown name fails the call
    // before any stack manipulation.
    let mut input: Vec<(Lookahead, Option<TermIdx>)> = Vec::with_capacity(tokens.len() + 1);
    for token in tokens {
        if *token == END_MARK {
            break;
        }
        let t = grammar
            .terminal(token)
            .ok_or_else(|| ParseError::UnknownTerminal((*token).to_owned()))?;
        input.push((Lookahead::Terminal(t), Some(t)));
    }
    input.push((Lookahead::End, None));

    let mut stack: Vec<Frame<S::Value>> = vec![Frame {
        state: StateIdx(0),
        symbol: END_MARK.to_owned(),
        value: None,
    }];
    let mut trace = Vec::new();
    let mut cursor = 0;

    // A healthy table reduces at most a bounded number of times between two
    // shifts; past this the table itself is looping.
    let reduce_cap = table.n_states() * grammar.productions().len() + 1;
    let mut reduces_since_shift = 0;

    let verdict = loop {
        let state = stack.last().expect("bottom frame is never popped").state;
        let (lookahead, terminal) = input[cursor];

        let action = table.action(state, lookahead);
        trace.push(TraceStep {
            stack: render_stack(&stack),
            input: render_input(grammar, &input[cursor..]),
            action: action.map(Action::render).unwrap_or_default(),
        });

        let Some(action) = action else {
            break Verdict::Rejected(Rejection {
                state,
                lookahead,
                consumed: cursor,
            });
        };

        match action {
            Action::Shift(j) => {
                let Some(t) = terminal else {
                    return Err(InternalFault::ShiftOnEndMarker { state }.into());
                };
                let value = semantics.shift(grammar, t);
                stack.push(Frame {
                    state: j,
                    symbol: grammar.terminal_name(t).to_owned(),
                    value: Some(value),
                });
                cursor += 1;
                reduces_since_shift = 0;
            }
            Action::Reduce(p) => {
                reduces_since_shift += 1;
                if reduces_since_shift > reduce_cap {
                    return Err(InternalFault::ReduceLoop {
                        state,
                        count: reduces_since_shift,
                    }
                    .into());
                }

                let production = grammar.production(p);
                let n = production.len();
                if stack.len() < n + 1 {
                    return Err(InternalFault::StackUnderflow { state }.into());
                }
                let children: Vec<S::Value> = stack
                    .drain(stack.len() - n..)
                    .map(|frame| frame.value.ok_or(InternalFault::StackUnderflow { state }))
                    .collect::<Result<_, _>>()?;
                let value = semantics.reduce(grammar, p, children);

                let lhs = production.nonterminal();
                let top = stack.last().expect("bottom frame is never popped").state;
                // The synthesizer records a GOTO for every reachable
                // reduction; a miss here is a construction bug, not bad
                // input.
                let Some(to) = table.goto(top, lhs) else {
                    return Err(InternalFault::MissingGoto {
                        state: top,
                        nonterminal: lhs.0,
                    }
                    .into());
                };
                stack.push(Frame {
                    state: to,
                    symbol: grammar.nonterminal_name(lhs).to_owned(),
                    value: Some(value),
                });
            }
            Action::Accept => {
                let value = stack
                    .last_mut()
                    .and_then(|frame| frame.value.take())
                    .ok_or(InternalFault::StackUnderflow { state })?;
                break Verdict::Accepted(value);
            }
        }
    };

    Ok(ParseOutcome {
        final_stack: stack.iter().map(|frame| frame.symbol.clone()).collect(),
        verdict,
        trace,
    })
}

fn render_stack<V>(stack: &[Frame<V>]) -> String {
    let mut out = String::new();
    for frame in stack {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&frame.symbol);
        out.push(' ');
        out.push_str(&frame.state.to_string());
    }
    out
}

fn render_input(grammar: &Grammar, rest: &[(Lookahead, Option<TermIdx>)]) -> String {
    rest.iter()
        .map(|(lookahead, _)| lookahead.render(grammar))
        .collect::<Vec<_>>()
        .join(" ")
}
