use crate::grammar::sets::LookaheadSets;
use crate::grammar::{Grammar, NontermIdx, ProdIdx, TermIdx};

use super::engine::{parse, InternalFault, ParseError, Recognize, Verdict};
use super::table::{Action, ArtifactError, ParseTable, TableBuild, TAG_REDUCE, TAG_SHIFT};
use super::tac::Translator;
use super::{Automaton, Lookahead, StateIdx};

// Classic assignment grammar: S -> L = R | R, L -> * R | i, R -> L.
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

// Dangling-else shape; not LR(1).
const DANGLING: &str = r"
    2
    S' S
    3
    i e a
    4
    S' -> S
    S -> i S e S
    S -> i S
    S -> a
    S
";

fn pipeline(text: &str) -> (Grammar, Automaton, TableBuild) {
    let grammar = Grammar::parse(text).expect("grammar should parse");
    let sets = LookaheadSets::compute(&grammar);
    let automaton = Automaton::build(&grammar, &sets);
    let build = TableBuild::synthesize(&grammar, &automaton);
    (grammar, automaton, build)
}

#[test]
fn states_are_deduplicated() {
    let (_, automaton, _) = pipeline(ASSIGN);
    let states = automaton.states();
    for (i, a) in states.iter().enumerate() {
        for b in &states[i + 1..] {
            assert_ne!(a, b, "two state ids share one item set");
        }
    }
}

#[test]
fn every_transition_target_is_allocated() {
    let (_, automaton, _) = pipeline(ASSIGN);
    let n = automaton.states().len();
    for (from, _, to) in automaton.transitions() {
        assert!(from.index() < n);
        assert!(to.index() < n);
    }
}

#[test]
fn assignment_grammar_is_lr1() {
    let (_, _, build) = pipeline(ASSIGN);
    assert!(build.is_lr1(), "conflicts: {:?}", build.conflicts);
}

#[test]
fn completed_items_all_have_actions() {
    let (grammar, automaton, build) = pipeline(ASSIGN);
    for (id, state) in automaton.states().iter().enumerate() {
        for item in state.items() {
            if item.next_symbol(&grammar).is_none() {
                let action = build.table.action(StateIdx::new(id), item.lookahead);
                assert!(
                    action.is_some(),
                    "no action for completed item [{}] in I{}",
                    item.render(&grammar),
                    id
                );
            }
        }
    }
}

#[test]
fn shift_actions_follow_the_goto_graph() {
    let (grammar, automaton, build) = pipeline(ASSIGN);
    for (from, sym, to) in automaton.transitions() {
        if let crate::grammar::Symbol::Terminal(t) = sym {
            assert_eq!(
                build.table.action(from, Lookahead::Terminal(t)),
                Some(Action::Shift(to))
            );
        }
    }
}

#[test]
fn artifact_round_trips() {
    let (_, _, build) = pipeline(ASSIGN);
    let rebuilt = ParseTable::from_artifact(&build.table.to_artifact())
        .expect("artifact should reconstruct");
    assert_eq!(rebuilt, build.table);
}

#[test]
fn accepts_assignment() {
    let (grammar, _, build) = pipeline(ASSIGN);
    let outcome = parse(&grammar, &build.table, &mut Recognize, &["i", "=", "i", "#"])
        .expect("parse should run");
    assert!(outcome.verdict.is_accepted());
    // At accept only the bottom marker and the start symbol remain.
    assert_eq!(outcome.final_stack, vec!["#", "S"]);
    assert_eq!(outcome.trace.last().map(|s| s.action.as_str()), Some("acc"));
}

#[test]
fn rejects_double_assign_at_second_equals() {
    let (grammar, _, build) = pipeline(ASSIGN);
    let outcome = parse(&grammar, &build.table, &mut Recognize, &["i", "=", "=", "i", "#"])
        .expect("rejection is not an engine error");
    match outcome.verdict {
        Verdict::Rejected(rejection) => {
            assert_eq!(rejection.consumed, 2);
            assert_eq!(
                rejection.lookahead,
                Lookahead::Terminal(grammar.terminal("=").unwrap())
            );
        }
        Verdict::Accepted(_) => panic!("bad input accepted"),
    }
}

#[test]
fn unknown_terminal_rejected_before_parsing() {
    let (grammar, _, build) = pipeline(ASSIGN);
    let err = parse(&grammar, &build.table, &mut Recognize, &["i", "=", "x"]).unwrap_err();
    assert_eq!(err, ParseError::UnknownTerminal("x".to_owned()));
}

#[test]
fn translation_emits_quadruples() {
    let (grammar, _, build) = pipeline(ASSIGN);
    let mut translator = Translator::new();
    let outcome = parse(&grammar, &build.table, &mut translator, &["*", "i", "=", "i", "#"])
        .expect("parse should run");
    assert!(outcome.verdict.is_accepted());

    let quads = translator.quads();
    assert_eq!(quads.len(), 2);

    // L -> * R lands in a fresh temporary.
    assert_eq!(quads[0].op, "*");
    assert_eq!(quads[0].arg1, "i");
    assert_eq!(quads[0].result, "t0");

    // S -> L = R stores into the temporary produced above.
    assert_eq!(quads[1].op, "=");
    assert_eq!(quads[1].arg1, "i");
    assert_eq!(quads[1].result, quads[0].result);
}

#[test]
fn temporaries_are_scoped_per_translator() {
    let (grammar, _, build) = pipeline(ASSIGN);
    for _ in 0..2 {
        let mut translator = Translator::new();
        parse(&grammar, &build.table, &mut translator, &["*", "i", "=", "i", "#"])
            .expect("parse should run");
        // A fresh translator restarts numbering at t0.
        assert_eq!(translator.quads()[0].result, "t0");
    }
}

#[test]
fn dangling_else_reports_conflicts() {
    let (grammar, _, build) = pipeline(DANGLING);
    assert!(!build.is_lr1());
    assert!(!build.conflicts.is_empty());

    let e = grammar.terminal("e").unwrap();
    let shift_reduce = build.conflicts.iter().any(|c| {
        c.lookahead == Lookahead::Terminal(e)
            && matches!(
                (c.existing, c.proposed),
                (Action::Shift(_), Action::Reduce(_)) | (Action::Reduce(_), Action::Shift(_))
            )
    });
    assert!(shift_reduce, "conflicts: {:?}", build.conflicts);

    // The first-written action stays; nothing is silently overwritten.
    for conflict in &build.conflicts {
        assert_eq!(
            build.table.action(conflict.state, conflict.lookahead),
            Some(conflict.existing)
        );
    }
}

// Pathological grammar for hand-built tables: S -> a | ε.
const LOOPY: &str = r"
    2
    S' S
    1
    a
    3
    S' -> S
    S -> a
    S -> ε
    S
";

#[test]
fn reduce_loop_is_reported_not_hung() {
    let grammar = Grammar::parse(LOOPY).expect("grammar should parse");
    // One state whose only move is reducing S -> ε back into itself.
    let mut table = ParseTable::empty(
        1,
        grammar.n_terminals(),
        grammar.n_nonterminals(),
        grammar.productions().len(),
    );
    table.set_action(StateIdx(0), Lookahead::Terminal(TermIdx(0)), Action::Reduce(ProdIdx(2)));
    table.set_goto(StateIdx(0), NontermIdx(1), StateIdx(0));

    let err = parse(&grammar, &table, &mut Recognize, &["a", "#"]).unwrap_err();
    assert!(matches!(
        err,
        ParseError::Internal(InternalFault::ReduceLoop { .. })
    ));
}

#[test]
fn missing_goto_is_an_internal_fault() {
    let grammar = Grammar::parse(LOOPY).expect("grammar should parse");
    let mut table = ParseTable::empty(
        1,
        grammar.n_terminals(),
        grammar.n_nonterminals(),
        grammar.productions().len(),
    );
    table.set_action(StateIdx(0), Lookahead::End, Action::Reduce(ProdIdx(2)));

    let err = parse(&grammar, &table, &mut Recognize, &["#"]).unwrap_err();
    assert!(matches!(
        err,
        ParseError::Internal(InternalFault::MissingGoto { .. })
    ));
}

#[test]
fn reduce_past_stack_bottom_is_underflow() {
    let grammar = Grammar::parse(LOOPY).expect("grammar should parse");
    // Reduce S -> a without ever having shifted `a`.
    let mut table = ParseTable::empty(
        1,
        grammar.n_terminals(),
        grammar.n_nonterminals(),
        grammar.productions().len(),
    );
    table.set_action(StateIdx(0), Lookahead::End, Action::Reduce(ProdIdx(1)));

    let err = parse(&grammar, &table, &mut Recognize, &["#"]).unwrap_err();
    assert!(matches!(
        err,
        ParseError::Internal(InternalFault::StackUnderflow { .. })
    ));
}

#[test]
fn accept_cell_midway_survives_byte_round_trip() {
    let grammar = Grammar::parse(LOOPY).expect("grammar should parse");
    // Accept sits in the first state, so its entry precedes every other
    // entry in the serialized list.
    let mut table = ParseTable::empty(
        2,
        grammar.n_terminals(),
        grammar.n_nonterminals(),
        grammar.productions().len(),
    );
    table.set_action(StateIdx(0), Lookahead::End, Action::Accept);
    table.set_action(StateIdx(1), Lookahead::Terminal(TermIdx(0)), Action::Shift(StateIdx(0)));
    table.set_action(StateIdx(1), Lookahead::End, Action::Reduce(ProdIdx(1)));
    table.set_goto(StateIdx(1), NontermIdx(1), StateIdx(0));

    let bytes = table.compile_table().expect("table should serialize");
    let reloaded =
        ParseTable::load_table(&bytes).expect("entries after the accept cell must survive");
    assert_eq!(reloaded, table);
}

#[test]
fn shift_past_state_count_rejected_at_load() {
    let (_, _, build) = pipeline(ASSIGN);
    let mut artifact = build.table.to_artifact();
    let entry = artifact
        .actions
        .iter_mut()
        .find(|e| e.tag == TAG_SHIFT)
        .expect("assignment table has shift entries");
    entry.target = artifact.n_states;
    assert!(matches!(
        ParseTable::from_artifact(&artifact),
        Err(ArtifactError::EntryOutOfRange)
    ));
}

#[test]
fn reduce_past_production_count_rejected_at_load() {
    let (_, _, build) = pipeline(ASSIGN);
    let mut artifact = build.table.to_artifact();
    let entry = artifact
        .actions
        .iter_mut()
        .find(|e| e.tag == TAG_REDUCE)
        .expect("assignment table has reduce entries");
    entry.target = artifact.n_productions;
    assert!(matches!(
        ParseTable::from_artifact(&artifact),
        Err(ArtifactError::EntryOutOfRange)
    ));
}

#[test]
fn unknown_action_tag_rejected_at_load() {
    let (_, _, build) = pipeline(ASSIGN);
    let mut artifact = build.table.to_artifact();
    artifact.actions[0].tag = 9;
    assert!(matches!(
        ParseTable::from_artifact(&artifact),
        Err(ArtifactError::BadActionTag)
    ));
}

#[test]
fn trace_records_stack_and_input() {
    let (grammar, _, build) = pipeline(ASSIGN);
    let outcome = parse(&grammar, &build.table, &mut Recognize, &["i", "=", "i", "#"])
        .expect("parse should run");
    let first = &outcome.trace[0];
    assert_eq!(first.stack, "# 0");
    assert_eq!(first.input, "i = i #");
    assert!(first.action.starts_with('s'));
}
