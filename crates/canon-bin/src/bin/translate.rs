use std::fs;
use std::path::PathBuf;

use clap::Parser;

use canon::lr::tac::Translator;
use canon::{parse, Grammar, ParseTable, Verdict};

/// Drives a compiled LR(1) table over a token stream, printing the step
/// trace, the verdict and the emitted quadruples.
#[derive(Parser)]
struct Args {
    /// Grammar in the flat counts-based format.
    grammar: PathBuf,

    /// Compiled table written by tablegen.
    table: PathBuf,

    /// Whitespace-separated terminal names, ending in `#`.
    input: PathBuf,
}

fn main() {
    let args = Args::parse();

    let text = fs::read_to_string(&args.grammar).expect("cannot read grammar file");
    let grammar = Grammar::parse(&text).expect("malformed grammar");

    let bytes = fs::read(&args.table).expect("cannot read table file");
    let table = ParseTable::load_table(&bytes).expect("malformed table artifact");

    let input = fs::read_to_string(&args.input).expect("cannot read input file");
    let tokens: Vec<&str> = input.split_whitespace().collect();

    let mut translator = Translator::new();
    let outcome = match parse(&grammar, &table, &mut translator, &tokens) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    println!("[parsing]");
    println!("{:<40} {:<20} {}", "stack", "input", "action");
    for step in &outcome.trace {
        println!("{:<40} {:<20} {}", step.stack, step.input, step.action);
    }

    match outcome.verdict {
        Verdict::Accepted(place) => {
            println!("\naccepted; result place: {}", place);
            println!("\nquadruples:");
            for (i, quad) in translator.quads().iter().enumerate() {
                println!("  {}: {}", i, quad);
            }
        }
        Verdict::Rejected(rejection) => {
            println!(
                "\nrejected in state {} at token {} (lookahead {})",
                rejection.state,
                rejection.consumed,
                rejection.lookahead.render(&grammar)
            );
            std::process::exit(1);
        }
    }
}
