use std::fs;
use std::path::PathBuf;

use clap::Parser;

use canon::grammar::sets::LookaheadSets;
use canon::{Automaton, Grammar, TableBuild};

use petgraph::dot::Dot;

/// Builds the canonical LR(1) collection and ACTION/GOTO table for a grammar
/// file, reports the grammar-class verdict and writes the compiled table.
#[derive(Parser)]
struct Args {
    /// Grammar in the flat counts-based format.
    grammar: PathBuf,

    /// Output path for the compiled table (defaults to <grammar>.lrtbl).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also print the goto graph in GraphViz dot format.
    #[arg(long)]
    dot: bool,
}

fn main() {
    let args = Args::parse();

    let text = fs::read_to_string(&args.grammar).expect("cannot read grammar file");
    let grammar = match Grammar::parse(&text) {
        Ok(grammar) => grammar,
        Err(e) => {
            eprintln!("malformed grammar: {}", e);
            std::process::exit(1);
        }
    };
    println!("{}\n", grammar);

    let sets = LookaheadSets::compute(&grammar);
    let automaton = Automaton::build(&grammar, &sets);

    println!("[LR(1) item sets]");
    for (id, state) in automaton.states().iter().enumerate() {
        println!("  I{}:", id);
        for item in state.items() {
            println!("    {}", item.render(&grammar));
        }
    }

    println!("\n[goto function]");
    let mut transitions: Vec<_> = automaton.transitions().collect();
    transitions.sort();
    for (from, sym, to) in transitions {
        println!("  I{} , {} -> I{}", from, grammar.symbol_name(sym), to);
    }

    let build = TableBuild::synthesize(&grammar, &automaton);
    if args.dot {
        let graph = automaton.to_graph(&grammar);
        println!("\n{:?}", Dot::new(&graph));
    }

    if build.is_lr1() {
        println!("\ngrammar is LR(1)");
    } else {
        // All conflicts are reported at once; an unusable table is not
        // written out.
        println!("\ngrammar is NOT LR(1); {} conflict(s):", build.conflicts.len());
        for conflict in &build.conflicts {
            println!("  {}", conflict.render(&grammar));
        }
        std::process::exit(1);
    }

    let output = args
        .output
        .unwrap_or_else(|| args.grammar.with_extension("lrtbl"));
    let bytes = build.table.compile_table().expect("table should serialize");
    fs::write(&output, &bytes).expect("cannot write table file");
    println!("wrote {}, {} bytes", output.display(), bytes.len());
}
