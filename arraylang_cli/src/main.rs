//! arraylang CLI
//!
//! Usage:
//!   arraylang_cli                 # run the built-in sum-loop demo
//!   arraylang_cli program.json    # run a script serialized as a `Vec<Stmt>`

use std::env;
use std::fs;

use arraylang_core::ir::Stmt;
use arraylang_core::{run_script, Interpreter, NullResolver, StdoutHost};

mod demos;

fn load_program(path: &str) -> Vec<Stmt> {
    let source = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading '{path}': {e}");
        std::process::exit(1);
    });
    serde_json::from_str(&source).unwrap_or_else(|e| {
        eprintln!("Error parsing '{path}' as a program: {e}");
        std::process::exit(1);
    })
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let body = match args.get(1) {
        Some(path) => load_program(path),
        None => demos::sum_loop(),
    };

    let mut interp = Interpreter::new(Box::new(StdoutHost), NullResolver);
    if let Err(signal) = run_script(&mut interp, body) {
        eprintln!("{}", describe(&signal));
        std::process::exit(1);
    }
}

fn describe(signal: &arraylang_core::Signal) -> String {
    match signal {
        arraylang_core::Signal::Error(traced) => traced.render(),
        arraylang_core::Signal::Flow(flow) => format!("unhandled {flow:?} at top level"),
    }
}
