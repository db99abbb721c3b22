//! The `cardinal` binary: solves SAT, pseudo-boolean and MaxSAT problems.

use cardinal::command_line::cli::{run, Cli};
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    if let Err(msg) = run(&cli) {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}
