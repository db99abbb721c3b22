#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::cast_possible_wrap)]
//! Command-line interface: parses a problem file by extension, runs the
//! requested driver, and prints the answer in the solver-competition
//! conventions (`s` status line, `v` values line, `o` interim costs).

use crate::explain;
use crate::maxsat::wcnf;
use crate::sat::{dimacs, opb, Problem, SolveResult, Solver, Status};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;

/// A SAT, pseudo-boolean and MaxSAT solver.
#[derive(Parser, Debug)]
#[command(name = "cardinal", version, about = "A SAT and pseudo-boolean solver")]
pub struct Cli {
    /// The problem file: .cnf (DIMACS), .opb (pseudo-boolean) or .wcnf
    /// (weighted MaxSAT).
    pub path: PathBuf,

    /// Display progress information while solving.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Emit a RUP certificate on stdout while solving.
    #[arg(short, long, default_value_t = false)]
    pub certified: bool,

    /// Count the problem's models rather than solving it.
    #[arg(long, default_value_t = false)]
    pub count: bool,

    /// Extract a minimal unsatisfiable subset from an unsat problem.
    #[arg(long, value_enum)]
    pub mus: Option<MusStrategy>,

    /// Extract an unsatisfiable subset (not necessarily minimal; much
    /// cheaper than a MUS).
    #[arg(long, default_value_t = false)]
    pub subset: bool,
}

/// The strategy used to extract a minimal unsatisfiable subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MusStrategy {
    /// One cold solve per clause.
    Deletion,
    /// A hot solver over a growing subset.
    Insertion,
    /// Repeated cost minimizations over relaxed clauses.
    Maxsat,
}

/// Runs the CLI. The error string is meant for stderr; every solved status,
/// including Unsat, is a success.
///
/// # Errors
///
/// On unreadable files, parse errors and unsupported extensions.
pub fn run(cli: &Cli) -> Result<(), String> {
    let ext = cli
        .path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    if cli.mus.is_some() || cli.subset {
        return run_explain(cli);
    }
    println!("c solving {}", cli.path.display());
    match ext.as_str() {
        "cnf" => {
            let pb = dimacs::parse_cnf(open(&cli.path)?)
                .map_err(|e| format!("could not parse problem: {e}"))?;
            if cli.count {
                count_models(pb, cli.verbose)
            } else {
                solve_decision(pb, cli)
            }
        }
        "opb" => {
            let pb = opb::parse_opb(open(&cli.path)?)
                .map_err(|e| format!("could not parse problem: {e}"))?;
            solve_optim(pb, cli)
        }
        "wcnf" => {
            let pb = wcnf::parse_wcnf(open(&cli.path)?)
                .map_err(|e| format!("could not parse MAXSAT file: {e}"))?;
            solve_optim(pb, cli)
        }
        other => Err(format!("unsupported file extension {other:?}")),
    }
}

fn open(path: &Path) -> Result<BufReader<File>, String> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| format!("could not open {:?}: {e}", path.display()))
}

fn solve_decision(pb: Problem, cli: &Cli) -> Result<(), String> {
    let mut solver = Solver::new(pb);
    solver.verbose = cli.verbose;
    solver.certified = cli.certified;
    solver.solve();
    solver.output_model();
    if cli.verbose {
        print_stats(&solver);
    }
    Ok(())
}

fn solve_optim(pb: Problem, cli: &Cli) -> Result<(), String> {
    let mut solver = Solver::new(pb);
    solver.verbose = cli.verbose;
    solver.certified = cli.certified;
    let (tx, rx) = channel::<SolveResult>();
    let printer = std::thread::spawn(move || {
        for res in rx {
            if res.status == Status::Sat {
                println!("o {}", res.cost);
            }
        }
    });
    let res = solver.optimal(Some(tx), None);
    let _ = printer.join();
    match res.status {
        Status::Unsat => println!("s UNSATISFIABLE"),
        Status::Indet => println!("s UNKNOWN"),
        Status::Sat => {
            println!("s OPTIMUM FOUND");
            let mut line = String::from("v");
            for (i, val) in res.model.iter().enumerate() {
                let tok = if *val {
                    format!(" x{}", i + 1)
                } else {
                    format!(" ~x{}", i + 1)
                };
                line.push_str(&tok);
            }
            println!("{line}");
        }
    }
    if cli.verbose {
        print_stats(&solver);
    }
    Ok(())
}

fn count_models(pb: Problem, verbose: bool) -> Result<(), String> {
    let mut solver = Solver::new(pb);
    solver.verbose = verbose;
    let nb = solver
        .count_models()
        .map_err(|e| format!("could not count models: {e}"))?;
    println!("{nb}");
    Ok(())
}

fn run_explain(cli: &Cli) -> Result<(), String> {
    let mut pb = explain::parse_cnf(open(&cli.path)?)
        .map_err(|e| format!("could not parse problem: {e}"))?;
    pb.options.verbose = cli.verbose;
    let extracted = if cli.subset {
        pb.unsat_subset()
    } else {
        match cli.mus.unwrap_or(MusStrategy::Deletion) {
            MusStrategy::Deletion => pb.mus_deletion(),
            MusStrategy::Insertion => pb.mus_insertion(),
            MusStrategy::Maxsat => pb.mus_maxsat(),
        }
    };
    let subset = extracted.map_err(|e| format!("could not extract subset: {e}"))?;
    println!("{}", subset.cnf_string());
    Ok(())
}

fn print_stats(solver: &Solver) {
    let s = solver.stats;
    println!("c nb conflicts: {}", s.nb_conflicts);
    println!("c nb restarts: {}", s.nb_restarts);
    println!("c nb decisions: {}", s.nb_decisions);
    println!("c nb propagations: {}", s.nb_propagations);
    println!("c nb unit learned: {}", s.nb_unit_learned);
    println!("c nb binary learned: {}", s.nb_binary_learned);
    println!("c nb learned: {}", s.nb_learned);
    println!("c nb learned clauses deleted: {}", s.nb_deleted);
}
