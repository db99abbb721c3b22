#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
//! Minimal Unsatisfiable Subset extraction.
//!
//! A MUS is an unsatisfiable subset of the problem's clauses such that
//! removing any single clause makes it satisfiable. MUSes are expensive —
//! each strategy calls the SAT solver many times on variants of the
//! problem — but explain why an instance is Unsat far better than a raw
//! refutation.
//!
//! Three strategies are provided: deletion (one solve per clause, each
//! starting cold), insertion (a hot solver growing a subset), and a
//! MaxSAT-guided search (repeated cost minimization over relaxed clauses).
//! Every strategy starts from a fresh copy of the problem; none mutates the
//! original.

use crate::explain::check::{core_clause, solve_clauses};
use crate::explain::Problem;
use crate::sat::error::{Error, Result};
use crate::sat::literal::{Lit, Status};
use crate::sat::problem::Problem as CoreProblem;
use crate::sat::Solver;

impl Problem {
    /// Extracts a MUS with the default strategy (deletion).
    ///
    /// # Errors
    ///
    /// `Error::Protocol` when the problem is satisfiable.
    pub fn mus(&self) -> Result<Problem> {
        self.mus_deletion()
    }

    /// The deletion strategy.
    ///
    /// Every clause gets a fresh relaxation literal, assumed false. Each
    /// clause in turn is relaxed (its literal assumed true) and the problem
    /// re-solved: if it turns satisfiable the clause is essential and is
    /// reinstated, otherwise it stays relaxed. Exactly as many solves as
    /// clauses, each starting from the assumptions only.
    ///
    /// # Errors
    ///
    /// `Error::Protocol` when the problem is satisfiable.
    pub fn mus_deletion(&self) -> Result<Problem> {
        let mut pb = self.clone_fresh().unsat_subset()?;
        let nb_clauses = pb.nb_clauses;
        let relax_base = pb.nb_vars as i32;
        for (i, clause) in pb.clauses.iter_mut().enumerate() {
            clause.push(relax_base + i as i32 + 1);
        }
        pb.nb_vars += nb_clauses;
        // At first, every relaxation literal is assumed false.
        let mut assumptions: Vec<i32> = (0..nb_clauses)
            .map(|i| -(relax_base + i as i32 + 1))
            .collect();
        for i in 0..nb_clauses {
            // Relax the current clause and solve from scratch.
            assumptions[i] = -assumptions[i];
            let mut clauses = pb.clauses.clone();
            clauses.extend(assumptions.iter().map(|&a| vec![a]));
            let (_, status) = solve_clauses(&clauses, pb.nb_vars, false)?;
            let essential = status == Status::Sat;
            if essential {
                // Satisfiable without it: reinstate the clause.
                assumptions[i] = -assumptions[i];
            }
            if self.options.verbose {
                let verdict = if essential { "kept" } else { "removed" };
                println!("c clause {}/{}: {verdict}", i + 1, nb_clauses);
            }
        }
        let mut mus = Problem {
            nb_vars: self.nb_vars,
            units: vec![0; self.nb_vars],
            options: self.options,
            ..Problem::default()
        };
        for (i, &assumed) in assumptions.iter().enumerate() {
            if assumed < 0 {
                // The relax literal stayed false: the clause is essential.
                let mut clause = pb.clauses[i].clone();
                clause.pop(); // Drop the relax literal.
                mus.clauses.push(clause);
            }
        }
        mus.nb_clauses = mus.clauses.len();
        mus.seed_units();
        Ok(mus)
    }

    /// The insertion strategy.
    ///
    /// Clauses are appended into a growing solver until it turns Unsat; the
    /// last appended clause is essential. The solver stays hot between
    /// appends, but pathological cases (a problem that already is a MUS)
    /// cost a quadratic number of solves.
    ///
    /// # Errors
    ///
    /// `Error::Protocol` when the problem is satisfiable.
    pub fn mus_insertion(&self) -> Result<Problem> {
        let subset = self.clone_fresh().unsat_subset()?;
        let mut mus = Problem {
            nb_vars: subset.nb_vars,
            units: vec![0; subset.nb_vars],
            options: self.options,
            ..Problem::default()
        };
        let mut clauses = subset.clauses;
        loop {
            if self.options.verbose {
                println!("c mus currently contains {} clauses", mus.nb_clauses);
            }
            let (mut solver, mut status) = solve_clauses(&mus.clauses, mus.nb_vars, self.options.verbose)?;
            if status == Status::Unsat {
                // Nothing more to add: this is the MUS.
                mus.seed_units();
                return Ok(mus);
            }
            let mut idx = 0;
            while status == Status::Sat {
                solver.append_clause(core_clause(&clauses[idx]));
                idx += 1;
                status = solver.solve();
            }
            // We went one step too far; the last appended clause is
            // essential, the ones after it are not.
            idx -= 1;
            mus.clauses.push(clauses[idx].clone());
            mus.nb_clauses += 1;
            if self.options.verbose {
                println!("c removing {}/{} clause(s)", clauses.len() - idx, clauses.len());
            }
            clauses.truncate(idx);
        }
    }

    /// The MaxSAT-guided strategy.
    ///
    /// Every clause is relaxed by a weight-1 literal; each cost
    /// minimization points at the clauses violated in a minimum-cost model,
    /// which are added to the MUS and made hard. The process stops when the
    /// hardened problem cannot be satisfied at all.
    ///
    /// # Errors
    ///
    /// `Error::Protocol` when the problem is satisfiable.
    pub fn mus_maxsat(&self) -> Result<Problem> {
        let pb = self.clone_fresh();
        let nb_vars = pb.nb_vars;
        let nb_clauses = pb.nb_clauses;
        let mut relaxed: Vec<Vec<i32>> = pb.clauses.clone();
        let relax_lits: Vec<Lit> = (0..nb_clauses)
            .map(|i| Lit::from_dimacs(nb_vars as i32 + i as i32 + 1))
            .collect();
        for (i, clause) in relaxed.iter_mut().enumerate() {
            clause.push(nb_vars as i32 + i as i32 + 1);
        }
        let weights = vec![1; nb_clauses];
        let mut mus_clauses: Vec<Vec<i32>> = Vec::new();
        let mut done = vec![false; nb_clauses];
        loop {
            let mut core = CoreProblem::parse_slice(&relaxed)?;
            core.set_cost_func(relax_lits.clone(), Some(weights.clone()));
            let mut solver = Solver::new(core);
            solver.verbose = self.options.verbose;
            let cost = solver.minimize();
            if cost == -1 {
                // Hardened clauses alone are Unsat: the MUS is complete.
                let mut mus = Problem {
                    nb_vars,
                    units: vec![0; nb_vars],
                    options: self.options,
                    ..Problem::default()
                };
                mus.clauses = mus_clauses;
                mus.nb_clauses = mus.clauses.len();
                mus.seed_units();
                return Ok(mus);
            }
            if cost == 0 {
                return Err(Error::Protocol(
                    "cannot extract a MUS from a satisfiable problem",
                ));
            }
            let model = solver.model()?;
            for (i, clause) in pb.clauses.iter().take(nb_clauses).enumerate() {
                if !done[i] && !sat_clause(clause, &model) {
                    // The clause is violated in the optimal model: it
                    // belongs to the MUS. Make it hard.
                    relaxed.push(vec![-(nb_vars as i32 + i as i32 + 1)]);
                    mus_clauses.push(clause.clone());
                    done[i] = true;
                }
            }
            if self.options.verbose {
                println!(
                    "c currently {}/{} clauses in MUS",
                    mus_clauses.len(),
                    nb_clauses
                );
            }
        }
    }
}

/// True iff the clause is satisfied by the model.
fn sat_clause(clause: &[i32], model: &[bool]) -> bool {
    clause.iter().any(|&lit| {
        let v = lit.unsigned_abs() as usize - 1;
        (lit > 0) == model[v]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explain::parse_cnf_str;

    const UNSAT_CNF: &str = "p cnf 3 6\n\
                             1 2 0\n\
                             1 -2 0\n\
                             -1 3 0\n\
                             -1 -3 0\n\
                             2 3 0\n\
                             -2 -3 0\n";

    /// Removing any single clause from a MUS must leave it satisfiable.
    fn assert_is_mus(mus: &Problem) {
        let (_, status) = solve_clauses(&mus.clauses, mus.nb_vars, false).unwrap();
        assert_eq!(status, Status::Unsat, "a MUS must be unsatisfiable");
        for skip in 0..mus.clauses.len() {
            let without: Vec<Vec<i32>> = mus
                .clauses
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != skip)
                .map(|(_, c)| c.clone())
                .collect();
            let (_, status) = solve_clauses(&without, mus.nb_vars, false).unwrap();
            assert_eq!(
                status,
                Status::Sat,
                "clause {skip} is not essential: the subset is not minimal"
            );
        }
    }

    #[test]
    fn test_mus_deletion() {
        let pb = parse_cnf_str(UNSAT_CNF).unwrap();
        let mus = pb.mus_deletion().unwrap();
        assert_is_mus(&mus);
    }

    #[test]
    fn test_mus_insertion() {
        let pb = parse_cnf_str(UNSAT_CNF).unwrap();
        let mus = pb.mus_insertion().unwrap();
        assert_is_mus(&mus);
    }

    #[test]
    fn test_mus_maxsat() {
        let pb = parse_cnf_str(UNSAT_CNF).unwrap();
        let mus = pb.mus_maxsat().unwrap();
        assert_is_mus(&mus);
    }

    #[test]
    fn test_mus_default_strategy() {
        let pb = parse_cnf_str(UNSAT_CNF).unwrap();
        let mus = pb.mus().unwrap();
        assert_is_mus(&mus);
    }

    #[test]
    fn test_mus_on_satisfiable_problem() {
        let pb = parse_cnf_str("p cnf 2 2\n1 2 0\n-1 2 0\n").unwrap();
        assert!(pb.mus().is_err());
        assert!(pb.mus_maxsat().is_err());
    }

    #[test]
    fn test_mus_on_already_minimal_problem() {
        // The formula is its own MUS.
        let pb = parse_cnf_str("p cnf 1 2\n1 0\n-1 0\n").unwrap();
        let mus = pb.mus_insertion().unwrap();
        assert_eq!(mus.clauses.len(), 2);
        assert_is_mus(&mus);
    }
}
