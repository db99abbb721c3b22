#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! RUP certificate checking and unsatisfiable-subset extraction.
//!
//! A RUP line is certified by assuming the negation of each of its literals
//! as a temporary unit and running unit propagation: if propagation derives
//! a conflict, the line is a consequence of the problem. Clauses taking
//! part in a successful refutation are tagged; once the empty clause is
//! certified, the tagged clauses form an unsatisfiable subset of the
//! original problem.

use crate::explain::{parse_clause_fields, to_core_lits, Problem};
use crate::sat::error::{Error, Result};
use crate::sat::literal::Status;
use crate::sat::problem::Problem as CoreProblem;
use crate::sat::Solver;
use std::io::BufRead;
use std::sync::mpsc::{channel, Receiver};

impl Problem {
    /// Unit propagation to a fixed point over `units`. Returns true iff a
    /// conflict was derived; the clauses used are tagged.
    pub(crate) fn propagate_to_conflict(&mut self) -> bool {
        let mut done = vec![false; self.clauses.len()];
        let mut modified = true;
        while modified {
            modified = false;
            for i in 0..self.clauses.len() {
                if done[i] {
                    // That clause was already satisfied.
                    continue;
                }
                let mut unbound = 0;
                let mut unit = 0;
                let mut sat = false;
                for &lit in &self.clauses[i] {
                    let v = lit.unsigned_abs() as usize;
                    match self.units[v - 1] {
                        0 => {
                            unbound += 1;
                            if unbound == 1 {
                                unit = lit;
                            } else {
                                break;
                            }
                        }
                        binding if i32::from(binding) * lit > 0 => {
                            sat = true;
                            break;
                        }
                        _ => {}
                    }
                }
                if sat {
                    done[i] = true;
                    continue;
                }
                if unbound == 0 {
                    // All literals are false: conflict.
                    if i < self.nb_clauses {
                        self.tagged[i] = true;
                    }
                    return true;
                }
                if unbound == 1 {
                    let v = unit.unsigned_abs() as usize - 1;
                    self.units[v] = if unit > 0 { 1 } else { -1 };
                    done[i] = true;
                    if i < self.nb_clauses {
                        self.tagged[i] = true;
                    }
                    modified = true;
                }
            }
        }
        // Could not be proven unsat through unit propagation.
        false
    }

    /// Checks that `clause` is a RUP consequence of the problem: the
    /// negation of each of its literals is assumed as a unit, and unit
    /// propagation must reach a conflict.
    fn rup_check(&mut self, clause: &[i32]) -> bool {
        let saved = self.units.clone();
        for &lit in clause {
            let v = lit.unsigned_abs() as usize - 1;
            self.units[v] = if lit > 0 { -1 } else { 1 };
        }
        let res = self.propagate_to_conflict();
        self.units = saved;
        res
    }

    fn check_line(&mut self, line: &str) -> Result<Option<bool>> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = fields.first() else {
            return Ok(None);
        };
        if first.parse::<i32>().is_err() {
            // Not a clause: ignore the line.
            return Ok(None);
        }
        let clause = parse_clause_fields(&fields)?;
        for &lit in &clause {
            if lit.unsigned_abs() as usize > self.nb_vars {
                return Err(Error::Domain(format!(
                    "certificate literal {lit} outside the problem's variables"
                )));
            }
        }
        if !self.rup_check(&clause) {
            return Ok(Some(false));
        }
        if clause.is_empty() {
            // The empty clause checked out: the problem is proven Unsat.
            return Ok(Some(true));
        }
        // The clause is a logical consequence: append it.
        self.clauses.push(clause);
        Ok(None)
    }

    /// Validates a RUP certificate read line by line from `cert`. Returns
    /// `Ok(true)` iff every line checks out and the certificate derives the
    /// empty clause, i.e. it proves the problem Unsat through unit
    /// propagation. An invalid certificate is `Ok(false)`, not an error.
    ///
    /// # Errors
    ///
    /// `Error::Format` when a certificate line is not a clause,
    /// `Error::Domain` when it mentions unknown variables.
    pub fn unsat<R: BufRead>(&mut self, cert: R) -> Result<bool> {
        self.init_tagged();
        let mut valid = false;
        for line in cert.lines() {
            let line = line.map_err(|e| Error::Format(format!("could not read line: {e}")))?;
            match self.check_line(&line)? {
                Some(outcome) => {
                    valid = outcome;
                    break;
                }
                None => continue,
            }
        }
        self.restore();
        Ok(valid)
    }

    /// Like [`Self::unsat`], consuming certificate lines from a channel as
    /// the solver produces them.
    ///
    /// # Errors
    ///
    /// As [`Self::unsat`].
    pub fn unsat_receiver(&mut self, rx: &Receiver<String>) -> Result<bool> {
        self.init_tagged();
        let mut valid = false;
        for line in rx {
            match self.check_line(&line)? {
                Some(outcome) => {
                    valid = outcome;
                    break;
                }
                None => continue,
            }
        }
        self.restore();
        Ok(valid)
    }

    /// Extracts an unsatisfiable subset of the problem.
    ///
    /// The subset is not guaranteed to be minimal — some clauses might
    /// still be removable — but it only costs one certified solver run:
    /// the clauses tagged while replaying the certificate form the subset.
    ///
    /// # Errors
    ///
    /// `Error::Protocol` when the problem is not unsatisfiable or the
    /// produced certificate does not check out.
    pub fn unsat_subset(&mut self) -> Result<Problem> {
        let core = CoreProblem::parse_slice(&self.clauses[..self.nb_clauses])?;
        let mut solver = Solver::new(core);
        solver.certified = true;
        let (tx, rx) = channel();
        solver.cert_out = Some(tx);
        let handle = std::thread::spawn(move || solver.solve());
        let valid = self.unsat_receiver(&rx)?;
        let status = handle
            .join()
            .map_err(|_| Error::Protocol("solver thread panicked"))?;
        if !valid || status == Status::Sat {
            return Err(Error::Protocol("problem is not UNSAT"));
        }
        let mut subset = Problem {
            nb_vars: self.nb_vars,
            units: vec![0; self.nb_vars],
            ..Problem::default()
        };
        for (i, clause) in self.clauses.iter().take(self.nb_clauses).enumerate() {
            if self.tagged[i] {
                // The clause was used to prove Unsat: part of the subset.
                subset.clauses.push(clause.clone());
                subset.nb_clauses += 1;
            }
        }
        subset.seed_units();
        Ok(subset)
    }
}

/// Solves a clause set on a core solver; helper for the MUS strategies.
/// The variable count is explicit: the clause set may not mention every
/// variable (or any, at the start of the insertion strategy).
pub(crate) fn solve_clauses(
    clauses: &[Vec<i32>],
    nb_vars: usize,
    verbose: bool,
) -> Result<(Solver, Status)> {
    let core = CoreProblem::parse_slice_nb(clauses, nb_vars)?;
    let mut solver = Solver::new(core);
    solver.verbose = verbose;
    let status = solver.solve();
    Ok((solver, status))
}

pub(crate) fn core_clause(clause: &[i32]) -> crate::sat::Clause {
    crate::sat::Clause::new(to_core_lits(clause))
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

    #[test]
    fn test_valid_certificate() {
        let mut pb = parse_cnf_str(UNSAT_CNF).unwrap();
        // 1 follows by resolution of the first two clauses; then 3 and -3.
        let cert = "1 0\n3 0\n0\n";
        assert!(pb.unsat(std::io::Cursor::new(cert)).unwrap());
    }

    #[test]
    fn test_invalid_certificate() {
        // 1 is not a RUP consequence of the single clause (1 ∨ 2).
        let mut pb = parse_cnf_str("p cnf 2 1\n1 2 0\n").unwrap();
        let cert = "1 0\n0\n";
        assert!(!pb.unsat(std::io::Cursor::new(cert)).unwrap());
    }

    #[test]
    fn test_solver_certificate_roundtrip() {
        let mut pb = parse_cnf_str(UNSAT_CNF).unwrap();
        let subset = pb.unsat_subset().unwrap();
        assert!(!subset.clauses.is_empty());
        // The subset itself must be unsatisfiable.
        let (_, status) = solve_clauses(&subset.clauses, subset.nb_vars, false).unwrap();
        assert_eq!(status, Status::Unsat);
    }

    #[test]
    fn test_unsat_subset_on_sat_problem() {
        let mut pb = parse_cnf_str("p cnf 2 1\n1 2 0\n").unwrap();
        assert!(pb.unsat_subset().is_err());
    }

    #[test]
    fn test_certificate_receiver() {
        let mut pb = parse_cnf_str(UNSAT_CNF).unwrap();
        let (tx, rx) = channel();
        std::thread::spawn(move || {
            for line in ["1 0", "3 0", "0"] {
                tx.send(line.to_string()).unwrap();
            }
        });
        assert!(pb.unsat_receiver(&rx).unwrap());
    }
}
