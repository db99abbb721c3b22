#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Facilities to check and understand UNSAT instances.
//!
//! This module keeps its own problem representation, a plain list of
//! integer clauses. The point is auditability: certificate checking and MUS
//! extraction must be easy to review, while the solver's representation is
//! free to chase performance.

pub mod check;
pub mod mus;

use crate::sat::error::{Error, Result};
use crate::sat::literal::Lit;
use std::fmt;
use std::io::BufRead;

/// Options for the checking and extraction processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Write progress information to stdout.
    pub verbose: bool,
}

/// A conjunction of propositional clauses over 1-based signed literals.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    /// All clauses, problem clauses first. Clauses appended during
    /// certificate checking live past `nb_clauses`.
    pub clauses: Vec<Vec<i32>>,
    pub nb_vars: usize,
    /// How many of `clauses` belong to the original problem.
    pub(crate) nb_clauses: usize,
    /// For each variable: 0 unbound, 1 true, -1 false.
    pub(crate) units: Vec<i8>,
    pub options: Options,
    /// Clauses used while proving unsatisfiability. Initialized lazily.
    pub(crate) tagged: Vec<bool>,
}

impl Problem {
    /// Builds a problem from clauses. The variable count is inferred.
    #[must_use]
    pub fn new(clauses: Vec<Vec<i32>>) -> Self {
        let nb_vars = clauses
            .iter()
            .flatten()
            .map(|l| l.unsigned_abs() as usize)
            .max()
            .unwrap_or(0);
        let mut pb = Self {
            nb_clauses: clauses.len(),
            clauses,
            nb_vars,
            units: vec![0; nb_vars],
            options: Options::default(),
            tagged: Vec::new(),
        };
        pb.seed_units();
        pb
    }

    pub(crate) fn seed_units(&mut self) {
        for clause in &self.clauses {
            if let [lit] = clause.as_slice() {
                let v = lit.unsigned_abs() as usize - 1;
                self.units[v] = if *lit > 0 { 1 } else { -1 };
            }
        }
    }

    pub(crate) fn init_tagged(&mut self) {
        self.tagged = self
            .clauses
            .iter()
            .take(self.nb_clauses)
            // Unit clauses will almost surely take part in the resolution.
            .map(|clause| clause.len() == 1)
            .collect();
    }

    pub(crate) fn clone_fresh(&self) -> Self {
        Self {
            clauses: self.clauses[..self.nb_clauses].to_vec(),
            nb_vars: self.nb_vars,
            nb_clauses: self.nb_clauses,
            units: self.units.clone(),
            options: self.options,
            tagged: Vec::new(),
        }
    }

    /// Drops the clauses appended during certificate checking.
    pub(crate) fn restore(&mut self) {
        self.clauses.truncate(self.nb_clauses);
    }

    /// The problem in the DIMACS syntax.
    #[must_use]
    pub fn cnf_string(&self) -> String {
        let mut lines = Vec::with_capacity(self.nb_clauses + 1);
        lines.push(format!("p cnf {} {}", self.nb_vars, self.nb_clauses));
        for clause in self.clauses.iter().take(self.nb_clauses) {
            let mut parts: Vec<String> = clause.iter().map(ToString::to_string).collect();
            parts.push("0".to_string());
            lines.push(parts.join(" "));
        }
        lines.join("\n")
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cnf_string())
    }
}

/// Parses a DIMACS CNF problem into the explain representation.
///
/// # Errors
///
/// `Error::Format` on malformed input, `Error::Domain` on out-of-range
/// literals.
pub fn parse_cnf<R: BufRead>(reader: R) -> Result<Problem> {
    let mut clauses = Vec::new();
    let mut nb_vars = 0;
    let mut seen_header = false;
    for line in reader.lines() {
        let line = line.map_err(|e| Error::Format(format!("could not read input: {e}")))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') {
            continue;
        }
        if trimmed.starts_with('p') {
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() < 4 || fields[1] != "cnf" {
                return Err(Error::Format(format!("invalid problem header {trimmed:?}")));
            }
            nb_vars = fields[2]
                .parse()
                .map_err(|_| Error::Format(format!("nbvars is not an int in {trimmed:?}")))?;
            seen_header = true;
            continue;
        }
        if !seen_header {
            return Err(Error::Format(format!(
                "clause line {trimmed:?} before the problem header"
            )));
        }
        let clause = parse_clause_fields(&trimmed.split_whitespace().collect::<Vec<_>>())?;
        for &lit in &clause {
            if lit.unsigned_abs() as usize > nb_vars {
                return Err(Error::Domain(format!(
                    "literal {lit} out of range in clause {trimmed:?}"
                )));
            }
        }
        clauses.push(clause);
    }
    let mut pb = Problem::new(clauses);
    pb.nb_vars = pb.nb_vars.max(nb_vars);
    pb.units.resize(pb.nb_vars, 0);
    Ok(pb)
}

/// Parses from a string. Test and API convenience.
///
/// # Errors
///
/// As [`parse_cnf`].
pub fn parse_cnf_str(text: &str) -> Result<Problem> {
    parse_cnf(std::io::Cursor::new(text))
}

/// Parses a space-separated, zero-terminated clause.
pub(crate) fn parse_clause_fields(fields: &[&str]) -> Result<Vec<i32>> {
    let mut lits = Vec::with_capacity(fields.len().saturating_sub(1));
    for (i, field) in fields.iter().enumerate() {
        let val: i32 = field
            .parse()
            .map_err(|_| Error::Format(format!("invalid literal {field:?}")))?;
        if val == 0 {
            if i != fields.len() - 1 {
                return Err(Error::Format(format!(
                    "literals after the 0 terminator in {fields:?}"
                )));
            }
            return Ok(lits);
        }
        lits.push(val);
    }
    Err(Error::Format(format!(
        "missing 0 terminator in clause {fields:?}"
    )))
}

pub(crate) fn to_core_lits(clause: &[i32]) -> Vec<Lit> {
    clause.iter().map(|&l| Lit::from_dimacs(l)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let pb = parse_cnf_str("p cnf 3 2\n1 -2 0\n2 3 0\n").unwrap();
        assert_eq!(pb.nb_vars, 3);
        assert_eq!(pb.clauses.len(), 2);
        assert_eq!(pb.cnf_string(), "p cnf 3 2\n1 -2 0\n2 3 0");
    }

    #[test]
    fn test_units_seeded() {
        let pb = Problem::new(vec![vec![1], vec![-2], vec![1, 2]]);
        assert_eq!(pb.units, vec![1, -1]);
    }

    #[test]
    fn test_parse_clause_fields() {
        assert_eq!(parse_clause_fields(&["1", "-2", "0"]).unwrap(), vec![1, -2]);
        assert!(parse_clause_fields(&["1", "-2"]).is_err());
        assert!(parse_clause_fields(&["1", "0", "2"]).is_err());
    }
}
