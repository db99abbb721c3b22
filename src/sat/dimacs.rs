#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! A reader for the DIMACS CNF format.
//!
//! ```text
//! c a comment
//! p cnf <nbVars> <nbClauses>
//! 1 -2 3 0
//! ```
//!
//! Literals are 1-based signed integers, `0` terminates a clause, comment
//! lines start with `c`, and the `p` header must precede the clauses.
//! Malformed lines are reported with their content; literals outside
//! `[1, nbVars]` are domain errors.

use crate::sat::error::{Error, Result};
use crate::sat::literal::Lit;
use crate::sat::problem::Problem;
use std::io::BufRead;

/// Parses a DIMACS CNF problem from a reader.
///
/// # Errors
///
/// `Error::Format` on a malformed header, a non-integer literal, or a clause
/// line before the header; `Error::Domain` when a literal references a
/// variable beyond the declared count.
pub fn parse_cnf<R: BufRead>(reader: R) -> Result<Problem> {
    let mut pb = Problem::default();
    let mut seen_header = false;
    for line in reader.lines() {
        let line = line.map_err(|e| Error::Format(format!("could not read input: {e}")))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix('p') {
            pb.nb_vars = parse_header(rest, trimmed)?;
            pb.model = crate::sat::assignment::Model::new(pb.nb_vars);
            seen_header = true;
        } else {
            if !seen_header {
                return Err(Error::Format(format!(
                    "clause line {trimmed:?} before the problem header"
                )));
            }
            parse_clause_line(&mut pb, trimmed)?;
        }
    }
    pb.simplify();
    Ok(pb)
}

/// Parses a CNF from a string. Test and API convenience.
///
/// # Errors
///
/// As [`parse_cnf`].
pub fn parse_cnf_str(text: &str) -> Result<Problem> {
    parse_cnf(std::io::Cursor::new(text))
}

fn parse_header(rest: &str, line: &str) -> Result<usize> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < 3 || fields[0] != "cnf" {
        return Err(Error::Format(format!("invalid problem header {line:?}")));
    }
    let nb_vars: usize = fields[1]
        .parse()
        .map_err(|_| Error::Format(format!("nbvars is not an int in {line:?}")))?;
    fields[2]
        .parse::<usize>()
        .map_err(|_| Error::Format(format!("nbclauses is not an int in {line:?}")))?;
    Ok(nb_vars)
}

fn parse_clause_line(pb: &mut Problem, line: &str) -> Result<()> {
    let mut lits = Vec::new();
    let mut terminated = false;
    for field in line.split_whitespace() {
        if terminated {
            return Err(Error::Format(format!(
                "literals after the 0 terminator in {line:?}"
            )));
        }
        let val: i32 = field
            .parse()
            .map_err(|_| Error::Format(format!("invalid literal {field:?} in clause {line:?}")))?;
        if val == 0 {
            terminated = true;
            continue;
        }
        if val.unsigned_abs() as usize > pb.nb_vars {
            return Err(Error::Domain(format!(
                "literal {val} out of range in clause {line:?}"
            )));
        }
        lits.push(Lit::from_dimacs(val));
    }
    if !terminated {
        return Err(Error::Format(format!(
            "missing 0 terminator in clause {line:?}"
        )));
    }
    match lits.len() {
        0 => {
            pb.status = crate::sat::literal::Status::Unsat;
            pb.clauses.clear();
        }
        1 => pb.add_unit(lits[0]),
        _ => pb.clauses.push(crate::sat::clause::Clause::new(lits)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::literal::Status;

    #[test]
    fn test_parse_simple() {
        let pb = parse_cnf_str(
            "c a comment\n\
             p cnf 3 2\n\
             1 -2 0\n\
             2 3 0\n",
        )
        .unwrap();
        assert_eq!(pb.nb_vars, 3);
        assert_eq!(pb.clauses.len(), 2);
        assert_eq!(pb.status, Status::Indet);
    }

    #[test]
    fn test_parse_empty_problem() {
        let pb = parse_cnf_str("p cnf 0 0\n").unwrap();
        assert_eq!(pb.nb_vars, 0);
        assert_eq!(pb.status, Status::Sat);
    }

    #[test]
    fn test_units_are_propagated() {
        let pb = parse_cnf_str("p cnf 2 2\n1 0\n-1 2 0\n").unwrap();
        assert_eq!(pb.status, Status::Sat);
        assert_eq!(pb.model.value(1), Some(true));
    }

    #[test]
    fn test_missing_header() {
        let err = parse_cnf_str("1 2 0\n").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_bad_header() {
        assert!(parse_cnf_str("p cnf x 2\n").is_err());
        assert!(parse_cnf_str("p dnf 2 2\n").is_err());
    }

    #[test]
    fn test_bad_literal() {
        let err = parse_cnf_str("p cnf 2 1\n1 abc 0\n").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_literal_out_of_range() {
        let err = parse_cnf_str("p cnf 2 1\n1 5 0\n").unwrap_err();
        assert!(matches!(err, Error::Domain(_)));
    }

    #[test]
    fn test_missing_terminator() {
        let err = parse_cnf_str("p cnf 2 1\n1 2\n").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_empty_clause_is_unsat() {
        let pb = parse_cnf_str("p cnf 2 1\n0\n").unwrap();
        assert_eq!(pb.status, Status::Unsat);
    }
}
