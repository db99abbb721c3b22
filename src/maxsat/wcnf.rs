#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
//! A reader for the WCNF weighted-CNF format.
//!
//! ```text
//! p wcnf <nbVars> <nbClauses> [<topWeight>]
//! <weight> <lit1> ... 0
//! ```
//!
//! A clause whose weight equals the top weight is hard; any other clause is
//! soft and costs its weight when violated. Soft clauses get a fresh relax
//! literal, and the produced problem minimizes the weighted sum of the
//! relax literals. Without a top weight, every clause is soft.

use crate::sat::constraint::PbConstr;
use crate::sat::error::{Error, Result};
use crate::sat::literal::Lit;
use crate::sat::problem::Problem;
use crate::sat::Weight;
use std::io::BufRead;

/// Parses a WCNF problem. The result is an optimization problem over the
/// original variables plus one relax variable per soft clause.
///
/// # Errors
///
/// `Error::Format` on malformed headers or clauses, `Error::Domain` on
/// literals out of range.
pub fn parse_wcnf<R: BufRead>(reader: R) -> Result<Problem> {
    let mut nb_vars = 0;
    let mut top_weight: Weight = 0;
    let mut seen_header = false;
    let mut clauses: Vec<(Weight, Vec<i32>)> = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| Error::Format(format!("could not read input: {e}")))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') {
            continue;
        }
        if trimmed.starts_with('p') {
            (nb_vars, top_weight) = parse_header(trimmed)?;
            seen_header = true;
            continue;
        }
        if !seen_header {
            return Err(Error::Format(format!(
                "clause line {trimmed:?} before the problem header"
            )));
        }
        clauses.push(parse_clause(trimmed, nb_vars)?);
    }
    Ok(build_problem(nb_vars, top_weight, &clauses))
}

/// Parses a WCNF problem from a string.
///
/// # Errors
///
/// As [`parse_wcnf`].
pub fn parse_wcnf_str(text: &str) -> Result<Problem> {
    parse_wcnf(std::io::Cursor::new(text))
}

fn parse_header(line: &str) -> Result<(usize, Weight)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 || fields[0] != "p" || fields[1] != "wcnf" {
        return Err(Error::Format(format!("invalid problem header {line:?}")));
    }
    let nb_vars: usize = fields[2]
        .parse()
        .map_err(|_| Error::Format(format!("nbvars is not an int in {line:?}")))?;
    fields[3]
        .parse::<usize>()
        .map_err(|_| Error::Format(format!("nbclauses is not an int in {line:?}")))?;
    let top_weight = if fields.len() > 4 {
        fields[4]
            .parse()
            .map_err(|_| Error::Format(format!("top weight is not an int in {line:?}")))?
    } else {
        // No top weight: every clause is soft.
        0
    };
    Ok((nb_vars, top_weight))
}

fn parse_clause(line: &str, nb_vars: usize) -> Result<(Weight, Vec<i32>)> {
    let mut fields = line.split_whitespace();
    let weight: Weight = fields
        .next()
        .ok_or_else(|| Error::Format(format!("empty clause line {line:?}")))?
        .parse()
        .map_err(|_| Error::Format(format!("invalid weight in clause {line:?}")))?;
    if weight < 0 {
        return Err(Error::Domain(format!(
            "negative weight {weight} in clause {line:?}"
        )));
    }
    let mut lits = Vec::new();
    let mut terminated = false;
    for field in fields {
        let val: i32 = field
            .parse()
            .map_err(|_| Error::Format(format!("invalid literal {field:?} in clause {line:?}")))?;
        if val == 0 {
            terminated = true;
            break;
        }
        if val.unsigned_abs() as usize > nb_vars {
            return Err(Error::Domain(format!(
                "literal {val} out of range in clause {line:?}"
            )));
        }
        lits.push(val);
    }
    if !terminated {
        return Err(Error::Format(format!(
            "missing 0 terminator in clause {line:?}"
        )));
    }
    Ok((weight, lits))
}

fn build_problem(nb_vars: usize, top_weight: Weight, clauses: &[(Weight, Vec<i32>)]) -> Problem {
    let mut constrs = Vec::with_capacity(clauses.len());
    let mut relax_lits = Vec::new();
    let mut relax_weights = Vec::new();
    let mut next_relax = nb_vars as i32 + 1;
    for (weight, lits) in clauses {
        let hard = top_weight != 0 && *weight == top_weight;
        if hard {
            constrs.push(PbConstr::prop_clause(lits));
        } else {
            let mut lits = lits.clone();
            lits.push(next_relax);
            relax_lits.push(Lit::from_dimacs(next_relax));
            relax_weights.push(*weight);
            next_relax += 1;
            constrs.push(PbConstr::prop_clause(&lits));
        }
    }
    let mut pb = Problem::parse_pb_constrs(&constrs);
    pb.grow_to((next_relax - 1) as usize);
    pb.set_cost_func(relax_lits, Some(relax_weights));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::Solver;

    #[test]
    fn test_parse_hard_and_soft() {
        // Hard: 1 ∨ 2. Soft units -1 and -2, costs 3 and 1.
        let pb = parse_wcnf_str(
            "p wcnf 2 3 10\n\
             10 1 2 0\n\
             3 -1 0\n\
             1 -2 0\n",
        )
        .unwrap();
        assert!(pb.optim());
        let mut s = Solver::new(pb);
        assert_eq!(s.minimize(), 1);
        let model = s.model().unwrap();
        assert!(!model[0] && model[1]);
    }

    #[test]
    fn test_hard_unsat() {
        let pb = parse_wcnf_str(
            "p wcnf 1 3 5\n\
             5 1 0\n\
             5 -1 0\n\
             1 1 0\n",
        )
        .unwrap();
        let mut s = Solver::new(pb);
        assert_eq!(s.minimize(), -1);
    }

    #[test]
    fn test_all_soft_without_top_weight() {
        let pb = parse_wcnf_str(
            "p wcnf 1 2\n\
             2 1 0\n\
             3 -1 0\n",
        )
        .unwrap();
        let mut s = Solver::new(pb);
        // The cheaper violation is the weight-2 clause.
        assert_eq!(s.minimize(), 2);
    }

    #[test]
    fn test_bad_header() {
        assert!(parse_wcnf_str("p cnf 2 1\n1 1 0\n").is_err());
    }

    #[test]
    fn test_bad_weight() {
        assert!(parse_wcnf_str("p wcnf 1 1 5\nx 1 0\n").is_err());
    }
}
