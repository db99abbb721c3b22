#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! A reader for the OPB pseudo-boolean format.
//!
//! ```text
//! * a comment
//! min: 1 x1 +2 ~x2 ;
//! 3 x1 +2 x2 +1 x3 >= 4 ;
//! x1 +x2 = 1 ;
//! ```
//!
//! `~` negates a literal, a missing weight defaults to 1, `=` expands into
//! the two `>=` constraints, and every statement ends with a semicolon.

use crate::sat::clause::Weight;
use crate::sat::constraint::PbConstr;
use crate::sat::error::{Error, Result};
use crate::sat::literal::Lit;
use crate::sat::problem::Problem;
use std::io::BufRead;

/// Parses an OPB problem from a reader.
///
/// # Errors
///
/// `Error::Format` on a missing semicolon, an unknown operator or an
/// unparsable term; `Error::Domain` on weights that overflow.
pub fn parse_opb<R: BufRead>(reader: R) -> Result<Problem> {
    let mut pb = Problem::default();
    let mut constrs = Vec::new();
    let mut objective = None;
    for line in reader.lines() {
        let line = line.map_err(|e| Error::Format(format!("could not read input: {e}")))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('*') {
            continue;
        }
        parse_line(&mut pb, trimmed, &mut constrs, &mut objective)?;
    }
    let mut pb = install_constrs(&pb, &constrs);
    if let Some((lits, weights)) = objective {
        let min_lits = lits.iter().map(|&l| Lit::from_dimacs(l)).collect();
        pb.set_cost_func(min_lits, Some(weights));
    }
    Ok(pb)
}

/// Parses an OPB problem from a string.
///
/// # Errors
///
/// As [`parse_opb`].
pub fn parse_opb_str(text: &str) -> Result<Problem> {
    parse_opb(std::io::Cursor::new(text))
}

type Objective = (Vec<i32>, Vec<Weight>);

fn parse_line(
    pb: &mut Problem,
    line: &str,
    constrs: &mut Vec<PbConstr>,
    objective: &mut Option<Objective>,
) -> Result<()> {
    let Some(stmt) = line.strip_suffix(';').map(str::trim) else {
        return Err(Error::Format(format!(
            "line {line:?} does not end with a semicolon"
        )));
    };
    let fields: Vec<&str> = stmt.split_whitespace().collect();
    if fields.is_empty() {
        return Err(Error::Format(format!("empty statement in line {line:?}")));
    }
    if fields[0] == "min:" {
        let (weights, lits) = parse_terms(pb, &fields[1..], line)?;
        *objective = Some((lits, weights));
        return Ok(());
    }
    if fields.len() < 3 {
        return Err(Error::Format(format!("invalid syntax {line:?}")));
    }
    let operator = fields[fields.len() - 2];
    if operator != ">=" && operator != "=" {
        return Err(Error::Format(format!(
            "invalid operator {operator:?} in {line:?}: expected \">=\" or \"=\""
        )));
    }
    let rhs: Weight = fields[fields.len() - 1].parse().map_err(|_| {
        Error::Format(format!(
            "invalid value {:?} in {line:?}",
            fields[fields.len() - 1]
        ))
    })?;
    let (weights, lits) = parse_terms(pb, &fields[..fields.len() - 2], line)?;
    if operator == ">=" {
        constrs.push(PbConstr::gt_eq(&lits, &weights, rhs));
    } else {
        constrs.extend(PbConstr::eq(&lits, &weights, rhs));
    }
    Ok(())
}

/// Parses a sequence of `[weight] [~]x<id>` terms. A term without a weight
/// has weight 1.
fn parse_terms(pb: &mut Problem, terms: &[&str], line: &str) -> Result<(Vec<Weight>, Vec<i32>)> {
    let mut weights = Vec::with_capacity(terms.len() / 2);
    let mut lits = Vec::with_capacity(terms.len() / 2);
    let mut i = 0;
    while i < terms.len() {
        let term = terms[i].trim_start_matches('+');
        let (weight, name) = if let Ok(w) = term.parse::<Weight>() {
            i += 1;
            if i == terms.len() {
                return Err(Error::Format(format!(
                    "weight {w} without a variable in {line:?}"
                )));
            }
            (w, terms[i])
        } else {
            (1, term)
        };
        let (negated, ident) = match name.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, name),
        };
        let Some(idx) = ident.strip_prefix('x') else {
            return Err(Error::Format(format!(
                "invalid variable name {name:?} in {line:?}"
            )));
        };
        let var: i32 = idx
            .parse()
            .map_err(|_| Error::Format(format!("invalid variable {name:?} in {line:?}")))?;
        if var <= 0 {
            return Err(Error::Domain(format!(
                "variable index {var} out of range in {line:?}"
            )));
        }
        lits.push(if negated { -var } else { var });
        weights.push(weight);
        if var as usize > pb.nb_vars {
            pb.nb_vars = var as usize;
        }
        i += 1;
    }
    Ok((weights, lits))
}

fn install_constrs(template: &Problem, constrs: &[PbConstr]) -> Problem {
    let mut pb = Problem::parse_pb_constrs(constrs);
    pb.grow_to(template.nb_vars);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::literal::Status;

    #[test]
    fn test_parse_simple() {
        let pb = parse_opb_str(
            "* a comment\n\
             2 x1 +3 x2 >= 3 ;\n",
        )
        .unwrap();
        assert_eq!(pb.nb_vars, 2);
        assert_eq!(pb.clauses.len(), 1);
        assert!(pb.clauses[0].is_pseudo_boolean());
    }

    #[test]
    fn test_parse_objective() {
        let pb = parse_opb_str(
            "min: 1 x1 +2 ~x2 ;\n\
             x1 +x2 >= 1 ;\n",
        )
        .unwrap();
        assert!(pb.optim());
        assert_eq!(pb.min_lits.as_ref().unwrap().len(), 2);
        assert_eq!(pb.min_weights, Some(vec![1, 2]));
    }

    #[test]
    fn test_weightless_terms() {
        let pb = parse_opb_str("x1 +x2 +x3 >= 2 ;\n").unwrap();
        assert_eq!(pb.clauses.len(), 1);
        assert_eq!(pb.clauses[0].cardinality(), 2);
        assert!(!pb.clauses[0].is_pseudo_boolean());
    }

    #[test]
    fn test_negated_literal() {
        let pb = parse_opb_str("2 ~x1 +1 x2 >= 2 ;\n").unwrap();
        // ~x1 is forced: weight sum without it cannot reach 2.
        assert_eq!(pb.model.value(0), Some(false));
    }

    #[test]
    fn test_equality_expands() {
        let pb = parse_opb_str("x1 +x2 = 1 ;\n").unwrap();
        // x1 + x2 >= 1 and ~x1 + ~x2 >= 1.
        assert_eq!(pb.clauses.len(), 2);
    }

    #[test]
    fn test_unsat_constraint() {
        let pb = parse_opb_str("1 x1 +1 x2 >= 3 ;\n").unwrap();
        assert_eq!(pb.status, Status::Unsat);
    }

    #[test]
    fn test_missing_semicolon() {
        assert!(matches!(
            parse_opb_str("x1 +x2 >= 1\n").unwrap_err(),
            Error::Format(_)
        ));
    }

    #[test]
    fn test_bad_operator() {
        assert!(parse_opb_str("x1 +x2 <= 1 ;\n").is_err());
    }

    #[test]
    fn test_bad_variable() {
        assert!(parse_opb_str("2 y1 >= 1 ;\n").is_err());
        assert!(parse_opb_str("2 x0 >= 1 ;\n").is_err());
    }
}
