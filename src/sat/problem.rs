#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
//! The problem representation handed to the solver: a number of variables,
//! a set of non-unit constraints, the unit literals found so far, and an
//! optional optimization objective.
//!
//! Construction runs the only preprocessing this solver does: trivial
//! simplification. Top-level units are propagated into the other
//! constraints, satisfied constraints are dropped, falsified literals are
//! removed (with a cardinality adjustment for weighted constraints), and a
//! constraint that cannot be satisfied any more flips the whole problem to
//! `Unsat`.

use crate::sat::assignment::Model;
use crate::sat::clause::{Clause, Weight};
use crate::sat::constraint::{CardConstr, PbConstr};
use crate::sat::error::{Error, Result};
use crate::sat::literal::{Lit, Status};
use std::fmt;

/// A conjunction of constraints plus an optional cost function.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    /// Total number of variables.
    pub nb_vars: usize,
    /// The non-empty, non-unit constraints.
    pub clauses: Vec<Clause>,
    /// Status inferred during construction: `Unsat` if an empty clause was
    /// met or derived by unit propagation, `Sat` if nothing is left.
    pub status: Status,
    /// Unit literals found in the problem.
    pub units: Vec<Lit>,
    /// Top-level bindings inferred from the units (levels are ±1).
    pub model: Model,
    pub(crate) min_lits: Option<Vec<Lit>>,
    pub(crate) min_weights: Option<Vec<Weight>>,
}

impl Problem {
    /// Builds a problem from a well-formed CNF given as integer slices.
    ///
    /// # Errors
    ///
    /// `Error::Domain` if a 0 literal appears inside a clause.
    pub fn parse_slice(cnf: &[Vec<i32>]) -> Result<Self> {
        let mut pb = Self::default();
        for line in cnf {
            if line.is_empty() {
                pb.status = Status::Unsat;
                return Ok(pb);
            }
            let mut lits = Vec::with_capacity(line.len());
            for &val in line {
                if val == 0 {
                    return Err(Error::Domain(format!("null literal in clause {line:?}")));
                }
                let lit = Lit::from_dimacs(val);
                if lit.var() as usize >= pb.nb_vars {
                    pb.nb_vars = lit.var() as usize + 1;
                }
                lits.push(lit);
            }
            if lits.len() == 1 {
                pb.units.push(lits[0]);
            } else {
                pb.clauses.push(Clause::new(lits));
            }
        }
        if pb.install_units().is_ok() {
            pb.simplify();
        }
        Ok(pb)
    }

    /// Like [`Self::parse_slice`] but with an explicit variable count, for
    /// problems whose clauses do not mention every variable.
    ///
    /// # Errors
    ///
    /// As [`Self::parse_slice`].
    pub fn parse_slice_nb(cnf: &[Vec<i32>], nb_vars: usize) -> Result<Self> {
        let mut pb = Self::parse_slice(cnf)?;
        pb.grow_to(nb_vars);
        Ok(pb)
    }

    /// Extends the problem to at least `nb_vars` variables, leaving the new
    /// ones unconstrained.
    pub fn grow_to(&mut self, nb_vars: usize) {
        if self.nb_vars < nb_vars {
            self.nb_vars = nb_vars;
            let mut levels: Vec<i32> = self.model.iter().collect();
            levels.resize(nb_vars, 0);
            self.model = Model::from(levels);
        }
    }

    /// Builds a problem from cardinality constraints.
    ///
    /// # Panics
    ///
    /// Panics if a 0 literal appears in a constraint.
    #[must_use]
    pub fn parse_card_constrs(constrs: &[CardConstr]) -> Self {
        let mut pb = Self::default();
        for constr in constrs {
            let card = constr.at_least;
            if card == 0 {
                continue;
            }
            if constr.lits.len() < card {
                pb.status = Status::Unsat;
                return pb;
            }
            let lits: Vec<Lit> = constr
                .lits
                .iter()
                .map(|&val| {
                    assert_ne!(val, 0, "literal 0 found in constraint");
                    let lit = Lit::from_dimacs(val);
                    if lit.var() as usize >= pb.nb_vars {
                        pb.nb_vars = lit.var() as usize + 1;
                    }
                    lit
                })
                .collect();
            if lits.len() == card {
                pb.units.extend(lits);
            } else if card == 1 {
                pb.clauses.push(Clause::new(lits));
            } else {
                pb.clauses.push(Clause::new_card(lits, card));
            }
        }
        if pb.install_units().is_err() {
            return pb;
        }
        pb.simplify_card();
        pb
    }

    /// Builds a problem from pseudo-boolean constraints.
    #[must_use]
    pub fn parse_pb_constrs(constrs: &[PbConstr]) -> Self {
        let mut pb = Self::default();
        for constr in constrs {
            for &val in &constr.lits {
                let lit = Lit::from_dimacs(val);
                if lit.var() as usize >= pb.nb_vars {
                    pb.nb_vars = lit.var() as usize + 1;
                }
            }
            if pb.add_pb_constr(constr) {
                return pb;
            }
        }
        if pb.install_units().is_err() {
            return pb;
        }
        pb.simplify_pb();
        pb
    }

    /// Adds one PB constraint, returning true if the problem became Unsat.
    fn add_pb_constr(&mut self, constr: &PbConstr) -> bool {
        let card = constr.at_least;
        if card <= 0 {
            return false;
        }
        let sum = constr.weight_sum();
        if sum < card {
            self.status = Status::Unsat;
            return true;
        }
        let lits: Vec<Lit> = constr.lits.iter().map(|&v| Lit::from_dimacs(v)).collect();
        if sum == card {
            for lit in lits {
                if !self.units.contains(&lit) {
                    self.units.push(lit);
                }
            }
        } else {
            self.clauses.push(constr.to_clause());
        }
        false
    }

    /// Seats the collected units into the model, detecting contradictory
    /// units.
    fn install_units(&mut self) -> std::result::Result<(), ()> {
        self.model = Model::new(self.nb_vars);
        for i in 0..self.units.len() {
            let unit = self.units[i];
            let v = unit.var();
            if self.model[v] == 0 {
                self.model.assign(unit, 1);
            } else if (self.model[v] > 0) != unit.is_positive() {
                self.status = Status::Unsat;
                return Err(());
            }
        }
        Ok(())
    }

    /// True iff this is an optimization problem.
    #[must_use]
    pub fn optim(&self) -> bool {
        self.min_lits.is_some()
    }

    /// Declares the function to minimize: the weighted count of objective
    /// literals that end up true. If all weights are 1, `weights` can be
    /// `None`.
    ///
    /// # Panics
    ///
    /// Panics when `weights` is given with a different length than `lits`.
    pub fn set_cost_func(&mut self, lits: Vec<Lit>, weights: Option<Vec<Weight>>) {
        if let Some(ws) = &weights {
            assert_eq!(lits.len(), ws.len(), "lengths of lits and weights differ");
        }
        self.min_lits = Some(lits);
        self.min_weights = weights;
    }

    /// Registers a unit literal, updating the model. Sets `Unsat` on a
    /// contradiction.
    pub(crate) fn add_unit(&mut self, lit: Lit) {
        let v = lit.var();
        if self.model[v] != 0 {
            if (self.model[v] > 0) != lit.is_positive() {
                self.status = Status::Unsat;
            }
            return;
        }
        self.model.assign(lit, 1);
        self.units.push(lit);
    }

    /// Propositional trivial simplification: unit propagation at the top
    /// level, removal of satisfied clauses and falsified literals.
    pub(crate) fn simplify(&mut self) {
        let mut nb_clauses = self.clauses.len();
        let mut restart = true;
        while restart {
            restart = false;
            let mut i = 0;
            while i < nb_clauses {
                let mut nb_lits = self.clauses[i].len();
                let mut clause_sat = false;
                let mut j = 0;
                while j < nb_lits {
                    let lit = self.clauses[i].get(j);
                    match self.model[lit.var()] {
                        0 => j += 1,
                        lvl if (lvl > 0) == lit.is_positive() => {
                            clause_sat = true;
                            break;
                        }
                        _ => {
                            nb_lits -= 1;
                            let last = self.clauses[i].get(nb_lits);
                            self.clauses[i].set(j, last);
                        }
                    }
                }
                if clause_sat {
                    nb_clauses -= 1;
                    self.clauses.swap(i, nb_clauses);
                } else if nb_lits == 0 {
                    self.status = Status::Unsat;
                    return;
                } else if nb_lits == 1 {
                    self.add_unit(self.clauses[i].first());
                    if self.status == Status::Unsat {
                        return;
                    }
                    nb_clauses -= 1;
                    self.clauses.swap(i, nb_clauses);
                    // That unit might have made an earlier clause unit or sat.
                    restart = true;
                } else {
                    if self.clauses[i].len() != nb_lits {
                        self.clauses[i].shrink(nb_lits);
                    }
                    i += 1;
                }
            }
        }
        self.update_status(nb_clauses);
    }

    /// Trivial simplification for cardinality constraints.
    pub(crate) fn simplify_card(&mut self) {
        let mut nb_clauses = self.clauses.len();
        let mut restart = true;
        while restart {
            restart = false;
            let mut i = 0;
            while i < nb_clauses {
                let card = self.clauses[i].cardinality() as usize;
                let mut nb_lits = self.clauses[i].len();
                let mut clause_sat = false;
                let mut nb_sat = 0;
                let mut j = 0;
                while j < nb_lits {
                    let lit = self.clauses[i].get(j);
                    match self.model[lit.var()] {
                        0 => j += 1,
                        lvl if (lvl > 0) == lit.is_positive() => {
                            nb_sat += 1;
                            if nb_sat == card {
                                clause_sat = true;
                                break;
                            }
                            j += 1;
                        }
                        _ => {
                            nb_lits -= 1;
                            let last = self.clauses[i].get(nb_lits);
                            self.clauses[i].set(j, last);
                        }
                    }
                }
                if clause_sat {
                    nb_clauses -= 1;
                    self.clauses.swap(i, nb_clauses);
                } else if nb_lits < card {
                    self.status = Status::Unsat;
                    return;
                } else if nb_lits == card {
                    for j in 0..nb_lits {
                        self.add_unit(self.clauses[i].get(j));
                        if self.status == Status::Unsat {
                            return;
                        }
                    }
                    nb_clauses -= 1;
                    self.clauses.swap(i, nb_clauses);
                    restart = true;
                } else {
                    if self.clauses[i].len() != nb_lits {
                        self.clauses[i].shrink(nb_lits);
                    }
                    i += 1;
                }
            }
        }
        self.update_status(nb_clauses);
    }

    /// Trivial simplification for PB constraints. Bound literals are
    /// removed; a satisfied literal also lowers the remaining cardinality
    /// by its weight. A literal whose absence would make the constraint
    /// unsatisfiable is forced.
    pub(crate) fn simplify_pb(&mut self) {
        let mut modified = true;
        while modified {
            modified = false;
            let mut i = 0;
            while i < self.clauses.len() {
                let mut card = self.clauses[i].cardinality();
                let mut w_sum = self.clauses[i].weight_sum();
                let mut j = 0;
                while j < self.clauses[i].len() {
                    let lit = self.clauses[i].get(j);
                    let w = self.clauses[i].weight(j);
                    let binding = self.model[lit.var()];
                    if binding == 0 {
                        if w_sum - w < card {
                            // The clause cannot be satisfied without it.
                            self.add_unit(lit);
                            if self.status == Status::Unsat {
                                return;
                            }
                            self.clauses[i].remove_lit(j);
                            card -= w;
                            w_sum -= w;
                            if card >= 1 {
                                self.clauses[i].update_cardinality(-w);
                            }
                            modified = true;
                        } else {
                            j += 1;
                        }
                    } else {
                        w_sum -= w;
                        if (binding > 0) == lit.is_positive() {
                            card -= w;
                            if card >= 1 {
                                self.clauses[i].update_cardinality(-w);
                            }
                        }
                        self.clauses[i].remove_lit(j);
                        modified = true;
                    }
                }
                if card <= 0 {
                    self.clauses.swap_remove(i);
                    modified = true;
                } else if w_sum < card {
                    self.clauses.clear();
                    self.status = Status::Unsat;
                    return;
                } else {
                    i += 1;
                }
            }
        }
        if self.status == Status::Indet && self.clauses.is_empty() {
            self.status = Status::Sat;
        }
    }

    fn update_status(&mut self, nb_clauses: usize) {
        self.clauses.truncate(nb_clauses);
        if self.status == Status::Indet && nb_clauses == 0 {
            self.status = Status::Sat;
        }
    }

    /// DIMACS CNF rendering of the problem.
    #[must_use]
    pub fn cnf_string(&self) -> String {
        let mut res = format!(
            "p cnf {} {}\n",
            self.nb_vars,
            self.clauses.len() + self.units.len()
        );
        for unit in &self.units {
            res.push_str(&format!("{} 0\n", unit.to_dimacs()));
        }
        for clause in &self.clauses {
            res.push_str(&clause.cnf_string());
            res.push('\n');
        }
        res
    }

    /// OPB rendering of the problem, including the cost function if any.
    #[must_use]
    pub fn pb_string(&self) -> String {
        let mut res = self.cost_func_string();
        for unit in &self.units {
            let val = u8::from(unit.is_positive());
            res.push_str(&format!("1 x{} = {val} ;\n", unit.var() + 1));
        }
        for clause in &self.clauses {
            res.push_str(&clause.pb_string());
            res.push('\n');
        }
        res
    }

    fn cost_func_string(&self) -> String {
        let Some(min_lits) = &self.min_lits else {
            return String::new();
        };
        let mut res = String::from("min: ");
        for (i, lit) in min_lits.iter().enumerate() {
            let w = self.min_weights.as_ref().map_or(1, |ws| ws[i]);
            if i != 0 && w >= 0 {
                res.push('+');
            }
            let d = lit.to_dimacs();
            let (neg, v) = if d < 0 { ("~", -d) } else { ("", d) };
            res.push_str(&format!("{w} {neg}x{v}"));
        }
        res.push_str(" ;\n");
        res
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optim() || self.clauses.iter().any(Clause::is_pseudo_boolean) {
            write!(f, "{}", self.pb_string())
        } else {
            write!(f, "{}", self.cnf_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slice() {
        let pb = Problem::parse_slice(&[vec![1, 2, 3], vec![-1, 2], vec![3]]).unwrap();
        assert_eq!(pb.nb_vars, 3);
        assert_eq!(pb.units, vec![Lit::from_dimacs(3)]);
        assert_eq!(pb.status, Status::Indet);
    }

    #[test]
    fn test_parse_slice_empty_clause() {
        let pb = Problem::parse_slice(&[vec![1, 2], vec![]]).unwrap();
        assert_eq!(pb.status, Status::Unsat);
    }

    #[test]
    fn test_parse_slice_null_literal() {
        assert!(Problem::parse_slice(&[vec![1, 0, 2]]).is_err());
    }

    #[test]
    fn test_simplify_propagates_units() {
        // 1 is a unit, so (-1 2) becomes the unit 2, so (-2 3) forces 3.
        let pb = Problem::parse_slice(&[vec![1], vec![-1, 2], vec![-2, 3]]).unwrap();
        assert_eq!(pb.status, Status::Sat);
        assert_eq!(pb.model.value(0), Some(true));
        assert_eq!(pb.model.value(1), Some(true));
        assert_eq!(pb.model.value(2), Some(true));
    }

    #[test]
    fn test_simplify_detects_unsat() {
        let pb = Problem::parse_slice(&[vec![1], vec![-1]]).unwrap();
        assert_eq!(pb.status, Status::Unsat);
    }

    #[test]
    fn test_card_all_forced() {
        // 3 literals, at least 3 true: all units.
        let pb = Problem::parse_card_constrs(&[CardConstr::at_least(&[1, 2, 3], 3)]);
        assert_eq!(pb.status, Status::Sat);
        assert_eq!(pb.units.len(), 3);
    }

    #[test]
    fn test_card_unsat() {
        let pb = Problem::parse_card_constrs(&[CardConstr::at_least(&[1, 2], 3)]);
        assert_eq!(pb.status, Status::Unsat);
    }

    #[test]
    fn test_pb_forced_literal() {
        // 5 x1 + 1 x2 >= 5: x1 is forced.
        let pb = Problem::parse_pb_constrs(&[PbConstr::gt_eq(&[1, 2], &[5, 1], 5)]);
        assert_eq!(pb.model.value(0), Some(true));
    }

    #[test]
    fn test_empty_problem_is_sat() {
        let pb = Problem::parse_slice(&[]).unwrap();
        assert_eq!(pb.status, Status::Sat);
        assert_eq!(pb.nb_vars, 0);
    }

    #[test]
    fn test_cnf_string() {
        let pb = Problem::parse_slice(&[vec![1, -2], vec![2, 3]]).unwrap();
        let s = pb.cnf_string();
        assert!(s.starts_with("p cnf 3 2\n"));
        assert!(s.contains("1 -2 0"));
    }
}
