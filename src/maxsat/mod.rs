#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
//! Weighted MaxSAT over named variables.
//!
//! Constraints are either hard (must hold) or soft (violations cost their
//! weight). Each soft constraint is compiled down to the core problem with
//! a fresh blocking literal whose weight is the constraint's; minimizing
//! the blocking literals minimizes the total violation cost.

pub mod constr;
pub mod wcnf;

pub use constr::{
    hard_clause, hard_pb_constr, not, soft_clause, var, weighted_clause, weighted_pb_constr,
    Constr, Lit,
};

use crate::sat::constraint::PbConstr;
use crate::sat::literal::Lit as CoreLit;
use crate::sat::{Solver, Weight};
use rustc_hash::FxHashMap;

/// A model: a binding for every named variable.
pub type Model = FxHashMap<String, bool>;

/// A weighted MaxSAT problem.
pub struct Problem {
    solver: Solver,
    /// For each named variable, its 1-based integer counterpart.
    int_vars: FxHashMap<String, i32>,
    /// For each integer value, the associated name; blocking literals get
    /// an empty name.
    var_ints: Vec<String>,
}

impl Problem {
    /// Compiles the given constraints into a solver.
    #[must_use]
    pub fn new(constrs: &[Constr]) -> Self {
        let mut int_vars = FxHashMap::default();
        let mut var_ints: Vec<String> = Vec::new();
        let mut block_lits: Vec<CoreLit> = Vec::new();
        let mut block_weights: Vec<Weight> = Vec::new();
        let mut pb_constrs = Vec::with_capacity(constrs.len());
        for constr in constrs {
            let mut lits: Vec<i32> = constr
                .lits
                .iter()
                .map(|lit| {
                    let next = var_ints.len() as i32 + 1;
                    let idx = *int_vars.entry(lit.var.clone()).or_insert_with(|| {
                        var_ints.push(lit.var.clone());
                        next
                    });
                    if lit.negated {
                        -idx
                    } else {
                        idx
                    }
                })
                .collect();
            let mut coeffs = constr.coeffs.clone().unwrap_or_default();
            if constr.weight != 0 {
                // Soft constraint: a fresh blocking literal satisfies it
                // outright, at the constraint's cost.
                var_ints.push(String::new());
                let bl = var_ints.len() as i32;
                block_lits.push(CoreLit::from_dimacs(bl));
                block_weights.push(constr.weight);
                lits.push(bl);
                if !coeffs.is_empty() {
                    coeffs.push(constr.at_least);
                }
            }
            pb_constrs.push(PbConstr::gt_eq(&lits, &coeffs, constr.at_least));
        }
        let mut pb = crate::sat::Problem::parse_pb_constrs(&pb_constrs);
        pb.grow_to(var_ints.len());
        pb.set_cost_func(block_lits, Some(block_weights));
        Self {
            solver: Solver::new(pb),
            int_vars,
            var_ints,
        }
    }

    /// Makes the underlying solver verbose, or not.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.solver.verbose = verbose;
    }

    /// Access to the underlying solver, for callers with specific needs.
    pub fn solver(&mut self) -> &mut Solver {
        &mut self.solver
    }

    /// The problem in the OPB format.
    #[must_use]
    pub fn output(&self) -> String {
        self.solver.pb_string()
    }

    /// Finds an optimal model and its cost, or `None` when the hard
    /// constraints cannot be satisfied.
    pub fn solve(&mut self) -> Option<(Model, Weight)> {
        let cost = self.solver.minimize();
        if cost < 0 {
            return None;
        }
        let bindings = self.solver.model().ok()?;
        let mut model = Model::default();
        for (i, name) in self.var_ints.iter().enumerate() {
            if !name.is_empty() {
                // Blocking literals stay internal.
                model.insert(name.clone(), bindings.get(i).copied().unwrap_or(false));
            }
        }
        Some((model, cost))
    }

    /// The integer variable associated with `name`, if it appeared in a
    /// constraint.
    #[must_use]
    pub fn int_var(&self, name: &str) -> Option<i32> {
        self.int_vars.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_soft() {
        // Hard: a ∨ b. Soft: ¬a (cost 1), ¬b (cost 1). One of the soft
        // constraints must break.
        let constrs = vec![
            hard_clause(vec![var("a"), var("b")]),
            soft_clause(vec![not("a")]),
            soft_clause(vec![not("b")]),
        ];
        let mut pb = Problem::new(&constrs);
        let (model, cost) = pb.solve().expect("hard constraints are satisfiable");
        assert_eq!(cost, 1);
        assert!(model["a"] ^ model["b"]);
    }

    #[test]
    fn test_weights_drive_choice() {
        // Breaking ¬a costs 5, breaking ¬b costs 1: the optimum sets b.
        let constrs = vec![
            hard_clause(vec![var("a"), var("b")]),
            weighted_clause(vec![not("a")], 5),
            weighted_clause(vec![not("b")], 1),
        ];
        let mut pb = Problem::new(&constrs);
        let (model, cost) = pb.solve().unwrap();
        assert_eq!(cost, 1);
        assert!(!model["a"] && model["b"]);
    }

    #[test]
    fn test_unsat_hard() {
        let constrs = vec![
            hard_clause(vec![var("a")]),
            hard_clause(vec![not("a")]),
            soft_clause(vec![var("b")]),
        ];
        let mut pb = Problem::new(&constrs);
        assert!(pb.solve().is_none());
    }

    #[test]
    fn test_all_satisfiable_costs_zero() {
        let constrs = vec![
            hard_clause(vec![var("a")]),
            soft_clause(vec![var("a"), var("b")]),
        ];
        let mut pb = Problem::new(&constrs);
        let (_, cost) = pb.solve().unwrap();
        assert_eq!(cost, 0);
    }

    #[test]
    fn test_double_units() {
        // Two identical soft units still count once each.
        let constrs = vec![
            soft_clause(vec![var("a")]),
            soft_clause(vec![var("a")]),
            hard_clause(vec![not("a")]),
        ];
        let mut pb = Problem::new(&constrs);
        let (model, cost) = pb.solve().unwrap();
        assert_eq!(cost, 2);
        assert!(!model["a"]);
    }
}
