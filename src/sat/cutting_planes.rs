#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
//! Cutting-planes conflict analysis for pseudo-boolean constraints.
//!
//! Resolution on clauses does not transfer to PB constraints; the cutting
//! planes proof system does, using three operations: weakening (dropping
//! non-falsified literals whose weight does not divide evenly), division
//! with ceiling rounding, and linear combination ("clash"). The running
//! conflict is a sparse weight vector keyed by variable; the trail is
//! walked backward, clashing with the reason of each falsifying variable,
//! until a single falsified literal of the current level remains. This is
//! usually slower than first-UIP but dramatically stronger on instances
//! like the pigeonhole problem.
//!
//! The two weight vectors are scratch buffers owned by the solver, sized to
//! the variable count and reused across conflicts; the hot loop never
//! allocates.

use crate::sat::assignment::{DecLevel, Model};
use crate::sat::clause::{Clause, PbSimplify, Weight};
use crate::sat::literal::{signed, Lit, Var};
use crate::sat::solver::Solver;
use crate::sat::watcher::ClauseRef;

/// Scratch buffers for cutting-planes analysis.
#[derive(Debug, Clone, Default)]
pub(crate) struct CpBufs {
    weights1: Vec<Weight>,
    weights2: Vec<Weight>,
    /// Variables weakened out of the trail view during the walk.
    erased: Vec<bool>,
    /// Variables met during resolution, for activity bumping.
    seen: Vec<bool>,
}

impl CpBufs {
    pub(crate) fn new(nb_vars: usize) -> Self {
        Self {
            weights1: vec![0; nb_vars],
            weights2: vec![0; nb_vars],
            erased: vec![false; nb_vars],
            seen: vec![false; nb_vars],
        }
    }
}

/// The outcome of cutting-planes analysis.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PbLearned {
    /// The conflict reaches the top level: the problem is Unsat.
    Ground,
    /// The derived constraint forces all these literals at the top level.
    Propagate(Vec<Lit>),
    /// A new constraint, the literal it asserts, and the level to backjump
    /// to before asserting it.
    Constraint {
        clause: Clause,
        unit: Lit,
        bt_level: DecLevel,
    },
}

/// A PB constraint in set form: for each variable its signed weight (the
/// sign encodes the literal's polarity, 0 means absent), plus the
/// threshold.
#[derive(Debug)]
pub(crate) struct PbSet {
    weights: Vec<Weight>,
    card: Weight,
}

impl PbSet {
    /// Loads `c` into the given buffer.
    fn from_clause(c: &Clause, mut buffer: Vec<Weight>) -> Self {
        buffer.fill(0);
        for i in 0..c.len() {
            let lit = c.get(i);
            let w = c.weight(i);
            buffer[lit.var() as usize] = if lit.is_positive() { w } else { -w };
        }
        Self {
            weights: buffer,
            card: c.cardinality(),
        }
    }

    fn into_buffer(self) -> Vec<Weight> {
        self.weights
    }

    /// Materializes the set as a clause.
    fn to_clause(&self) -> Clause {
        let mut lits = Vec::new();
        let mut weights = Vec::new();
        for (i, &w) in self.weights.iter().enumerate() {
            if w == 0 {
                continue;
            }
            lits.push(signed(i as Var, w < 0));
            weights.push(w.abs());
        }
        Clause::new_pb(lits, weights, self.card)
    }

    /// True iff the negation of `lit` appears in the set; only then does a
    /// clash make progress.
    fn falsifies(&self, lit: Lit) -> bool {
        let w = self.weights[lit.var() as usize];
        w != 0 && (w < 0) == lit.is_positive()
    }

    /// Adds `other` into `self`. Opposite-polarity variables cancel up to
    /// the smaller weight, lowering the threshold accordingly. At least one
    /// variable's weight reaches zero in the process.
    fn clash(&mut self, other: &Self) {
        self.card += other.card;
        for (i, w2) in other.weights.iter().enumerate() {
            let w1 = self.weights[i];
            self.weights[i] += w2;
            if w1.signum() * w2.signum() < 0 {
                self.card -= w1.abs().min(w2.abs());
            }
        }
    }

    /// The only literal of level `lvl` falsified by the set, walking the
    /// trail backward from `ptr`, or `None` when there are none or several.
    fn only_falsified(
        &self,
        model: &Model,
        trail: &[Lit],
        mut ptr: isize,
        lvl: DecLevel,
        erased: &[bool],
    ) -> Option<Lit> {
        let mut res = None;
        while ptr >= 0 {
            let lit = trail[ptr as usize];
            let v = lit.var() as usize;
            let lit_lvl = if erased[v] { 0 } else { model.level(lit.var()) };
            if lit_lvl != lvl {
                // Out of the level: the walk is done.
                return res;
            }
            if self.falsifies(lit) {
                if res.is_some() {
                    return None;
                }
                res = Some(lit);
            }
            ptr -= 1;
        }
        res
    }

    /// The level to backjump to before asserting `falsified`: the highest
    /// level among the other variables of the set, excluding the asserting
    /// variable's own level.
    fn backtrack_level(&self, model: &Model, erased: &[bool], falsified: Lit) -> DecLevel {
        let v = falsified.var();
        let lvl = model.level(v);
        let mut max_lvl = 1;
        for (i, &w) in self.weights.iter().enumerate() {
            if w == 0 || i as Var == v || erased[i] {
                continue;
            }
            let lvl_i = model.level(i as Var);
            if lvl_i > max_lvl && lvl_i != lvl {
                max_lvl = lvl_i;
            }
        }
        max_lvl
    }

    /// Weakens the set around `locked`: every non-falsified literal whose
    /// weight is not a multiple of `locked`'s weight is dropped (its weight
    /// leaving the threshold), then everything is divided by that weight
    /// with ceiling rounding, bringing `locked`'s weight to one.
    fn round_to_one(&mut self, model: &Model, erased: &[bool], locked: Var) {
        let wi = self.weights[locked as usize].abs();
        debug_assert!(wi > 0, "rounding on a variable absent from the set");
        if wi <= 1 {
            return;
        }
        for j in 0..self.weights.len() {
            let wj = self.weights[j];
            if wj == 0 {
                continue;
            }
            let assign = if erased[j] { 0 } else { model[j as Var] };
            if wj % wi != 0 && (assign == 0 || ((assign > 0) == (wj > 0))) {
                // Not falsified: weaken the constraint by removing it.
                self.weights[j] = 0;
                self.card -= wj.abs();
            }
        }
        self.divide_by(wi);
    }

    /// Divides every weight and the threshold by `coeff`, rounding away
    /// from zero for weights and up for the threshold.
    fn divide_by(&mut self, coeff: Weight) {
        for w in &mut self.weights {
            if *w == 0 {
                continue;
            }
            *w = if *w % coeff == 0 {
                *w / coeff
            } else if *w > 0 {
                *w / coeff + 1
            } else {
                *w / coeff - 1
            };
        }
        self.card = if self.card % coeff == 0 {
            self.card / coeff
        } else {
            self.card / coeff + 1
        };
    }
}

impl Solver {
    /// Learns a new constraint from a PB conflict using cutting planes.
    pub(crate) fn cutting_planes(&mut self, confl: ClauseRef, mut lvl: DecLevel) -> PbLearned {
        let mut erased = std::mem::take(&mut self.cp_bufs.erased);
        let mut seen = std::mem::take(&mut self.cp_bufs.seen);
        erased.clear();
        erased.resize(self.nb_vars, false);
        seen.clear();
        seen.resize(self.nb_vars, false);
        self.clause_bump_activity(confl);
        for i in 0..self.wl[confl].len() {
            seen[self.wl[confl].get(i).var() as usize] = true;
        }
        let mut buf1 = std::mem::take(&mut self.cp_bufs.weights1);
        buf1.resize(self.nb_vars, 0);
        let mut pb = PbSet::from_clause(&self.wl[confl], buf1);
        let mut ptr = self.trail.len() as isize - 1;
        let finish = |s: &mut Self, pb: PbSet, erased: Vec<bool>, seen: Vec<bool>, out| {
            s.cp_bufs.weights1 = pb.into_buffer();
            s.cp_bufs.erased = erased;
            s.cp_bufs.seen = seen;
            out
        };
        let single = loop {
            if let Some(single) = pb.only_falsified(&self.model, &self.trail, ptr, lvl, &erased) {
                break single;
            }
            if lvl == 1 {
                // Top-level conflict.
                return finish(self, pb, erased, seen, PbLearned::Ground);
            }
            let mut lit = self.trail[ptr as usize];
            while !pb.falsifies(lit) {
                if self.reason[lit.var() as usize].is_none() {
                    lvl -= 1;
                }
                erased[lit.var() as usize] = true;
                ptr -= 1;
                if ptr < 0 {
                    return finish(self, pb, erased, seen, PbLearned::Ground);
                }
                lit = self.trail[ptr as usize];
            }
            let v = lit.var();
            // Eliminated variables are bumped twice.
            self.var_bump_activity(v);
            pb.round_to_one(&self.model, &erased, v);
            let Some(reason) = self.reason[v as usize] else {
                lvl -= 1;
                continue;
            };
            self.clause_bump_activity(reason);
            for i in 0..self.wl[reason].len() {
                seen[self.wl[reason].get(i).var() as usize] = true;
            }
            let mut buf2 = std::mem::take(&mut self.cp_bufs.weights2);
            buf2.resize(self.nb_vars, 0);
            let mut pb2 = PbSet::from_clause(&self.wl[reason], buf2);
            pb2.round_to_one(&self.model, &erased, v);
            pb.clash(&pb2);
            self.cp_bufs.weights2 = pb2.into_buffer();
        };
        let unit = single.negated();
        let bt_level = pb.backtrack_level(&self.model, &erased, unit);
        pb.round_to_one(&self.model, &erased, unit.var());
        for (v, flag) in seen.iter().enumerate() {
            if *flag {
                self.var_bump_activity(v as Var);
            }
        }
        let clause = pb.to_clause();
        let out = match clause.simplify_pb() {
            PbSimplify::Unsat => PbLearned::Ground,
            PbSimplify::Propagate(lits) => PbLearned::Propagate(lits),
            PbSimplify::Constraint(clause) => PbLearned::Constraint {
                clause,
                unit,
                bt_level,
            },
        };
        finish(self, pb, erased, seen, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::literal::Lit;

    fn lits(ds: &[i32]) -> Vec<Lit> {
        ds.iter().map(|&i| Lit::from_dimacs(i)).collect()
    }

    fn set(c: &Clause, nb_vars: usize) -> PbSet {
        PbSet::from_clause(c, vec![0; nb_vars])
    }

    #[test]
    fn test_from_clause_signs() {
        // 5 x1 + 3 ~x2 + 2 x4 + x5 >= 6 over five vars.
        let c = Clause::new_pb(lits(&[1, -2, 4, 5]), vec![5, 3, 2, 1], 6);
        let pb = set(&c, 5);
        assert_eq!(pb.weights, vec![5, -3, 0, 2, 1]);
        assert_eq!(pb.card, 6);
    }

    #[test]
    fn test_falsifies() {
        let c = Clause::new_pb(lits(&[1, -2]), vec![2, 3], 2);
        let pb = set(&c, 2);
        // x1 appears positively: assigning -1 falsifies it.
        assert!(pb.falsifies(Lit::from_dimacs(-1)));
        assert!(!pb.falsifies(Lit::from_dimacs(1)));
        // ~x2 appears: assigning 2 falsifies it.
        assert!(pb.falsifies(Lit::from_dimacs(2)));
        assert!(!pb.falsifies(Lit::from_dimacs(-2)));
    }

    #[test]
    fn test_clash_cancels_opposite_polarities() {
        // (3 x1 + 2 x2 >= 3) + (2 ~x1 + x3 >= 2):
        // x1 cancels up to 2, leaving x1 + 2 x2 + x3 >= 3.
        let c1 = Clause::new_pb(lits(&[1, 2]), vec![3, 2], 3);
        let c2 = Clause::new_pb(lits(&[-1, 3]), vec![2, 1], 2);
        let mut pb1 = set(&c1, 3);
        let pb2 = set(&c2, 3);
        pb1.clash(&pb2);
        assert_eq!(pb1.weights, vec![1, 2, 1]);
        assert_eq!(pb1.card, 3);
    }

    #[test]
    fn test_divide_by_rounds_up() {
        let c = Clause::new_pb(lits(&[1, 2, -3]), vec![6, 4, 3], 7);
        let mut pb = set(&c, 3);
        pb.divide_by(3);
        assert_eq!(pb.weights, vec![2, 2, -1]);
        assert_eq!(pb.card, 3);
    }

    #[test]
    fn test_round_to_one_weakens_and_divides() {
        // Nothing assigned: literals whose weight is not a multiple of
        // x1's weight 4 are weakened away, the rest divides.
        let c = Clause::new_pb(lits(&[1, 2, 3]), vec![4, 8, 3], 9);
        let mut pb = set(&c, 3);
        let model = Model::new(3);
        let erased = vec![false; 3];
        pb.round_to_one(&model, &erased, 0);
        // x3 (weight 3) is dropped, card 9 - 3 = 6, then division by 4:
        // x1 -> 1, x2 -> 2, card -> ceil(6/4) = 2.
        assert_eq!(pb.weights, vec![1, 2, 0]);
        assert_eq!(pb.card, 2);
    }

    #[test]
    fn test_round_to_one_keeps_falsified() {
        // x2 falsified at level 2: it is kept even though 3 % 4 != 0.
        let c = Clause::new_pb(lits(&[1, 2]), vec![4, 3], 5);
        let mut pb = set(&c, 2);
        let mut model = Model::new(2);
        model.assign(Lit::from_dimacs(-2), 2);
        let erased = vec![false; 2];
        pb.round_to_one(&model, &erased, 0);
        assert_eq!(pb.weights, vec![1, 1]);
        assert_eq!(pb.card, 2);
    }

    #[test]
    fn test_only_falsified() {
        // x1 + x2 + x3 >= 2, trail [-1, -2] both at level 2: two falsified
        // literals at the level, then exactly one once the walk passes -2.
        let c = Clause::new_pb(lits(&[1, 2, 3]), vec![1, 1, 1], 2);
        let pb = set(&c, 3);
        let mut model = Model::new(3);
        model.assign(Lit::from_dimacs(-1), 2);
        model.assign(Lit::from_dimacs(-2), 2);
        let trail = lits(&[-1, -2]);
        let erased = vec![false; 3];
        assert_eq!(pb.only_falsified(&model, &trail, 1, 2, &erased), None);
        assert_eq!(
            pb.only_falsified(&model, &trail, 0, 2, &erased),
            Some(Lit::from_dimacs(-1))
        );
    }

    #[test]
    fn test_to_clause_roundtrip() {
        let c = Clause::new_pb(lits(&[1, -2, 3]), vec![5, 3, 2], 6);
        let pb = set(&c, 3);
        let c2 = pb.to_clause();
        assert_eq!(c2.cardinality(), 6);
        assert_eq!(c2.len(), 3);
        assert_eq!(c2.weight(0), 5);
        assert_eq!(c2.get(0), Lit::from_dimacs(1));
    }
}
