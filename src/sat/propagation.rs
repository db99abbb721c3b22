#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
//! Boolean constraint propagation.
//!
//! One pass walks the trail from the first not-yet-propagated assignment.
//! For each newly true literal, three lanes are visited in order: binary
//! clauses (the cheap common case, resolved from the watch entry alone),
//! longer propositional clauses (blocking-literal scheme with watch
//! relocation), then cardinality and PB constraints. Newly propagated
//! literals append to the trail and are processed in that same order; the
//! pass runs to completion and returns the first conflicting constraint, if
//! any.

use crate::sat::assignment::DecLevel;
use crate::sat::literal::{Lit, Status};
use crate::sat::solver::Solver;
use crate::sat::watcher::{ClauseRef, Watcher};

/// What became of a cardinality/PB constraint after inspection.
enum LaneResult {
    /// The constraint stays watched on the triggering literal.
    Keep,
    /// The constraint re-seated its watches away from the triggering
    /// literal.
    Unwatch,
    /// The constraint cannot be satisfied any more.
    Conflict,
}

impl Solver {
    /// Binds `lit` at `lvl` and propagates. Returns the conflicting
    /// constraint, or `None` if a fixed point was reached.
    pub(crate) fn unify_literal(&mut self, lit: Lit, lvl: DecLevel) -> Option<ClauseRef> {
        self.model.assign(lit, lvl);
        self.trail.push(lit);
        self.propagate(self.trail.len() - 1, lvl)
    }

    /// Propagates the trail from position `ptr` onward.
    pub(crate) fn propagate(&mut self, mut ptr: usize, lvl: DecLevel) -> Option<ClauseRef> {
        while ptr < self.trail.len() {
            let lit = self.trail[ptr];
            self.stats.nb_propagations += 1;
            if let Some(confl) = self.propagate_binary(lit, lvl) {
                return Some(confl);
            }
            if let Some(confl) = self.propagate_prop(lit, lvl) {
                return Some(confl);
            }
            if let Some(confl) = self.propagate_pb(lit, lvl) {
                return Some(confl);
            }
            ptr += 1;
        }
        None
    }

    /// Seats `unit` as a consequence of `cref` at level `lvl`.
    pub(crate) fn propagate_unit(&mut self, cref: ClauseRef, lvl: DecLevel, unit: Lit) {
        debug_assert_eq!(self.model.lit_status(unit), Status::Indet);
        let v = unit.var();
        self.reason[v as usize] = Some(cref);
        self.wl[cref].lock();
        self.model.assign(unit, lvl);
        self.trail.push(unit);
    }

    /// The binary lane: each watch entry carries the other literal, so the
    /// clause itself is only touched to serve as a reason.
    fn propagate_binary(&mut self, lit: Lit, lvl: DecLevel) -> Option<ClauseRef> {
        for i in 0..self.wl.bin_watchers(lit).len() {
            let w = self.wl.bin_watchers(lit)[i];
            let v2 = w.other.var();
            let assign = self.model[v2];
            if assign == 0 {
                self.reason[v2 as usize] = Some(w.cref);
                self.wl[w.cref].lock();
                self.model.assign(w.other, lvl);
                self.trail.push(w.other);
            } else if (assign > 0) != w.other.is_positive() {
                return Some(w.cref);
            }
        }
        None
    }

    /// The propositional lane, with the blocking-literal optimization: an
    /// entry whose `other` literal is already true is skipped without
    /// touching the clause.
    fn propagate_prop(&mut self, lit: Lit, lvl: DecLevel) -> Option<ClauseRef> {
        let mut wl = self.wl.take_watchers(lit);
        let mut j = 0;
        let mut i = 0;
        while i < wl.len() {
            let w = wl[i];
            if self.model.lit_status(w.other) == Status::Sat {
                // Blocking literal is satisfied: don't explore the clause.
                wl[j] = w;
                j += 1;
                i += 1;
                continue;
            }
            let cref = w.cref;
            // Make sure the falsified watch sits at position 1.
            if self.wl[cref].first() == lit.negated() {
                self.wl[cref].swap(0, 1);
            }
            let first = self.wl[cref].first();
            let w2 = Watcher { cref, other: first };
            let first_status = self.model.lit_status(first);
            if first_status == Status::Sat {
                wl[j] = w2;
                j += 1;
            } else {
                let mut found = false;
                for k in 2..self.wl[cref].len() {
                    let lit_k = self.wl[cref].get(k);
                    if self.model.lit_status(lit_k) != Status::Unsat {
                        self.wl[cref].swap(1, k);
                        self.wl.push_watcher(lit_k.negated(), w2);
                        found = true;
                        break;
                    }
                }
                if !found {
                    // No replacement watch: unit propagation or conflict.
                    wl[j] = w2;
                    j += 1;
                    if first_status == Status::Unsat {
                        let remaining = wl.len() - (i + 1);
                        wl.copy_within(i + 1.., j);
                        wl.truncate(j + remaining);
                        self.wl.restore_watchers(lit, wl);
                        return Some(cref);
                    }
                    self.propagate_unit(cref, lvl, first);
                }
            }
            i += 1;
        }
        wl.truncate(j);
        self.wl.restore_watchers(lit, wl);
        None
    }

    /// The cardinality and PB lane.
    fn propagate_pb(&mut self, lit: Lit, lvl: DecLevel) -> Option<ClauseRef> {
        let mut list = self.wl.take_pb_watchers(lit);
        let mut j = 0;
        let mut i = 0;
        while i < list.len() {
            let cref = list[i];
            let res = if self.wl[cref].is_pseudo_boolean() {
                self.simplify_pseudo_bool(cref, lvl, lit)
            } else {
                self.simplify_card_constr(cref, lvl, lit)
            };
            match res {
                LaneResult::Keep => {
                    list[j] = cref;
                    j += 1;
                }
                LaneResult::Unwatch => {}
                LaneResult::Conflict => {
                    let remaining = list.len() - i;
                    list.copy_within(i.., j);
                    list.truncate(j + remaining);
                    self.wl.restore_pb_watchers(lit, list);
                    return Some(cref);
                }
            }
            i += 1;
        }
        list.truncate(j);
        self.wl.restore_pb_watchers(lit, list);
        None
    }

    /// Inspects a cardinality constraint after one of its watched literals
    /// became false. Counts satisfied / falsified / unbound literals:
    /// conflict when satisfaction became impossible, propagation of all
    /// unbound literals when they are all needed, otherwise false literals
    /// are swapped out of the watch prefix.
    fn simplify_card_constr(&mut self, cref: ClauseRef, lvl: DecLevel, skip: Lit) -> LaneResult {
        let length = self.wl[cref].len();
        let card = self.wl[cref].cardinality() as usize;
        let mut nb_true = 0;
        let mut nb_false = 0;
        let mut nb_unb = 0;
        for i in 0..length {
            let lit = self.wl[cref].get(i);
            match self.model.lit_status(lit) {
                Status::Indet => nb_unb += 1,
                Status::Sat => {
                    nb_true += 1;
                    if nb_true == card {
                        return LaneResult::Keep;
                    }
                }
                Status::Unsat => {
                    nb_false += 1;
                    if length - nb_false < card {
                        return LaneResult::Conflict;
                    }
                }
            }
            if nb_unb + nb_true > card {
                break;
            }
        }
        if nb_unb + nb_true == card {
            // Every unbound literal is needed to reach the cardinality.
            let mut i = 0;
            while nb_unb > 0 {
                let lit = self.wl[cref].get(i);
                if self.model[lit.var()] == 0 {
                    self.propagate_unit(cref, lvl, lit);
                    nb_unb -= 1;
                }
                i += 1;
            }
            return LaneResult::Keep;
        }
        self.swap_false(cref, skip)
    }

    /// Restores the watch invariant of a cardinality constraint by swapping
    /// false literals out of the first `cardinality + 1` positions. Must
    /// only be called when at least `cardinality + 1` literals are true or
    /// unbound. Entries keyed by `skip` are left to the caller.
    fn swap_false(&mut self, cref: ClauseRef, skip: Lit) -> LaneResult {
        let card = self.wl[cref].cardinality() as usize;
        let mut dropped_skip = false;
        let mut i = 0;
        let mut j = card + 1;
        while i < card + 1 {
            while self.model.lit_status(self.wl[cref].get(i)) != Status::Unsat {
                i += 1;
                if i == card + 1 {
                    return if dropped_skip {
                        LaneResult::Unwatch
                    } else {
                        LaneResult::Keep
                    };
                }
            }
            while self.model.lit_status(self.wl[cref].get(j)) == Status::Unsat {
                j += 1;
            }
            let false_lit = self.wl[cref].get(i);
            let fresh_lit = self.wl[cref].get(j);
            self.wl[cref].swap(i, j);
            if false_lit.negated() == skip {
                dropped_skip = true;
            } else {
                self.wl.remove_pb_watcher(false_lit.negated(), cref);
            }
            self.wl.push_pb_watcher(fresh_lit.negated(), cref);
            i += 1;
            j += 1;
        }
        if dropped_skip {
            LaneResult::Unwatch
        } else {
            LaneResult::Keep
        }
    }

    /// The slack of `c`: the weight the constraint can still lose before it
    /// becomes unsatisfiable, `Σ w_i · [lit i not falsified] − cardinality`.
    /// Also reports whether the constraint is already satisfied.
    fn slack_sum(&self, cref: ClauseRef) -> (i64, bool) {
        let c = &self.wl[cref];
        let card = c.cardinality();
        let mut slack = -card;
        let mut sum = 0;
        for i in 0..c.len() {
            let w = c.weight(i);
            match self.model.lit_status(c.get(i)) {
                Status::Indet => slack += w,
                Status::Sat => {
                    slack += w;
                    sum += w;
                    if sum >= card {
                        return (slack, true);
                    }
                }
                Status::Unsat => {}
            }
        }
        (slack, false)
    }

    /// Propagates all unbound literals of `c`.
    fn propagate_all(&mut self, cref: ClauseRef, lvl: DecLevel) {
        for i in 0..self.wl[cref].len() {
            let lit = self.wl[cref].get(i);
            if self.model.lit_status(lit) == Status::Indet {
                self.propagate_unit(cref, lvl, lit);
            }
        }
    }

    /// Inspects a PB constraint after one of its watched literals became
    /// false. Negative slack is a conflict; zero slack forces every unbound
    /// literal; otherwise every unbound literal whose weight exceeds the
    /// slack is forced, repeatedly, before the watches are re-seated.
    fn simplify_pseudo_bool(&mut self, cref: ClauseRef, lvl: DecLevel, skip: Lit) -> LaneResult {
        let mut found_unit = true;
        while found_unit {
            let (slack, sat) = self.slack_sum(cref);
            if sat {
                return LaneResult::Keep;
            }
            if slack < 0 {
                return LaneResult::Conflict;
            }
            if slack == 0 {
                self.propagate_all(cref, lvl);
                return LaneResult::Keep;
            }
            found_unit = false;
            for i in 0..self.wl[cref].len() {
                let lit = self.wl[cref].get(i);
                if self.model.lit_status(lit) == Status::Indet && self.wl[cref].weight(i) > slack {
                    self.propagate_unit(cref, lvl, lit);
                    found_unit = true;
                }
            }
        }
        self.update_watch_pb(cref, Some(skip))
    }

    /// Re-seats the watches of a freshly installed PB constraint against
    /// the current assignment. Used for constraints derived mid-search,
    /// whose position-based initial seating may cover falsified literals.
    pub(crate) fn reseat_pb_watches(&mut self, cref: ClauseRef) {
        if self.wl[cref].is_pseudo_boolean() {
            let _ = self.update_watch_pb(cref, None);
        }
    }

    /// Re-seats the watches of a PB constraint so the watched weight sum
    /// again covers `cardinality + max watched weight`. Entries keyed by
    /// `skip` are left to the caller.
    fn update_watch_pb(&mut self, cref: ClauseRef, skip: Option<Lit>) -> LaneResult {
        let card = self.wl[cref].cardinality();
        // Literals are ordered by decreasing weight, so the first non-false
        // literal carries the largest watched weight.
        let mut max_watched = 0;
        for i in 0..self.wl[cref].len() {
            if self.model.lit_status(self.wl[cref].get(i)) != Status::Unsat {
                max_watched = self.wl[cref].weight(i);
                break;
            }
        }
        let goal = card + max_watched;
        let mut keeps_skip = false;
        let mut weight_watched = 0;
        let mut i = 0;
        while weight_watched < goal && i < self.wl[cref].len() {
            let lit = self.wl[cref].get(i);
            if self.model.lit_status(lit) == Status::Unsat {
                if self.wl[cref].is_watched(i) {
                    if Some(lit.negated()) == skip {
                        keeps_skip = false;
                    } else {
                        self.wl.remove_pb_watcher(lit.negated(), cref);
                    }
                    self.wl[cref].set_watched(i, false);
                }
            } else {
                weight_watched += self.wl[cref].weight(i);
                if !self.wl[cref].is_watched(i) {
                    self.wl.push_pb_watcher(lit.negated(), cref);
                    self.wl[cref].set_watched(i, true);
                }
            }
            i += 1;
        }
        // Any remaining watched literals are now useless.
        while i < self.wl[cref].len() {
            if self.wl[cref].is_watched(i) {
                let lit = self.wl[cref].get(i);
                if Some(lit.negated()) == skip {
                    keeps_skip = false;
                } else {
                    self.wl.remove_pb_watcher(lit.negated(), cref);
                }
                self.wl[cref].set_watched(i, false);
            }
            i += 1;
        }
        if keeps_skip {
            LaneResult::Keep
        } else {
            LaneResult::Unwatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::constraint::PbConstr;
    use crate::sat::problem::Problem;

    fn solver(cnf: &[Vec<i32>]) -> Solver {
        Solver::new(Problem::parse_slice(cnf).unwrap())
    }

    #[test]
    fn test_binary_chain_propagation() {
        let mut s = solver(&[vec![-1, 2], vec![-2, 3], vec![-3, 4]]);
        let confl = s.unify_literal(Lit::from_dimacs(1), 2);
        assert!(confl.is_none());
        assert_eq!(s.trail.len(), 4);
        for d in [1, 2, 3, 4] {
            assert_eq!(s.model.lit_status(Lit::from_dimacs(d)), Status::Sat);
        }
    }

    #[test]
    fn test_binary_conflict() {
        let mut s = solver(&[vec![-1, 2], vec![-1, -2]]);
        let confl = s.unify_literal(Lit::from_dimacs(1), 2);
        assert!(confl.is_some());
    }

    #[test]
    fn test_long_clause_unit_propagation() {
        let mut s = solver(&[vec![1, 2, 3]]);
        assert!(s.unify_literal(Lit::from_dimacs(-1), 2).is_none());
        assert!(s.unify_literal(Lit::from_dimacs(-2), 3).is_none());
        assert_eq!(s.model.lit_status(Lit::from_dimacs(3)), Status::Sat);
        assert_eq!(s.model.level(2), 3);
    }

    #[test]
    fn test_watch_relocation() {
        let mut s = solver(&[vec![1, 2, 3, 4]]);
        assert!(s.unify_literal(Lit::from_dimacs(-1), 2).is_none());
        // Watches moved: assigning -2 must still leave 3 and 4 open.
        assert!(s.unify_literal(Lit::from_dimacs(-2), 3).is_none());
        assert_eq!(s.model.lit_status(Lit::from_dimacs(3)), Status::Indet);
        assert!(s.unify_literal(Lit::from_dimacs(-3), 4).is_none());
        assert_eq!(s.model.lit_status(Lit::from_dimacs(4)), Status::Sat);
    }

    #[test]
    fn test_card_propagation() {
        // At least 2 of {1 2 3}: falsifying 1 forces 2 and 3.
        let pb = Problem::parse_card_constrs(&[crate::sat::constraint::CardConstr::at_least(
            &[1, 2, 3],
            2,
        )]);
        let mut s = Solver::new(pb);
        assert!(s.unify_literal(Lit::from_dimacs(-1), 2).is_none());
        assert_eq!(s.model.lit_status(Lit::from_dimacs(2)), Status::Sat);
        assert_eq!(s.model.lit_status(Lit::from_dimacs(3)), Status::Sat);
    }

    #[test]
    fn test_card_conflict() {
        let pb = Problem::parse_card_constrs(&[crate::sat::constraint::CardConstr::at_least(
            &[1, 2, 3],
            2,
        )]);
        let mut s = Solver::new(pb);
        assert!(s.unify_literal(Lit::from_dimacs(-1), 2).is_none());
        let confl = s.unify_literal(Lit::from_dimacs(-2), 3);
        assert!(confl.is_some());
    }

    #[test]
    fn test_pb_propagates_heavy_literal() {
        // 4 x1 + 2 x2 + 2 x3 + 1 x4 >= 4: falsifying x2 leaves slack 3, so
        // only x1 (weight 4 > 3) is forced.
        let pb = Problem::parse_pb_constrs(&[PbConstr::gt_eq(&[1, 2, 3, 4], &[4, 2, 2, 1], 4)]);
        let mut s = Solver::new(pb);
        assert!(s.unify_literal(Lit::from_dimacs(-2), 2).is_none());
        assert_eq!(s.model.lit_status(Lit::from_dimacs(1)), Status::Sat);
        assert_eq!(s.model.lit_status(Lit::from_dimacs(3)), Status::Indet);
        assert_eq!(s.model.lit_status(Lit::from_dimacs(4)), Status::Indet);
    }

    #[test]
    fn test_pb_zero_slack_propagates_all() {
        // 3 x1 + 2 x2 + 2 x3 >= 5: falsifying x1 gives slack -1? No:
        // 2 + 2 - 5 = -1, conflict. Use >= 4: slack 0 forces x2 and x3.
        let pb = Problem::parse_pb_constrs(&[PbConstr::gt_eq(&[1, 2, 3], &[3, 2, 2], 4)]);
        let mut s = Solver::new(pb);
        assert!(s.unify_literal(Lit::from_dimacs(-1), 2).is_none());
        assert_eq!(s.model.lit_status(Lit::from_dimacs(2)), Status::Sat);
        assert_eq!(s.model.lit_status(Lit::from_dimacs(3)), Status::Sat);
    }

    #[test]
    fn test_pb_conflict() {
        let pb = Problem::parse_pb_constrs(&[PbConstr::gt_eq(&[1, 2, 3], &[3, 2, 2], 4)]);
        let mut s = Solver::new(pb);
        assert!(s.unify_literal(Lit::from_dimacs(-2), 2).is_none());
        assert!(s.unify_literal(Lit::from_dimacs(-3), 3).is_some());
    }

    #[test]
    fn test_trail_order_is_preserved() {
        let mut s = solver(&[vec![-1, 2], vec![-2, 3]]);
        s.unify_literal(Lit::from_dimacs(1), 2);
        let dimacs: Vec<i32> = s.trail.iter().map(|l| l.to_dimacs()).collect();
        assert_eq!(dimacs, vec![1, 2, 3]);
    }
}
