#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! First-UIP conflict analysis for propositional and cardinality
//! constraints.
//!
//! Starting from the conflicting constraint, the analysis resolves against
//! the reason of the most recently assigned variable of the conflict level
//! until a single literal from that level remains — the asserting literal.
//! The learned clause is that literal plus every lower-level literal met on
//! the way, minimized by dropping literals already implied by the rest, and
//! laid out so position 0 holds the asserting literal and position 1 the
//! literal of the second-highest level (the backjump target).

use crate::sat::assignment::DecLevel;
use crate::sat::clause::Clause;
use crate::sat::literal::{Lit, Status};
use crate::sat::solver::Solver;
use crate::sat::watcher::ClauseRef;

/// Scratch buffers for conflict analysis, sized to the problem and reused
/// across conflicts.
#[derive(Debug, Clone, Default)]
pub(crate) struct AnalysisBufs {
    /// Literals of the learned clause being built.
    lits: Vec<Lit>,
    /// Variables already met during the resolution walk.
    met: Vec<bool>,
    /// Variables of the conflict level still to resolve.
    met_lvl: Vec<bool>,
}

impl AnalysisBufs {
    pub(crate) fn new(nb_vars: usize) -> Self {
        Self {
            lits: Vec::with_capacity(nb_vars.min(1024)),
            met: vec![false; nb_vars],
            met_lvl: vec![false; nb_vars],
        }
    }
}

/// The outcome of first-UIP analysis.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Learned {
    /// The conflict has no literal to assert: the problem is Unsat.
    Ground,
    /// A unit clause was learned; the literal holds at the top level.
    Unit(Lit),
    /// A clause of length at least 2 was learned.
    Clause(Clause),
}

impl Solver {
    /// Runs first-UIP analysis on the conflict `confl` raised at level
    /// `lvl`.
    pub(crate) fn learn_clause(&mut self, confl: ClauseRef, lvl: DecLevel) -> Learned {
        self.clause_bump_activity(confl);
        let mut lits = std::mem::take(&mut self.analysis.lits);
        let mut met = std::mem::take(&mut self.analysis.met);
        let mut met_lvl = std::mem::take(&mut self.analysis.met_lvl);
        lits.clear();
        lits.push(Lit::default()); // Room for the asserting literal.
        met.clear();
        met.resize(self.nb_vars, false);
        met_lvl.clear();
        met_lvl.resize(self.nb_vars, false);

        let mut nb_lvl = self.add_clause_lits(confl, lvl, &mut met, &mut met_lvl, &mut lits);
        let mut ptr = self.trail.len() - 1;
        while nb_lvl > 1 {
            // Walk back to the next conflict-level variable that matters.
            while !met_lvl[self.trail[ptr].var() as usize] {
                let v = self.trail[ptr].var();
                if self.model.level(v) == lvl {
                    // Deduced afterwards; not a cause of the conflict.
                    met[v as usize] = true;
                }
                ptr -= 1;
            }
            let v = self.trail[ptr].var();
            ptr = ptr.wrapping_sub(1);
            nb_lvl -= 1;
            if let Some(reason) = self.reason[v as usize] {
                self.clause_bump_activity(reason);
                for i in 0..self.wl[reason].len() {
                    let lit = self.wl[reason].get(i);
                    let v2 = lit.var();
                    if met[v2 as usize] || self.model.lit_status(lit) != Status::Unsat {
                        continue;
                    }
                    met[v2 as usize] = true;
                    self.var_bump_activity(v2);
                    if self.model.level(v2) == lvl {
                        met_lvl[v2 as usize] = true;
                        nb_lvl += 1;
                    } else if self.model.level(v2) != 1 {
                        lits.push(lit);
                    }
                }
            }
        }
        // The first conflict-level literal on the trail is the first UIP.
        let mut asserting = None;
        for &l in &self.trail {
            if met_lvl[l.var() as usize] {
                asserting = Some(l.negated());
                break;
            }
        }
        let Some(asserting) = asserting else {
            self.restore_bufs(lits, met, met_lvl);
            return Learned::Ground;
        };
        lits[0] = asserting;
        self.var_decay_activity();
        self.clause_decay_activity();
        sort_by_level(&mut lits, self);
        let sz = self.minimize_learned(&met, &mut lits);
        if sz == 1 {
            let unit = lits[0];
            self.restore_bufs(lits, met, met_lvl);
            return Learned::Unit(unit);
        }
        let mut learned = Clause::new_learned(lits[..sz].to_vec());
        learned.compute_lbd(&self.model);
        self.restore_bufs(lits, met, met_lvl);
        Learned::Clause(learned)
    }

    fn restore_bufs(&mut self, lits: Vec<Lit>, met: Vec<bool>, met_lvl: Vec<bool>) {
        self.analysis.lits = lits;
        self.analysis.met = met;
        self.analysis.met_lvl = met_lvl;
    }

    /// Seeds the analysis with the literals of the conflicting constraint.
    /// Returns how many conflict-level variables were met.
    fn add_clause_lits(
        &mut self,
        confl: ClauseRef,
        lvl: DecLevel,
        met: &mut [bool],
        met_lvl: &mut [bool],
        lits: &mut Vec<Lit>,
    ) -> usize {
        let mut nb_lvl = 0;
        for i in 0..self.wl[confl].len() {
            let l = self.wl[confl].get(i);
            let v = l.var();
            if self.model.lit_status(l) != Status::Unsat {
                // In constraints of cardinality > 1 some literals can be
                // true or unbound in the conflicting constraint: skip them.
                continue;
            }
            if met[v as usize] {
                continue;
            }
            met[v as usize] = true;
            self.var_bump_activity(v);
            if self.model.level(v) == lvl {
                met_lvl[v as usize] = true;
                nb_lvl += 1;
            } else if self.model.level(v) != 1 {
                lits.push(l);
            }
        }
        nb_lvl
    }

    /// Removes literals whose reason is entirely covered by the rest of the
    /// clause or by top-level assignments. Returns the minimized length.
    fn minimize_learned(&self, met: &[bool], learned: &mut [Lit]) -> usize {
        let mut sz = 1;
        for i in 1..learned.len() {
            let Some(reason) = self.reason[learned[i].var() as usize] else {
                learned[sz] = learned[i];
                sz += 1;
                continue;
            };
            for k in 0..self.wl[reason].len() {
                let lit = self.wl[reason].get(k);
                if !met[lit.var() as usize] && self.model.level(lit.var()) > 1 {
                    learned[sz] = learned[i];
                    sz += 1;
                    break;
                }
            }
        }
        sz
    }
}

/// Sorts literals by decreasing decision level, so the asserting literal is
/// first and the backjump level can be read from position 1.
fn sort_by_level(lits: &mut [Lit], s: &Solver) {
    lits.sort_by_key(|l| std::cmp::Reverse(s.model.level(l.var())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::literal::Status as LStatus;
    use crate::sat::problem::Problem;

    /// Builds a solver, forces the given decisions, and returns the solver
    /// plus the conflict raised by the last one.
    fn force_conflict(cnf: &[Vec<i32>], decisions: &[i32]) -> (Solver, ClauseRef, DecLevel) {
        let pb = Problem::parse_slice(cnf).unwrap();
        let mut s = Solver::new(pb);
        let mut lvl = 1;
        for (i, &d) in decisions.iter().enumerate() {
            lvl = i as DecLevel + 2;
            let confl = s.unify_literal(Lit::from_dimacs(d), lvl);
            if let Some(c) = confl {
                return (s, c, lvl);
            }
        }
        panic!("no conflict reached");
    }

    #[test]
    fn test_learns_asserting_clause() {
        // Deciding 1 then 2 falsifies (-1 -2 3) / (-3 -2): conflict at
        // level 3, and the learned clause asserts at level <= 3.
        let cnf = vec![vec![-1, -2, 3], vec![-3, -2]];
        let (mut s, confl, lvl) = force_conflict(&cnf, &[1, 2]);
        match s.learn_clause(confl, lvl) {
            Learned::Clause(c) => {
                assert!(c.learned());
                assert!(c.lbd() as usize <= c.len());
                let first_lvl = s.model.level(c.first().var());
                for i in 1..c.len() {
                    assert!(s.model.level(c.get(i).var()) <= first_lvl);
                }
            }
            Learned::Unit(u) => {
                // A unit is acceptable when minimization collapses the
                // clause; it must be a consequence at the top level.
                assert_eq!(s.model.lit_status(u), LStatus::Unsat);
            }
            Learned::Ground => panic!("unexpected ground conflict"),
        }
    }

    #[test]
    fn test_learns_unit() {
        // Deciding 1 propagates 2 via (-1 2) and conflicts with (-1 -2):
        // the first UIP is variable 1 itself, learned as the unit -1.
        let cnf = vec![vec![-1, 2], vec![-1, -2]];
        let (mut s, confl, lvl) = force_conflict(&cnf, &[1]);
        match s.learn_clause(confl, lvl) {
            Learned::Unit(u) => assert_eq!(u.to_dimacs(), -1),
            other => panic!("expected a unit, got {other:?}"),
        }
    }

    #[test]
    fn test_bumps_conflict_variables() {
        let cnf = vec![vec![-1, 2], vec![-1, -2]];
        let (mut s, confl, lvl) = force_conflict(&cnf, &[1]);
        let before: Vec<f64> = s.activity.clone();
        let _ = s.learn_clause(confl, lvl);
        assert!(
            s.activity.iter().zip(&before).any(|(a, b)| a > b),
            "conflict analysis must bump some variable activity"
        );
    }
}
