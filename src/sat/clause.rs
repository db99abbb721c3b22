#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
//! The unified constraint type.
//!
//! A [`Clause`] generalizes three kinds of constraints behind one
//! representation:
//! - a propositional clause: at least one literal must be true;
//! - a cardinality constraint: at least `k` literals must be true;
//! - a pseudo-boolean (PB) constraint: the weights of the true literals must
//!   sum to at least `k`.
//!
//! A clause is satisfied iff the sum of the weights of its satisfied
//! literals reaches its cardinality. Absent weights all default to 1, which
//! degenerates to the propositional and cardinality cases.
//!
//! Flags and the LBD-or-cardinality payload share a single `u32` header for
//! cache density: bit 31 is the learned flag, bit 30 the locked flag, and
//! the low 30 bits hold the LBD value (learned clauses) or `cardinality - 1`
//! (problem clauses). A learned clause is always propositional, so the two
//! payloads never conflict.

use crate::sat::assignment::Model;
use crate::sat::literal::Lit;
use bit_vec::BitVec;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use std::fmt;

/// The weight of a literal in a PB constraint.
pub type Weight = i64;

const LEARNED_MASK: u32 = 1 << 31;
const LOCKED_MASK: u32 = 1 << 30;
const BOTH_MASKS: u32 = LEARNED_MASK | LOCKED_MASK;

/// Weights and watch flags, present only for PB constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PbData {
    /// One weight per literal, all strictly positive.
    weights: Vec<Weight>,
    /// For each literal, whether it currently takes part in the watch set.
    watched: BitVec,
}

/// A constraint over literals. See the module documentation for the three
/// interpretations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Clause {
    lits: SmallVec<[Lit; 8]>,
    header: u32,
    activity: OrderedFloat<f32>,
    pb: Option<Box<PbData>>,
}

impl Clause {
    /// A propositional clause: at least one of `lits` must be true.
    #[must_use]
    pub fn new(lits: Vec<Lit>) -> Self {
        Self {
            lits: SmallVec::from_vec(lits),
            header: 0,
            activity: OrderedFloat(0.0),
            pb: None,
        }
    }

    /// A propositional clause from DIMACS integers. Test convenience.
    #[must_use]
    pub fn from_dimacs(lits: &[i32]) -> Self {
        Self::new(lits.iter().map(|&i| Lit::from_dimacs(i)).collect())
    }

    /// A cardinality constraint: at least `card` of `lits` must be true.
    /// `new_card(lits, 1)` is equivalent to `new(lits)`.
    ///
    /// # Panics
    ///
    /// Panics unless `1 <= card <= lits.len()`.
    #[must_use]
    pub fn new_card(lits: Vec<Lit>, card: usize) -> Self {
        assert!(
            card >= 1 && card <= lits.len(),
            "invalid cardinality {card} for {} literals",
            lits.len()
        );
        Self {
            lits: SmallVec::from_vec(lits),
            header: (card - 1) as u32,
            activity: OrderedFloat(0.0),
            pb: None,
        }
    }

    /// A PB constraint: the weights of the true literals must sum to at
    /// least `card`. All weights must be strictly positive (normalization of
    /// negative weights happens in the constraint builders).
    ///
    /// Literals are stored by decreasing weight; the watch logic relies on
    /// the first literal carrying the maximum weight.
    ///
    /// # Panics
    ///
    /// Panics if `weights` and `lits` have different lengths.
    #[must_use]
    pub fn new_pb(lits: Vec<Lit>, weights: Vec<Weight>, card: Weight) -> Self {
        assert_eq!(lits.len(), weights.len(), "one weight per literal");
        let mut terms: Vec<(Lit, Weight)> = lits.into_iter().zip(weights).collect();
        terms.sort_by_key(|&(_, w)| std::cmp::Reverse(w));
        let (lits, weights): (Vec<Lit>, Vec<Weight>) = terms.into_iter().unzip();
        let watched = BitVec::from_elem(lits.len(), false);
        Self {
            lits: SmallVec::from_vec(lits),
            header: (card - 1) as u32,
            activity: OrderedFloat(0.0),
            pb: Some(Box::new(PbData { weights, watched })),
        }
    }

    /// A clause produced by conflict analysis.
    #[must_use]
    pub fn new_learned(lits: Vec<Lit>) -> Self {
        Self {
            lits: SmallVec::from_vec(lits),
            header: LEARNED_MASK,
            activity: OrderedFloat(0.0),
            pb: None,
        }
    }

    /// Minimum number of true literals (weighted, for PB) needed to satisfy
    /// the clause. Always 1 for learned clauses.
    #[must_use]
    pub fn cardinality(&self) -> Weight {
        if self.learned() {
            1
        } else {
            Weight::from(self.header & !BOTH_MASKS) + 1
        }
    }

    /// True iff this clause was learned during search.
    #[must_use]
    pub const fn learned(&self) -> bool {
        self.header & LEARNED_MASK == LEARNED_MASK
    }

    /// True iff this clause carries explicit weights.
    #[must_use]
    pub const fn is_pseudo_boolean(&self) -> bool {
        self.pb.is_some()
    }

    pub(crate) fn lock(&mut self) {
        self.header |= LOCKED_MASK;
    }

    pub(crate) fn unlock(&mut self) {
        self.header &= !LOCKED_MASK;
    }

    /// A clause is locked when it is learned and currently serves as the
    /// reason for an assignment on the trail.
    #[must_use]
    pub(crate) const fn is_locked(&self) -> bool {
        self.header & BOTH_MASKS == BOTH_MASKS
    }

    #[must_use]
    pub(crate) const fn lbd(&self) -> u32 {
        self.header & !BOTH_MASKS
    }

    pub(crate) fn set_lbd(&mut self, lbd: u32) {
        self.header = (self.header & BOTH_MASKS) | lbd;
    }

    /// Recomputes the LBD: the number of distinct decision levels among the
    /// clause's literals.
    pub(crate) fn compute_lbd(&mut self, model: &Model) {
        let max_level = self
            .lits
            .iter()
            .map(|&l| model.level(l.var()))
            .max()
            .unwrap_or(0);
        let mut seen = BitVec::from_elem(max_level as usize + 1, false);
        let mut count = 0;
        for &l in &self.lits {
            let lvl = model.level(l.var()) as usize;
            if lvl > 0 && !seen.get(lvl).unwrap_or(true) {
                seen.set(lvl, true);
                count += 1;
            }
        }
        self.set_lbd(count.max(1));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }

    /// The first literal. For a watched propositional clause this is one of
    /// the two watching literals, and the asserting literal right after a
    /// backjump.
    #[must_use]
    pub fn first(&self) -> Lit {
        self.lits[0]
    }

    /// The second literal, the other propositional watch.
    #[must_use]
    pub fn second(&self) -> Lit {
        self.lits[1]
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Lit {
        self.lits[i]
    }

    pub fn set(&mut self, i: usize, l: Lit) {
        self.lits[i] = l;
    }

    pub fn swap(&mut self, i: usize, j: usize) {
        self.lits.swap(i, j);
        if let Some(pb) = &mut self.pb {
            pb.weights.swap(i, j);
            let wi = pb.watched.get(i).unwrap_or(false);
            let wj = pb.watched.get(j).unwrap_or(false);
            pb.watched.set(i, wj);
            pb.watched.set(j, wi);
        }
    }

    /// Truncates the clause to its first `new_len` literals.
    pub fn shrink(&mut self, new_len: usize) {
        self.lits.truncate(new_len);
        if let Some(pb) = &mut self.pb {
            pb.weights.truncate(new_len);
            pb.watched.truncate(new_len);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lit> {
        self.lits.iter()
    }

    /// The weight of the `i`th literal; 1 unless the clause is PB.
    #[must_use]
    pub fn weight(&self, i: usize) -> Weight {
        self.pb.as_ref().map_or(1, |pb| pb.weights[i])
    }

    /// Sum of the weights of all literals.
    #[must_use]
    pub fn weight_sum(&self) -> Weight {
        self.pb.as_ref().map_or(self.lits.len() as Weight, |pb| {
            pb.weights.iter().sum()
        })
    }

    /// Largest single weight.
    #[must_use]
    pub fn max_weight(&self) -> Weight {
        self.pb
            .as_ref()
            .map_or(1, |pb| pb.weights.iter().copied().max().unwrap_or(0))
    }

    /// Whether the `i`th literal is part of the PB watch set.
    #[must_use]
    pub(crate) fn is_watched(&self, i: usize) -> bool {
        self.pb
            .as_ref()
            .is_some_and(|pb| pb.watched.get(i).unwrap_or(false))
    }

    pub(crate) fn set_watched(&mut self, i: usize, watched: bool) {
        if let Some(pb) = &mut self.pb {
            pb.watched.set(i, watched);
        }
    }

    /// Removes the `i`th literal (and its weight) by swapping in the last
    /// one. The relative order of the remaining literals changes.
    pub fn remove_lit(&mut self, i: usize) {
        let last = self.lits.len() - 1;
        self.swap(i, last);
        self.lits.truncate(last);
        if let Some(pb) = &mut self.pb {
            pb.weights.truncate(last);
            pb.watched.truncate(last);
        }
    }

    /// Adjusts the remaining cardinality by `delta`. Called when a literal
    /// of weight `-delta` became satisfied at the top level and was removed:
    /// the rest of the clause only needs to cover what is left.
    ///
    /// Must not be called on learned clauses, whose payload is an LBD.
    pub fn update_cardinality(&mut self, delta: Weight) {
        debug_assert!(!self.learned());
        let card = self.cardinality() + delta;
        debug_assert!(card >= 1, "cardinality update made the clause trivial");
        self.header = (self.header & BOTH_MASKS) | (card - 1) as u32;
    }

    pub(crate) fn bump_activity(&mut self, inc: f32) {
        self.activity += inc;
    }

    pub(crate) fn scale_activity(&mut self, factor: f32) {
        self.activity *= factor;
    }

    #[must_use]
    pub(crate) const fn activity(&self) -> f32 {
        self.activity.0
    }

    /// The DIMACS rendering of the clause: space-separated literals,
    /// terminated by `0`. This is also the RUP certificate line format.
    #[must_use]
    pub fn cnf_string(&self) -> String {
        let lits = self.lits.iter().map(|l| l.to_dimacs()).join(" ");
        if lits.is_empty() {
            "0".to_string()
        } else {
            format!("{lits} 0")
        }
    }

    /// The OPB rendering of the clause: weighted terms, `>=`, cardinality.
    #[must_use]
    pub fn pb_string(&self) -> String {
        let terms = self
            .lits
            .iter()
            .enumerate()
            .map(|(i, &l)| {
                let d = l.to_dimacs();
                let (neg, v) = if d < 0 { ("~", -d) } else { ("", d) };
                format!("{} {neg}x{v}", self.weight(i))
            })
            .join(" +");
        format!("{terms} >= {} ;", self.cardinality())
    }
}

/// Outcome of [`Clause::simplify_pb`].
#[derive(Debug, Clone, PartialEq)]
pub enum PbSimplify {
    /// The weight sum cannot reach the cardinality: no assignment satisfies
    /// the constraint.
    Unsat,
    /// Every one of these literals must be true for the constraint to hold.
    Propagate(Vec<Lit>),
    /// The simplified constraint, still carrying at least two live literals.
    Constraint(Clause),
}

impl Clause {
    /// Normalizes a PB constraint: weights are saturated at the cardinality
    /// (a single literal can never contribute more than the threshold), and
    /// degenerate cases collapse.
    ///
    /// - weight sum < cardinality: [`PbSimplify::Unsat`];
    /// - weight sum == cardinality: every literal is forced,
    ///   [`PbSimplify::Propagate`];
    /// - cardinality 1: the constraint is a plain propositional clause;
    /// - all weights equal after saturation: the weights divide away and the
    ///   constraint becomes a cardinality constraint.
    #[must_use]
    pub fn simplify_pb(mut self) -> PbSimplify {
        let card = self.cardinality();
        debug_assert!(card >= 1);
        if let Some(pb) = &mut self.pb {
            for w in &mut pb.weights {
                if *w > card {
                    *w = card;
                }
            }
        }
        let sum = self.weight_sum();
        if sum < card {
            return PbSimplify::Unsat;
        }
        if sum == card {
            return PbSimplify::Propagate(self.lits.to_vec());
        }
        if card == 1 {
            return PbSimplify::Constraint(Self::new(self.lits.to_vec()));
        }
        if let Some(pb) = &self.pb {
            let w0 = pb.weights[0];
            if pb.weights.iter().all(|&w| w == w0) {
                let new_card = (card + w0 - 1) / w0;
                return PbSimplify::Constraint(Self::new_card(
                    self.lits.to_vec(),
                    new_card as usize,
                ));
            }
        }
        PbSimplify::Constraint(self)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pseudo_boolean() || self.cardinality() > 1 {
            write!(f, "{}", self.pb_string())
        } else {
            write!(f, "{}", self.cnf_string())
        }
    }
}
