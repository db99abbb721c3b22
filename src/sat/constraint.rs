#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Constraint builders over integer (DIMACS-style) literals.
//!
//! These are the entry points for constructing problems programmatically:
//! cardinality constraints ([`CardConstr`]) and weighted pseudo-boolean
//! constraints ([`PbConstr`]). Literals are signed non-zero integers, as in
//! DIMACS; a negative weight is normalized away by negating its literal and
//! shifting the threshold.

use crate::sat::clause::{Clause, Weight};
use crate::sat::literal::Lit;

/// A cardinality constraint: at least `at_least` of `lits` must be true.
/// A propositional clause is a cardinality constraint with `at_least == 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardConstr {
    pub lits: Vec<i32>,
    pub at_least: usize,
}

impl CardConstr {
    /// At least one of the given literals must be true — a propositional
    /// clause.
    #[must_use]
    pub fn at_least1(lits: &[i32]) -> Self {
        Self {
            lits: lits.to_vec(),
            at_least: 1,
        }
    }

    /// At most one of the given literals may be true.
    #[must_use]
    pub fn at_most1(lits: &[i32]) -> Self {
        Self::at_most(lits, 1)
    }

    /// Exactly one of the given literals must be true: the conjunction of
    /// [`Self::at_least1`] and [`Self::at_most1`].
    #[must_use]
    pub fn exactly1(lits: &[i32]) -> Vec<Self> {
        vec![Self::at_least1(lits), Self::at_most1(lits)]
    }

    /// At least `n` of the given literals must be true.
    #[must_use]
    pub fn at_least(lits: &[i32], n: usize) -> Self {
        Self {
            lits: lits.to_vec(),
            at_least: n,
        }
    }

    /// At most `n` of the given literals may be true. Rewritten as "at least
    /// `len - n` of the negations are true".
    #[must_use]
    pub fn at_most(lits: &[i32], n: usize) -> Self {
        Self {
            lits: lits.iter().map(|&l| -l).collect(),
            at_least: lits.len() - n,
        }
    }
}

/// A pseudo-boolean constraint: `Σ weights[i] · lits[i] ≥ at_least`, where a
/// literal counts its weight when true. `weights == None` means every weight
/// is 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbConstr {
    pub lits: Vec<i32>,
    pub weights: Option<Vec<Weight>>,
    pub at_least: Weight,
}

impl PbConstr {
    /// A propositional clause as a PB constraint.
    #[must_use]
    pub fn prop_clause(lits: &[i32]) -> Self {
        Self {
            lits: lits.to_vec(),
            weights: None,
            at_least: 1,
        }
    }

    /// `Σ weights[i] · lits[i] ≥ n`. Negative weights are normalized by
    /// negating the literal and raising the threshold.
    ///
    /// # Panics
    ///
    /// Panics if `weights` is non-empty with a different length than `lits`.
    #[must_use]
    pub fn gt_eq(lits: &[i32], weights: &[Weight], n: Weight) -> Self {
        assert!(
            weights.is_empty() || weights.len() == lits.len(),
            "not as many literals as weights"
        );
        let mut lits = lits.to_vec();
        let mut weights = weights.to_vec();
        let mut n = n;
        for i in 0..weights.len() {
            if weights[i] < 0 {
                weights[i] = -weights[i];
                n += weights[i];
                lits[i] = -lits[i];
            }
        }
        let weights = if weights.is_empty() {
            None
        } else {
            Some(weights)
        };
        Self {
            lits,
            weights,
            at_least: n,
        }
    }

    /// `Σ weights[i] · lits[i] ≤ n`, rewritten over negated literals.
    #[must_use]
    pub fn lt_eq(lits: &[i32], weights: &[Weight], n: Weight) -> Self {
        let lits: Vec<i32> = lits.iter().map(|&l| -l).collect();
        let sum: Weight = weights.iter().sum();
        Self::gt_eq(&lits, weights, sum - n)
    }

    /// `Σ weights[i] · lits[i] = n`, expanded into the two inequalities.
    /// Trivial sides (threshold ≤ 0) are dropped.
    #[must_use]
    pub fn eq(lits: &[i32], weights: &[Weight], n: Weight) -> Vec<Self> {
        let ge = Self::gt_eq(lits, weights, n);
        let le = Self::lt_eq(lits, weights, n);
        let mut res = Vec::with_capacity(2);
        if ge.at_least > 0 {
            res.push(ge);
        }
        if le.at_least > 0 {
            res.push(le);
        }
        res
    }

    /// Sum of all weights.
    #[must_use]
    pub fn weight_sum(&self) -> Weight {
        self.weights
            .as_ref()
            .map_or(self.lits.len() as Weight, |ws| ws.iter().sum())
    }

    /// Lowers the constraint to the solver's clause representation.
    #[must_use]
    pub fn to_clause(&self) -> Clause {
        let lits: Vec<Lit> = self.lits.iter().map(|&l| Lit::from_dimacs(l)).collect();
        match &self.weights {
            Some(ws) => Clause::new_pb(lits, ws.clone(), self.at_least),
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            None => {
                if self.at_least == 1 {
                    Clause::new(lits)
                } else {
                    Clause::new_card(lits, self.at_least as usize)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_most1() {
        let c = CardConstr::at_most1(&[1, 2, 3]);
        assert_eq!(c.lits, vec![-1, -2, -3]);
        assert_eq!(c.at_least, 2);
    }

    #[test]
    fn test_exactly1() {
        let cs = CardConstr::exactly1(&[1, 2]);
        assert_eq!(cs.len(), 2);
        assert_eq!(cs[0].at_least, 1);
        assert_eq!(cs[1].lits, vec![-1, -2]);
        assert_eq!(cs[1].at_least, 1);
    }

    #[test]
    fn test_gt_eq_normalizes_negative_weights() {
        // -2 x1 + 3 x2 >= 1  ==  2 ~x1 + 3 x2 >= 3
        let c = PbConstr::gt_eq(&[1, 2], &[-2, 3], 1);
        assert_eq!(c.lits, vec![-1, 2]);
        assert_eq!(c.weights, Some(vec![2, 3]));
        assert_eq!(c.at_least, 3);
    }

    #[test]
    fn test_lt_eq() {
        // 2 x1 + 3 x2 <= 3  ==  2 ~x1 + 3 ~x2 >= 2
        let c = PbConstr::lt_eq(&[1, 2], &[2, 3], 3);
        assert_eq!(c.lits, vec![-1, -2]);
        assert_eq!(c.at_least, 2);
    }

    #[test]
    fn test_eq_drops_trivial_side() {
        // x1 + x2 >= 0 is trivial, only the <= side remains.
        let cs = PbConstr::eq(&[1, 2], &[1, 1], 0);
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].lits, vec![-1, -2]);
        assert_eq!(cs[0].at_least, 2);
    }

    #[test]
    fn test_to_clause_card() {
        let c = CardConstr::at_least(&[1, 2, 3], 2);
        let clause = PbConstr {
            lits: c.lits,
            weights: None,
            at_least: c.at_least as Weight,
        }
        .to_clause();
        assert_eq!(clause.cardinality(), 2);
        assert!(!clause.is_pseudo_boolean());
    }
}
