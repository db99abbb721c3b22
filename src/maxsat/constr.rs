#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Weighted constraints over named variables.

use crate::sat::Weight;
use std::fmt;

/// A potentially-negated boolean variable, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lit {
    pub var: String,
    pub negated: bool,
}

/// A new positive literal for the variable called `name`.
#[must_use]
pub fn var(name: &str) -> Lit {
    Lit {
        var: name.to_string(),
        negated: false,
    }
}

/// A new negated literal for the variable called `name`.
#[must_use]
pub fn not(name: &str) -> Lit {
    Lit {
        var: name.to_string(),
        negated: true,
    }
}

impl Lit {
    /// The logical negation of this literal.
    #[must_use]
    pub fn negation(&self) -> Self {
        Self {
            var: self.var.clone(),
            negated: !self.negated,
        }
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "¬{}", self.var)
        } else {
            write!(f, "{}", self.var)
        }
    }
}

/// A weighted pseudo-boolean constraint. A weight of 0 means the constraint
/// is hard (must be satisfied); any other weight is the cost of violating
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constr {
    pub lits: Vec<Lit>,
    /// Coefficient of each literal; `None` means all 1.
    pub coeffs: Option<Vec<Weight>>,
    /// Minimal weighted sum for the constraint to be satisfied.
    pub at_least: Weight,
    /// The cost of leaving the constraint unsatisfied, or 0 for a hard one.
    pub weight: Weight,
}

/// A propositional clause that must be satisfied.
#[must_use]
pub fn hard_clause(lits: Vec<Lit>) -> Constr {
    Constr {
        lits,
        coeffs: None,
        at_least: 1,
        weight: 0,
    }
}

/// An optional propositional clause of cost 1.
#[must_use]
pub fn soft_clause(lits: Vec<Lit>) -> Constr {
    weighted_clause(lits, 1)
}

/// An optional propositional clause with the given cost.
#[must_use]
pub fn weighted_clause(lits: Vec<Lit>, weight: Weight) -> Constr {
    Constr {
        lits,
        coeffs: None,
        at_least: 1,
        weight,
    }
}

/// A pseudo-boolean constraint that must be satisfied.
#[must_use]
pub fn hard_pb_constr(lits: Vec<Lit>, coeffs: Vec<Weight>, at_least: Weight) -> Constr {
    Constr {
        lits,
        coeffs: Some(coeffs),
        at_least,
        weight: 0,
    }
}

/// An optional pseudo-boolean constraint with the given cost.
#[must_use]
pub fn weighted_pb_constr(
    lits: Vec<Lit>,
    coeffs: Vec<Weight>,
    at_least: Weight,
    weight: Weight,
) -> Constr {
    Constr {
        lits,
        coeffs: Some(coeffs),
        at_least,
        weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation() {
        let l = var("a");
        assert_eq!(l.negation(), not("a"));
        assert_eq!(l.negation().negation(), l);
    }

    #[test]
    fn test_display() {
        assert_eq!(var("x").to_string(), "x");
        assert_eq!(not("x").to_string(), "¬x");
    }

    #[test]
    fn test_hard_soft() {
        assert_eq!(hard_clause(vec![var("a")]).weight, 0);
        assert_eq!(soft_clause(vec![var("a")]).weight, 1);
        assert_eq!(weighted_clause(vec![var("a")], 5).weight, 5);
    }
}
