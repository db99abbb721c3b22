#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Variable and literal encodings, and the three-valued `Status` type.
//!
//! Variables are plain `u32` indices starting at 0; the DIMACS variable 1 is
//! the internal variable 0. A literal packs a variable and its sign into a
//! single `u32` as `2 * var + (negated ? 1 : 0)`, so that negation is a
//! single bit flip and per-literal tables can be indexed directly with
//! [`Lit::index`].

use std::fmt;

/// A propositional variable, in `[0, nb_vars)`.
pub type Var = u32;

/// A literal: a variable together with a sign.
///
/// The DIMACS literal `-3` is encoded as `2 * (3 - 1) + 1 = 5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Lit(u32);

impl Lit {
    /// Builds a literal from a variable and a sign. `negated == false` gives
    /// the positive literal.
    #[must_use]
    pub const fn new(var: Var, negated: bool) -> Self {
        Self(var * 2 + negated as u32)
    }

    /// Builds a literal from a non-zero DIMACS integer.
    ///
    /// # Panics
    ///
    /// Panics if `i == 0`; `0` is the clause terminator, not a literal.
    #[must_use]
    pub fn from_dimacs(i: i32) -> Self {
        assert_ne!(i, 0, "0 is not a valid DIMACS literal");
        #[allow(clippy::cast_sign_loss)]
        if i < 0 {
            Self(2 * (-i as u32 - 1) + 1)
        } else {
            Self(2 * (i as u32 - 1))
        }
    }

    /// The variable of this literal.
    #[must_use]
    pub const fn var(self) -> Var {
        self.0 / 2
    }

    /// True iff this is the positive literal of its variable.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 % 2 == 0
    }

    /// The negation of this literal.
    #[must_use]
    pub const fn negated(self) -> Self {
        Self(self.0 ^ 1)
    }

    /// The equivalent signed DIMACS integer (1-based).
    #[must_use]
    pub const fn to_dimacs(self) -> i32 {
        #[allow(clippy::cast_possible_wrap)]
        let res = (self.0 / 2 + 1) as i32;
        if self.0 % 2 == 1 {
            -res
        } else {
            res
        }
    }

    /// Index for per-literal arrays of size `2 * nb_vars`.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The positive literal of `v`.
#[must_use]
pub const fn positive(v: Var) -> Lit {
    Lit::new(v, false)
}

/// The literal of `v`, negated iff `negated`.
#[must_use]
pub const fn signed(v: Var, negated: bool) -> Lit {
    Lit::new(v, negated)
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

/// The status of a problem, or of a constraint under a partial assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Not proven sat or unsat yet.
    #[default]
    Indet,
    /// Satisfied.
    Sat,
    /// Unsatisfiable (or falsified, for a constraint).
    Unsat,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indet => write!(f, "INDETERMINATE"),
            Self::Sat => write!(f, "SAT"),
            Self::Unsat => write!(f, "UNSAT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimacs_roundtrip() {
        for i in [1, -1, 3, -3, 42, -42] {
            assert_eq!(Lit::from_dimacs(i).to_dimacs(), i);
        }
    }

    #[test]
    fn test_encoding() {
        assert_eq!(Lit::from_dimacs(1).index(), 0);
        assert_eq!(Lit::from_dimacs(-1).index(), 1);
        assert_eq!(Lit::from_dimacs(-3).index(), 5);
        assert_eq!(Lit::from_dimacs(3).var(), 2);
        assert_eq!(Lit::from_dimacs(-3).var(), 2);
    }

    #[test]
    fn test_negation() {
        let l = Lit::from_dimacs(7);
        assert!(l.is_positive());
        assert!(!l.negated().is_positive());
        assert_eq!(l.negated().negated(), l);
        assert_eq!(l.negated().to_dimacs(), -7);
    }

    #[test]
    fn test_signed() {
        assert_eq!(signed(0, false).to_dimacs(), 1);
        assert_eq!(signed(0, true).to_dimacs(), -1);
        assert_eq!(positive(4), Lit::from_dimacs(5));
    }

    #[test]
    #[should_panic(expected = "not a valid DIMACS literal")]
    fn test_zero_rejected() {
        let _ = Lit::from_dimacs(0);
    }
}
