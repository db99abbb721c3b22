#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The assignment model: a signed decision level per variable.
//!
//! For each variable the model stores a single `i32`:
//! - `0` means the variable is unassigned,
//! - `+d` means it was assigned true at decision level `d`,
//! - `-d` means it was assigned false at decision level `d`.
//!
//! Level 1 is reserved for top-level (problem-implied) assignments; actual
//! decisions start at level 2. The absolute value is the level, the sign is
//! the polarity, so one array answers both "what value does this variable
//! have" and "when was it assigned".

use crate::sat::literal::{Lit, Status, Var};
use std::ops::{Index, IndexMut};

/// A decision level. Level 0 is "unassigned", level 1 is top level,
/// decisions start at 2.
pub type DecLevel = i32;

/// Returns `lvl` signed according to the polarity of `l`.
#[must_use]
pub const fn signed_level(l: Lit, lvl: DecLevel) -> DecLevel {
    if l.is_positive() {
        lvl
    } else {
        -lvl
    }
}

/// A binding for all variables of a problem: for each variable, its signed
/// decision level. The binding can be partial.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Model(Vec<DecLevel>);

impl Model {
    /// A model for `nb_vars` variables, all unassigned.
    #[must_use]
    pub fn new(nb_vars: usize) -> Self {
        Self(vec![0; nb_vars])
    }

    #[must_use]
    pub fn nb_vars(&self) -> usize {
        self.0.len()
    }

    /// The decision level at which `v` was assigned, or 0 if unassigned.
    #[must_use]
    pub fn level(&self, v: Var) -> DecLevel {
        self.0[v as usize].abs()
    }

    /// True iff `v` has a binding.
    #[must_use]
    pub fn is_assigned(&self, v: Var) -> bool {
        self.0[v as usize] != 0
    }

    /// The value bound to `v`, if any.
    #[must_use]
    pub fn value(&self, v: Var) -> Option<bool> {
        match self.0[v as usize] {
            0 => None,
            lvl => Some(lvl > 0),
        }
    }

    /// Whether the current bindings make `l` true (`Sat`), false (`Unsat`)
    /// or leave it unbound (`Indet`).
    #[must_use]
    pub fn lit_status(&self, l: Lit) -> Status {
        let assign = self.0[l.var() as usize];
        if assign == 0 {
            Status::Indet
        } else if (assign > 0) == l.is_positive() {
            Status::Sat
        } else {
            Status::Unsat
        }
    }

    /// Binds the variable of `l` so that `l` is true at level `lvl`.
    pub fn assign(&mut self, l: Lit, lvl: DecLevel) {
        self.0[l.var() as usize] = signed_level(l, lvl);
    }

    /// Removes the binding of `v`.
    pub fn unassign(&mut self, v: Var) {
        self.0[v as usize] = 0;
    }

    /// One boolean per variable; unassigned variables read as false.
    #[must_use]
    pub fn bindings(&self) -> Vec<bool> {
        self.0.iter().map(|&lvl| lvl > 0).collect()
    }

    /// Iterates over signed levels, in variable order.
    pub fn iter(&self) -> impl Iterator<Item = DecLevel> + '_ {
        self.0.iter().copied()
    }
}

impl Index<Var> for Model {
    type Output = DecLevel;

    fn index(&self, v: Var) -> &DecLevel {
        &self.0[v as usize]
    }
}

impl IndexMut<Var> for Model {
    fn index_mut(&mut self, v: Var) -> &mut DecLevel {
        &mut self.0[v as usize]
    }
}

impl From<Vec<DecLevel>> for Model {
    fn from(levels: Vec<DecLevel>) -> Self {
        Self(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::literal::Lit;

    #[test]
    fn test_assign_unassign() {
        let mut m = Model::new(3);
        assert!(!m.is_assigned(0));
        m.assign(Lit::from_dimacs(1), 2);
        assert_eq!(m.value(0), Some(true));
        assert_eq!(m.level(0), 2);
        m.assign(Lit::from_dimacs(-2), 4);
        assert_eq!(m.value(1), Some(false));
        assert_eq!(m.level(1), 4);
        m.unassign(0);
        assert_eq!(m.value(0), None);
    }

    #[test]
    fn test_lit_status() {
        let mut m = Model::new(2);
        assert_eq!(m.lit_status(Lit::from_dimacs(1)), Status::Indet);
        m.assign(Lit::from_dimacs(1), 1);
        assert_eq!(m.lit_status(Lit::from_dimacs(1)), Status::Sat);
        assert_eq!(m.lit_status(Lit::from_dimacs(-1)), Status::Unsat);
        m.assign(Lit::from_dimacs(-2), 3);
        assert_eq!(m.lit_status(Lit::from_dimacs(2)), Status::Unsat);
        assert_eq!(m.lit_status(Lit::from_dimacs(-2)), Status::Sat);
    }

    #[test]
    fn test_signed_level() {
        assert_eq!(signed_level(Lit::from_dimacs(3), 5), 5);
        assert_eq!(signed_level(Lit::from_dimacs(-3), 5), -5);
    }

    #[test]
    fn test_bindings() {
        let mut m = Model::new(3);
        m.assign(Lit::from_dimacs(1), 1);
        m.assign(Lit::from_dimacs(-3), 2);
        assert_eq!(m.bindings(), vec![true, false, false]);
    }
}
