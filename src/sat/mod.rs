#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The solver core: constraint representation, watcher lists, propagation,
//! conflict analysis, and the search / optimization / enumeration drivers.

pub mod analysis;
pub mod assignment;
pub mod clause;
pub mod constraint;
pub mod cutting_planes;
pub mod dimacs;
pub mod error;
pub mod heap;
pub mod lbd;
pub mod literal;
pub mod opb;
pub mod problem;
pub mod propagation;
pub mod solver;
pub mod watcher;

pub use clause::{Clause, Weight};
pub use constraint::{CardConstr, PbConstr};
pub use error::{Error, Result};
pub use literal::{Lit, Status, Var};
pub use problem::Problem;
pub use solver::{SolveResult, Solver, Stats, StopFlag};
