//! cardinal is a SAT and pseudo-boolean solver.
//!
//! The [`sat`] module is the core: a conflict-driven clause-learning engine
//! over a unified constraint representation covering propositional clauses,
//! cardinality constraints and weighted pseudo-boolean constraints, with
//! cost-function optimization and model enumeration on top.
//!
//! The [`maxsat`] module solves weighted MaxSAT problems over named
//! variables, and reads the WCNF format.
//!
//! The [`explain`] module helps understanding unsatisfiable instances: RUP
//! certificate checking, unsatisfiable-subset extraction, and minimal
//! unsatisfiable subsets (MUS) through three strategies.

pub mod command_line;
pub mod explain;
pub mod maxsat;
pub mod sat;
