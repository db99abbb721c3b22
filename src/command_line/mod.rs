#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The command-line driver.

pub mod cli;
