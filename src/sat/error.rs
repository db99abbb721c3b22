#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Error kinds shared by the parsers and the solver's control surface.

use std::fmt;

/// Everything that can go wrong outside of the search itself.
///
/// Runtime invariant violations inside the search (watch-list corruption,
/// propagating an already-false literal) are bugs, not recoverable errors;
/// they are guarded by `debug_assert!` and treated as fatal. An invalid RUP
/// certificate is not an error either: the certificate checkers report it as
/// `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed input: a bad header, an unparsable integer, a missing
    /// clause terminator. Carries the offending line.
    Format(String),
    /// Well-formed but meaningless input: a literal outside
    /// `[1, nb_vars]`, a weight that would overflow, a negative
    /// cardinality.
    Domain(String),
    /// An operation was invoked in a state where it has no defined result,
    /// e.g. reading a model from a non-Sat solver or extracting a MUS from
    /// a satisfiable problem.
    Protocol(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(line) => write!(f, "format error: {line}"),
            Self::Domain(msg) => write!(f, "domain error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol misuse: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = Error::Format("p cnf x y".to_string());
        assert_eq!(e.to_string(), "format error: p cnf x y");
        let e = Error::Protocol("model requested on a non-Sat solver");
        assert!(e.to_string().starts_with("protocol misuse"));
    }
}
