//! Failures surfaced by the public sheet operations.
//!
//! Arithmetic failures inside formulas are *values*, not errors; see
//! [`crate::formula::FormulaError`]. This enum covers the operations that
//! refuse to run at all.

use std::error::Error;
use std::fmt;

use crate::position::Position;

/// Error returned by the fallible sheet operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpreadsheetError {
    /// A coordinate lies outside the fixed sheet bounds.
    InvalidPosition(Position),
    /// The formula parser rejected input that began with `=`.
    /// The target cell is left untouched.
    Formula(String),
    /// Installing the proposed body would close a reference cycle.
    /// The target cell, its references, and its dependents are left untouched.
    CircularDependency,
}

impl fmt::Display for SpreadsheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpreadsheetError::InvalidPosition(pos) => {
                write!(f, "position ({}, {}) is out of bounds", pos.row, pos.col)
            }
            SpreadsheetError::Formula(msg) => write!(f, "formula parse error: {}", msg),
            SpreadsheetError::CircularDependency => write!(f, "circular dependency detected"),
        }
    }
}

impl Error for SpreadsheetError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = SpreadsheetError::InvalidPosition(Position::new(20_000, 3));
        assert_eq!(e.to_string(), "position (20000, 3) is out of bounds");
        assert_eq!(
            SpreadsheetError::Formula("unexpected character: !".into()).to_string(),
            "formula parse error: unexpected character: !"
        );
        assert_eq!(
            SpreadsheetError::CircularDependency.to_string(),
            "circular dependency detected"
        );
    }
}
