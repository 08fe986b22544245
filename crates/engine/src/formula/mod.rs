//! Parsed formulas, consumed by the cell layer as opaque objects.
//!
//! A [`Formula`] knows how to evaluate itself against a [`CellLookup`], list
//! the cells it reads, and render itself back to canonical text. Arithmetic
//! failures are carried as [`FormulaError`] *values*, never as panics or
//! public-API errors.

pub mod eval;
pub mod parser;

use std::fmt;

use crate::position::Position;

pub use eval::CellLookup;

/// Typed failure value carried through evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormulaError {
    /// Reference to a position outside the sheet bounds.
    Ref,
    /// A referenced cell's text could not be read as a number.
    Value,
    /// Division by zero, overflow, or any other non-finite result.
    Arithmetic,
}

impl FormulaError {
    /// Stable display token per category.
    pub fn token(&self) -> &'static str {
        match self {
            FormulaError::Ref => "#REF!",
            FormulaError::Value => "#VALUE!",
            FormulaError::Arithmetic => "#ARITHM!",
        }
    }
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    ast: parser::Expr,
}

impl Formula {
    /// Parse an expression source, without the leading `=`.
    pub fn parse(src: &str) -> Result<Formula, String> {
        Ok(Formula {
            ast: parser::parse(src)?,
        })
    }

    /// Evaluate against the grid. Exactly one AST execution per call; the
    /// caller is responsible for memoization. A non-finite result (division
    /// by zero, overflow, NaN) becomes an arithmetic error.
    pub fn evaluate(&self, lookup: &dyn CellLookup) -> Result<f64, FormulaError> {
        let result = eval::evaluate(&self.ast, lookup)?;
        if result.is_finite() {
            Ok(result)
        } else {
            Err(FormulaError::Arithmetic)
        }
    }

    /// In-bounds positions this formula reads, sorted row-major and
    /// deduplicated. Out-of-bounds references are omitted; they can never
    /// exist as cells and evaluate to `#REF!` instead.
    pub fn referenced_cells(&self) -> Vec<Position> {
        let mut refs = Vec::new();
        collect_refs(&self.ast, &mut refs);
        refs.retain(|p| p.is_valid());
        refs.sort_unstable();
        refs.dedup();
        refs
    }

    /// Canonical rendering without the leading `=`.
    pub fn expression(&self) -> String {
        parser::format_expr(&self.ast)
    }
}

fn collect_refs(expr: &parser::Expr, out: &mut Vec<Position>) {
    match expr {
        parser::Expr::Number(_) => {}
        parser::Expr::CellRef(p) => out.push(*p),
        parser::Expr::Unary { operand, .. } => collect_refs(operand, out),
        parser::Expr::BinaryOp { left, right, .. } => {
            collect_refs(left, out);
            collect_refs(right, out);
        }
    }
}
