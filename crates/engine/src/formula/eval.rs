// Formula evaluator - executes the parsed AST against a cell lookup

use crate::cell::CellValue;
use crate::position::Position;

use super::parser::{Expr, Op, UnaryOp};
use super::FormulaError;

/// Lookup seam between a formula and the grid it reads.
///
/// The sheet implements this; evaluation never touches the cell map directly.
pub trait CellLookup {
    /// Current public value of the cell at `pos`, or `None` when the cell
    /// is absent from the grid.
    fn cell_value(&self, pos: Position) -> Option<CellValue>;
}

/// Execute the AST. Errors short-circuit the walk and become the formula's
/// value at the layer above.
pub fn evaluate(expr: &Expr, lookup: &dyn CellLookup) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::CellRef(pos) => operand_value(*pos, lookup),
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, lookup)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Neg => -v,
            })
        }
        Expr::BinaryOp { op, left, right } => {
            let l = evaluate(left, lookup)?;
            let r = evaluate(right, lookup)?;
            Ok(match op {
                Op::Add => l + r,
                Op::Sub => l - r,
                Op::Mul => l * r,
                Op::Div => l / r,
            })
        }
    }
}

/// Coerce a referenced cell into a number:
/// - out-of-bounds position → `#REF!`
/// - absent cell → 0.0
/// - number → itself
/// - text: empty → 0.0, else after skipping leading whitespace the whole
///   remainder must parse as a decimal, otherwise `#VALUE!`
/// - error → re-raised unchanged
fn operand_value(pos: Position, lookup: &dyn CellLookup) -> Result<f64, FormulaError> {
    if !pos.is_valid() {
        return Err(FormulaError::Ref);
    }
    match lookup.cell_value(pos) {
        None => Ok(0.0),
        Some(CellValue::Number(n)) => Ok(n),
        Some(CellValue::Text(s)) => {
            if s.is_empty() {
                Ok(0.0)
            } else {
                s.trim_start().parse::<f64>().map_err(|_| FormulaError::Value)
            }
        }
        Some(CellValue::Error(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parser::parse;
    use std::collections::HashMap;

    struct MapLookup(HashMap<Position, CellValue>);

    impl CellLookup for MapLookup {
        fn cell_value(&self, pos: Position) -> Option<CellValue> {
            self.0.get(&pos).cloned()
        }
    }

    fn lookup(entries: &[(&str, CellValue)]) -> MapLookup {
        MapLookup(
            entries
                .iter()
                .map(|(a1, v)| (Position::parse_a1(a1).unwrap(), v.clone()))
                .collect(),
        )
    }

    fn eval(src: &str, lookup: &MapLookup) -> Result<f64, FormulaError> {
        evaluate(&parse(src).unwrap(), lookup)
    }

    #[test]
    fn test_arithmetic() {
        let empty = lookup(&[]);
        assert_eq!(eval("1+2*3", &empty), Ok(7.0));
        assert_eq!(eval("(1+2)*3", &empty), Ok(9.0));
        assert_eq!(eval("-3+1", &empty), Ok(-2.0));
        assert_eq!(eval("7/2", &empty), Ok(3.5));
    }

    #[test]
    fn test_absent_cell_reads_zero() {
        let empty = lookup(&[]);
        assert_eq!(eval("B2+5", &empty), Ok(5.0));
    }

    #[test]
    fn test_number_and_text_coercion() {
        let l = lookup(&[
            ("A1", CellValue::Number(10.0)),
            ("A2", CellValue::Text("15".into())),
            ("A3", CellValue::Text(String::new())),
            ("A4", CellValue::Text("abc".into())),
            ("A5", CellValue::Text("12 ".into())),
            ("A6", CellValue::Text(" 5".into())),
        ]);
        assert_eq!(eval("A1*2", &l), Ok(20.0));
        assert_eq!(eval("A2+1", &l), Ok(16.0));
        assert_eq!(eval("A3+1", &l), Ok(1.0));
        assert_eq!(eval("A4+1", &l), Err(FormulaError::Value));
        // Partial parses do not count: everything after leading whitespace
        // must be numeric.
        assert_eq!(eval("A5+1", &l), Err(FormulaError::Value));
        assert_eq!(eval("A6+1", &l), Ok(6.0));
    }

    #[test]
    fn test_error_values_reraise() {
        let l = lookup(&[("A1", CellValue::Error(FormulaError::Arithmetic))]);
        assert_eq!(eval("A1+1", &l), Err(FormulaError::Arithmetic));
    }

    #[test]
    fn test_out_of_bounds_ref() {
        let empty = lookup(&[]);
        assert_eq!(eval("ZZZZ99999+1", &empty), Err(FormulaError::Ref));
    }

    #[test]
    fn test_division_by_zero_returns_infinity() {
        // The finiteness gate lives in Formula::evaluate, not here.
        let empty = lookup(&[]);
        assert!(eval("1/0", &empty).unwrap().is_infinite());
    }
}
