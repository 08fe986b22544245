//! Cell bodies: Empty, Text, or Formula, behind one value-and-cache contract.
//!
//! A cell holds only its body. Reference and dependent edges live in the
//! sheet's dependency graph, keyed by position, so cells never point at each
//! other.

use std::cell::RefCell;
use std::fmt;

use crate::error::SpreadsheetError;
use crate::formula::{CellLookup, Formula, FormulaError};
use crate::position::Position;

/// Leading character marking a formula.
pub const FORMULA_SIGN: char = '=';
/// Leading character escaping a text cell's displayed value.
pub const ESCAPE_SIGN: char = '\'';

/// Public displayed value of a cell.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Error(FormulaError),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => f.write_str(&crate::formula::parser::format_number(*n)),
            CellValue::Error(e) => f.write_str(e.token()),
        }
    }
}

/// The variant content of a cell.
#[derive(Debug)]
pub enum CellContent {
    Empty,
    /// Non-empty by construction.
    Text(String),
    Formula {
        formula: Formula,
        /// Memoized outcome of the last evaluation; `None` when invalidated.
        /// Interior mutability: reading a value is logically const but fills
        /// the cache, and the engine is single-threaded.
        cache: RefCell<Option<Result<f64, FormulaError>>>,
    },
}

impl CellContent {
    /// Parse raw user input into a candidate body:
    /// - `""` → Empty
    /// - `=` plus at least one character → Formula (parse may fail)
    /// - anything else, including a lone `=` → Text
    pub fn from_input(text: &str) -> Result<CellContent, SpreadsheetError> {
        if text.is_empty() {
            return Ok(CellContent::Empty);
        }
        if text.len() > 1 && text.starts_with(FORMULA_SIGN) {
            let formula = Formula::parse(&text[1..]).map_err(SpreadsheetError::Formula)?;
            return Ok(CellContent::Formula {
                formula,
                cache: RefCell::new(None),
            });
        }
        Ok(CellContent::Text(text.to_string()))
    }

    /// Cells this body reads; empty for Empty/Text.
    pub fn referenced_cells(&self) -> Vec<Position> {
        match self {
            CellContent::Formula { formula, .. } => formula.referenced_cells(),
            _ => Vec::new(),
        }
    }

    /// Body kind for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            CellContent::Empty => "empty",
            CellContent::Text(_) => "text",
            CellContent::Formula { .. } => "formula",
        }
    }
}

impl Default for CellContent {
    fn default() -> Self {
        CellContent::Empty
    }
}

/// A cell in the grid. Identity (its position) and edges are the sheet's
/// business; the cell owns its body alone.
#[derive(Debug, Default)]
pub struct Cell {
    content: CellContent,
}

impl Cell {
    pub fn new(content: CellContent) -> Self {
        Self { content }
    }

    /// Displayed value. Formula cells return the cached outcome, evaluating
    /// once and storing the result (errors included) on a cache miss.
    pub fn value(&self, lookup: &dyn CellLookup) -> CellValue {
        match &self.content {
            CellContent::Empty => CellValue::Text(String::new()),
            CellContent::Text(s) => match s.strip_prefix(ESCAPE_SIGN) {
                Some(rest) => CellValue::Text(rest.to_string()),
                None => CellValue::Text(s.clone()),
            },
            CellContent::Formula { formula, cache } => {
                let cached = *cache.borrow();
                let outcome = match cached {
                    Some(outcome) => outcome,
                    None => {
                        let outcome = formula.evaluate(lookup);
                        *cache.borrow_mut() = Some(outcome);
                        outcome
                    }
                };
                match outcome {
                    Ok(n) => CellValue::Number(n),
                    Err(e) => CellValue::Error(e),
                }
            }
        }
    }

    /// Text form: what the user would edit. Formulas render canonically with
    /// the leading `=`; text cells keep any escape character.
    pub fn text(&self) -> String {
        match &self.content {
            CellContent::Empty => String::new(),
            CellContent::Text(s) => s.clone(),
            CellContent::Formula { formula, .. } => {
                format!("{}{}", FORMULA_SIGN, formula.expression())
            }
        }
    }

    /// Cells this body reads; empty for Empty/Text.
    pub fn referenced_cells(&self) -> Vec<Position> {
        self.content.referenced_cells()
    }

    /// Empty/Text are trivially cached; formulas report cache presence.
    pub fn has_cache(&self) -> bool {
        match &self.content {
            CellContent::Formula { cache, .. } => cache.borrow().is_some(),
            _ => true,
        }
    }

    /// Drop the memoized outcome. No-op for Empty/Text.
    pub fn invalidate_cache(&self) {
        if let CellContent::Formula { cache, .. } = &self.content {
            cache.borrow_mut().take();
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.content, CellContent::Empty)
    }

    /// Replace the body. The caller rewires edges and invalidates dependents.
    pub fn set_content(&mut self, content: CellContent) {
        self.content = content;
    }

    /// Body kind for logging.
    pub fn kind(&self) -> &'static str {
        self.content.kind()
    }
}
