//! The grid container.
//!
//! `Sheet` owns every cell and the dependency graph between them, and
//! orchestrates the mutation path: parse the candidate body, vet it against
//! the graph, rewire edges, invalidate downstream caches. Values are then
//! recomputed lazily on read.

use std::io::{self, Write};

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell::{Cell, CellContent, CellValue};
use crate::dep_graph::DepGraph;
use crate::error::SpreadsheetError;
use crate::formula::CellLookup;
use crate::position::{Position, Size};

/// A spreadsheet: a sparse map of cells plus their reference edges.
#[derive(Default, Debug)]
pub struct Sheet {
    cells: FxHashMap<Position, Cell>,
    graph: DepGraph,
}

/// Read-only view of one cell, bound to its sheet for lazy evaluation.
pub struct CellView<'a> {
    sheet: &'a Sheet,
    cell: &'a Cell,
}

impl CellView<'_> {
    /// Displayed value; formula cells evaluate (and memoize) on demand.
    pub fn value(&self) -> CellValue {
        self.cell.value(self.sheet)
    }

    /// The editable text form.
    pub fn text(&self) -> String {
        self.cell.text()
    }

    pub fn referenced_cells(&self) -> Vec<Position> {
        self.cell.referenced_cells()
    }
}

impl CellLookup for Sheet {
    fn cell_value(&self, pos: Position) -> Option<CellValue> {
        self.cells.get(&pos).map(|cell| cell.value(self))
    }
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cell at `pos` from raw input text.
    ///
    /// All-or-nothing: a parse failure or cycle rejection leaves the sheet,
    /// the target cell, and every edge exactly as they were.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SpreadsheetError> {
        check_position(pos)?;

        let content = match CellContent::from_input(text) {
            Ok(content) => content,
            Err(err) => {
                debug!("set {} rejected: {}", pos, err);
                return Err(err);
            }
        };

        let new_refs = content.referenced_cells();
        if self.graph.would_create_cycle(pos, &new_refs) {
            debug!("set {} rejected: would close a reference cycle", pos);
            return Err(SpreadsheetError::CircularDependency);
        }

        // Checks passed; from here on the operation completes. Referenced
        // cells that do not exist yet become Empty placeholders so edges
        // always point at real cells.
        for &referee in &new_refs {
            self.cells.entry(referee).or_default();
        }

        trace!("set {} to {} body", pos, content.kind());
        self.cells.entry(pos).or_default().set_content(content);
        self.graph
            .replace_edges(pos, new_refs.into_iter().collect::<FxHashSet<_>>());
        self.invalidate_from(pos);

        Ok(())
    }

    /// Look up the cell at `pos`. Absent cells are *not* created.
    pub fn get_cell(&self, pos: Position) -> Result<Option<CellView<'_>>, SpreadsheetError> {
        check_position(pos)?;
        Ok(self
            .cells
            .get(&pos)
            .map(|cell| CellView { sheet: self, cell }))
    }

    /// Clear the cell at `pos` back to Empty.
    ///
    /// The body reset goes through the regular set path so dependents are
    /// invalidated; afterwards an unreferenced cell is removed outright,
    /// while a referenced one stays as a placeholder.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), SpreadsheetError> {
        check_position(pos)?;
        if !self.cells.contains_key(&pos) {
            return Ok(());
        }

        trace!("clear {}", pos);
        self.set_cell(pos, "")?;
        if !self.graph.is_referenced(pos) {
            self.cells.remove(&pos);
        }
        Ok(())
    }

    /// Dimensions of the smallest rectangle anchored at (0,0) that encloses
    /// every cell with a non-Empty body. Placeholders do not count.
    pub fn printable_size(&self) -> Size {
        let mut size = Size::EMPTY;
        for (pos, cell) in &self.cells {
            if cell.is_empty() {
                continue;
            }
            size.rows = size.rows.max(pos.row + 1);
            size.cols = size.cols.max(pos.col + 1);
        }
        size
    }

    /// Print displayed values over the printable region, tab-separated.
    pub fn print_values(&self, out: &mut impl Write) -> io::Result<()> {
        self.print(out, |cell| cell.value(self).to_string())
    }

    /// Print text forms over the printable region, tab-separated.
    pub fn print_texts(&self, out: &mut impl Write) -> io::Result<()> {
        self.print(out, |cell| cell.text())
    }

    fn print(&self, out: &mut impl Write, render: impl Fn(&Cell) -> String) -> io::Result<()> {
        let size = self.printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                if let Some(cell) = self.cells.get(&Position::new(row, col)) {
                    out.write_all(render(cell).as_bytes())?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Force-invalidate the cell at `start`, then propagate along dependent
    /// edges. A formula whose cache is already gone stops the walk there:
    /// everything past it was invalidated when that cache was dropped, which
    /// collapses re-walks of diamond shapes. Termination follows from the
    /// graph being a DAG.
    fn invalidate_from(&self, start: Position) {
        let mut touched = 0usize;
        let mut first = true;
        let mut stack = vec![start];

        while let Some(pos) = stack.pop() {
            if let Some(cell) = self.cells.get(&pos) {
                if first || cell.has_cache() {
                    cell.invalidate_cache();
                    touched += 1;
                    stack.extend(self.graph.dependents(pos));
                }
            }
            first = false;
        }

        debug!("invalidated {} cell(s) downstream of {}", touched, start);
    }
}

fn check_position(pos: Position) -> Result<(), SpreadsheetError> {
    if pos.is_valid() {
        Ok(())
    } else {
        Err(SpreadsheetError::InvalidPosition(pos))
    }
}
