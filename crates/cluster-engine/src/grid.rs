//! Grid Model — the rows × columns symbol matrix
//!
//! Storage is column-major (`columns[column][row]`), row 0 at the top,
//! which is the shape gravity works in: removing cells compacts a column
//! toward its end and the vacated slots open at index 0.

use cluster_stage::Cell;
use serde::{Deserialize, Serialize};

use crate::bonus::GamePhase;
use crate::config::GridSpec;
use crate::symbols::{SymbolId, SymbolKind, SymbolSet};

/// Symbol matrix. Dimensions never change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    rows: usize,
    columns: Vec<Vec<SymbolId>>,
}

/// Malformed grid data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Grid is empty")]
    Empty,

    #[error("Grid is {rows}x{columns}, expected {expected_rows}x{expected_columns}")]
    DimensionMismatch {
        rows: usize,
        columns: usize,
        expected_rows: usize,
        expected_columns: usize,
    },

    #[error("Column {column} has {len} cells, expected {rows}")]
    RaggedColumn { column: usize, len: usize, rows: usize },

    #[error("Row {row} has {len} cells, expected {columns}")]
    RaggedRow { row: usize, len: usize, columns: usize },

    #[error("Unknown symbol {symbol} at row {}, column {}", .cell.row, .cell.column)]
    UnknownSymbol { symbol: SymbolId, cell: Cell },

    #[error("Multiplier symbol {symbol} at row {}, column {} outside the bonus round", .cell.row, .cell.column)]
    MultiplierOutsideBonus { symbol: SymbolId, cell: Cell },
}

impl Grid {
    /// Grid of `spec` dimensions with every cell set to `fill`
    pub fn filled(spec: GridSpec, fill: SymbolId) -> Self {
        Self {
            rows: spec.rows,
            columns: vec![vec![fill; spec.rows]; spec.columns],
        }
    }

    /// Build from column-major data. Columns must all have the same length.
    pub fn from_columns(columns: Vec<Vec<SymbolId>>) -> Result<Self, GridError> {
        let rows = columns.first().map(Vec::len).unwrap_or(0);
        if rows == 0 {
            return Err(GridError::Empty);
        }
        if let Some((column, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != rows) {
            return Err(GridError::RaggedColumn {
                column,
                len: col.len(),
                rows,
            });
        }
        Ok(Self { rows, columns })
    }

    /// Build from row-major data (how grids are usually written by hand)
    pub fn from_rows(rows: &[Vec<SymbolId>]) -> Result<Self, GridError> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if width == 0 {
            return Err(GridError::Empty);
        }
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(GridError::RaggedRow {
                row,
                len: r.len(),
                columns: width,
            });
        }
        let columns = (0..width)
            .map(|c| rows.iter().map(|r| r[c]).collect())
            .collect();
        Ok(Self {
            rows: rows.len(),
            columns,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns.len()
    }

    pub fn spec(&self) -> GridSpec {
        GridSpec {
            rows: self.rows,
            columns: self.columns.len(),
        }
    }

    pub fn get(&self, cell: Cell) -> Option<SymbolId> {
        self.columns.get(cell.column)?.get(cell.row).copied()
    }

    /// Overwrite one cell; out-of-range cells are ignored and reported as `false`
    pub fn set(&mut self, cell: Cell, symbol: SymbolId) -> bool {
        match self.columns.get_mut(cell.column).and_then(|c| c.get_mut(cell.row)) {
            Some(slot) => {
                *slot = symbol;
                true
            }
            None => false,
        }
    }

    pub fn column(&self, column: usize) -> Option<&[SymbolId]> {
        self.columns.get(column).map(Vec::as_slice)
    }

    pub(crate) fn column_mut(&mut self, column: usize) -> Option<&mut Vec<SymbolId>> {
        self.columns.get_mut(column)
    }

    /// All coordinates in row-major order
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let columns = self.columns.len();
        (0..self.rows).flat_map(move |row| (0..columns).map(move |column| Cell::new(row, column)))
    }

    /// Occurrences of a symbol anywhere on the grid
    pub fn count(&self, symbol: SymbolId) -> usize {
        self.columns.iter().flatten().filter(|&&s| s == symbol).count()
    }

    /// Row-major coordinates of every occurrence of a symbol
    pub fn positions_of(&self, symbol: SymbolId) -> Vec<Cell> {
        self.cells().filter(|&c| self.get(c) == Some(symbol)).collect()
    }

    /// Iterate over every symbol id
    pub fn symbols(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.columns.iter().flatten().copied()
    }

    /// Column-major copy, as carried by stage events
    pub fn to_columns(&self) -> Vec<Vec<SymbolId>> {
        self.columns.clone()
    }

    /// Check dimensions and alphabet. Multiplier ids are only legal in
    /// the bonus round.
    pub fn validate(&self, spec: GridSpec, symbols: &SymbolSet, phase: GamePhase) -> Result<(), GridError> {
        if self.rows != spec.rows || self.columns.len() != spec.columns {
            return Err(GridError::DimensionMismatch {
                rows: self.rows,
                columns: self.columns.len(),
                expected_rows: spec.rows,
                expected_columns: spec.columns,
            });
        }
        for (column, col) in self.columns.iter().enumerate() {
            if col.len() != self.rows {
                return Err(GridError::RaggedColumn {
                    column,
                    len: col.len(),
                    rows: self.rows,
                });
            }
            for (row, &symbol) in col.iter().enumerate() {
                let cell = Cell::new(row, column);
                match symbols.kind(symbol) {
                    None => return Err(GridError::UnknownSymbol { symbol, cell }),
                    Some(SymbolKind::Multiplier) if phase != GamePhase::Bonus => {
                        return Err(GridError::MultiplierOutsideBonus { symbol, cell });
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    /// Apply gravity after removing `removed`.
    ///
    /// Each column keeps its surviving symbols in their relative order,
    /// packed toward the bottom. Returns the number of vacated top slots
    /// per column; those slots still hold stale ids until refilled.
    pub fn collapse(&mut self, removed: &[Cell]) -> Vec<usize> {
        let rows = self.rows;
        let mut vacancies = vec![0; self.columns.len()];
        for (c, column) in self.columns.iter_mut().enumerate() {
            let survivors: Vec<SymbolId> = column
                .iter()
                .enumerate()
                .filter(|(row, _)| !removed.contains(&Cell::new(*row, c)))
                .map(|(_, &s)| s)
                .collect();
            let gap = rows - survivors.len();
            column[gap..].copy_from_slice(&survivors);
            vacancies[c] = gap;
        }
        vacancies
    }

    /// Write fresh symbols into the top `fresh.len()` slots of a column.
    /// Returns the cells written.
    pub fn fill_top(&mut self, column: usize, fresh: &[SymbolId]) -> Vec<Cell> {
        let Some(col) = self.columns.get_mut(column) else {
            return Vec::new();
        };
        let n = fresh.len().min(col.len());
        col[..n].copy_from_slice(&fresh[..n]);
        (0..n).map(|row| Cell::new(row, column)).collect()
    }
}
