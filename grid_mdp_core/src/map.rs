use std::ops::{Index, IndexMut};

use crate::Cell;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Cell ({row}, {col}) is out of bounds for grid size ({rows}, {cols})")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("Grid size ({rows}, {cols}) overflows the addressable cell count")]
    TooLarge { rows: usize, cols: usize },
}

/// A dense 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Elements are addressed by [`Cell`] coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled with `value`.
    ///
    /// Returns `Err(GridError::TooLarge)` if `rows * cols` overflows `usize`.
    pub fn filled(rows: usize, cols: usize, value: T) -> Result<Self, GridError>
    where
        T: Clone,
    {
        let size = rows
            .checked_mul(cols)
            .ok_or(GridError::TooLarge { rows, cols })?;
        Ok(Grid {
            rows,
            cols,
            cells: vec![value; size],
        })
    }

    /// Builds a grid of the same shape by applying `f` to every element.
    pub fn map<U, F>(&self, f: F) -> Grid<U>
    where
        F: FnMut(&T) -> U,
    {
        Grid {
            rows: self.rows,
            cols: self.cols,
            cells: self.cells.iter().map(f).collect(),
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Converts a cell to a flat vector index.
    ///
    /// Returns `None` if the cell is out of bounds.
    #[inline]
    pub fn cell_to_index(&self, cell: Cell) -> Option<usize> {
        if self.contains(cell) {
            Some(cell.row * self.cols + cell.col)
        } else {
            None
        }
    }

    /// Checks if the given cell is within the grid boundaries.
    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    /// Gets an immutable reference to the element at `cell`.
    ///
    /// Returns `None` if the cell is out of bounds.
    pub fn get(&self, cell: Cell) -> Option<&T> {
        self.cell_to_index(cell).and_then(|index| self.cells.get(index))
    }

    /// Sets the element at `cell`.
    ///
    /// Returns `Err(GridError::OutOfBounds)` if the cell is invalid.
    pub fn set(&mut self, cell: Cell, value: T) -> Result<(), GridError> {
        let index = self.cell_to_index(cell).ok_or(GridError::OutOfBounds {
            row: cell.row,
            col: cell.col,
            rows: self.rows,
            cols: self.cols,
        })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns an iterator that yields `(Cell, &T)` in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Cell, &T)> {
        let cols = self.cols;
        self.cells.iter().enumerate().map(move |(index, value)| {
            (
                Cell {
                    row: index / cols,
                    col: index % cols,
                },
                value,
            )
        })
    }
}

impl<T> Index<Cell> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, cell: Cell) -> &Self::Output {
        match self.cell_to_index(cell) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                cell.row, cell.col, self.rows, self.cols
            ),
        }
    }
}

impl<T> IndexMut<Cell> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, cell: Cell) -> &mut Self::Output {
        let (rows, cols) = (self.rows, self.cols);
        match self.cell_to_index(cell) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                cell.row, cell.col, rows, cols
            ),
        }
    }
}
