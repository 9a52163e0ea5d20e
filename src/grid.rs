//! # Flat storage grids
//!
//! Dense row-major buffers for the reduced grid: a 2D [`Grid`] and a 3D [`Grid3`] holding one
//! contiguous vector of hypotheses per cell (cost volume, DP tableaus).

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::ops::{Index, IndexMut};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Row-major 2D grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>
}

/// Row-major 3D grid, the last axis is contiguous.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid3<T> {
    rows: usize,
    cols: usize,
    depth: usize,
    data: Vec<T>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl<T: Clone> Grid<T> {
    pub fn new(rows: usize, cols: usize, val: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![val; rows * cols]
        }
    }
}

impl<T> Grid<T> {
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Self {
        assert_eq!(data.len(), rows * cols, "grid data does not match {}x{}", rows, cols);
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    fn offset(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of grid {}x{}",
            row, col, self.rows, self.cols
        );
        row * self.cols + col
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        &self.data[self.offset(row, col)]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        let offset = self.offset(row, col);
        &mut self.data[offset]
    }
}

impl<T: Clone> Grid3<T> {
    pub fn new(rows: usize, cols: usize, depth: usize, val: T) -> Self {
        Self {
            rows,
            cols,
            depth,
            data: vec![val; rows * cols * depth]
        }
    }
}

impl<T> Grid3<T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Stride between two consecutive rows.
    pub fn row_stride(&self) -> usize {
        self.cols * self.depth
    }

    /// All hypotheses of the cell `[row, col]`.
    pub fn cell(&self, row: usize, col: usize) -> &[T] {
        let start = self.offset(row, col);
        &self.data[start..start + self.depth]
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> &mut [T] {
        let start = self.offset(row, col);
        let depth = self.depth;
        &mut self.data[start..start + depth]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    fn offset(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of grid {}x{}",
            row, col, self.rows, self.cols
        );
        (row * self.cols + col) * self.depth
    }
}

impl<T> Index<(usize, usize, usize)> for Grid3<T> {
    type Output = T;

    fn index(&self, (row, col, d): (usize, usize, usize)) -> &T {
        assert!(d < self.depth, "hypothesis {} out of depth {}", d, self.depth);
        &self.data[self.offset(row, col) + d]
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid3_cells_are_contiguous() {
        let mut grid = Grid3::new(2, 3, 4, 0u32);
        grid.cell_mut(1, 2).copy_from_slice(&[1, 2, 3, 4]);

        assert_eq!(grid[(1, 2, 3)], 4);
        assert_eq!(grid.as_slice()[grid.row_stride() + 2 * 4], 1);
        assert_eq!(grid.cell(0, 0), &[0, 0, 0, 0]);
    }

    #[test]
    fn grid_bounds() {
        let mut grid = Grid::new(2, 2, 0u8);
        grid[(1, 0)] = 7;

        assert_eq!(grid.get(1, 0), Some(&7));
        assert_eq!(grid.get(2, 0), None);
        assert_eq!(grid.get(0, 2), None);
    }

    #[test]
    #[should_panic]
    fn grid3_out_of_bounds_panics() {
        let grid = Grid3::new(2, 2, 2, 0u8);
        let _ = grid.cell(0, 2);
    }
}
