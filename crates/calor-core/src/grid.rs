//! Per-block storage: a pair of `(rows + 2) × width` buffers.
//!
//! Row 0 and row `rows + 1` of each buffer are ghost rows. They hold the
//! boundary constant when the block touches a domain edge, otherwise the
//! neighbouring block's most recent true row. The stencil reads only from
//! [`LocalSubgrid::previous`] and writes only into [`LocalSubgrid::current`];
//! [`LocalSubgrid::swap`] exchanges the two roles between iterations.

use std::ops::Range;

use ndarray::{s, Array2, ArrayView2};
use thiserror::Error;

use crate::stencil;

/// Errors from the local grid store.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("Failed to allocate {bytes} bytes for a {rows}x{width} buffer")]
    Allocation { bytes: usize, rows: usize, width: usize },

    #[error("Subgrid must have at least one true row and three columns (got {rows}x{width})")]
    Degenerate { rows: usize, width: usize },

    #[error("Ghost row has {got} values, expected {expected}")]
    RowLength { expected: usize, got: usize },
}

/// Which edge of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    North,
    South,
}

/// The buffer pair owned by one block.
#[derive(Debug)]
pub struct LocalSubgrid {
    rows: usize,
    width: usize,
    previous: Array2<f64>,
    current: Array2<f64>,
}

impl LocalSubgrid {
    /// Allocate a buffer pair for `rows` true rows of `width` columns.
    ///
    /// Allocation is fallible so that running out of memory can be reported
    /// and turned into a collective abort instead of a process abort.
    pub fn new(rows: usize, width: usize) -> Result<Self, GridError> {
        if rows == 0 || width < 3 {
            return Err(GridError::Degenerate { rows, width });
        }
        Ok(Self {
            rows,
            width,
            previous: try_filled(rows + 2, width, 0.0)?,
            current: try_filled(rows + 2, width, 0.0)?,
        })
    }

    /// Fill both buffers with the initial state.
    ///
    /// True rows get `initial` inside and `boundary` in the first and last
    /// column. A ghost row is set to `boundary` only when the block touches
    /// that edge of the plate; otherwise it is left for halo exchange.
    pub fn initialize(&mut self, boundary: f64, initial: f64, top_is_edge: bool, bottom_is_edge: bool) {
        let last = self.rows + 1;
        let width = self.width;
        for buffer in [&mut self.previous, &mut self.current] {
            for mut row in buffer.slice_mut(s![1..last, ..]).rows_mut() {
                row.fill(initial);
                row[0] = boundary;
                row[width - 1] = boundary;
            }
            if top_is_edge {
                buffer.row_mut(0).fill(boundary);
            }
            if bottom_is_edge {
                buffer.row_mut(last).fill(boundary);
            }
        }
    }

    /// Number of true rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// State of the previous iteration, including ghost rows.
    pub fn previous(&self) -> &Array2<f64> {
        &self.previous
    }

    /// State being computed this iteration, including ghost rows.
    pub fn current(&self) -> &Array2<f64> {
        &self.current
    }

    /// Exchange the roles of the two buffers without copying.
    ///
    /// Ghost rows of the new "current" buffer are stale afterwards; only the
    /// ghost rows of "previous" are ever read.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.previous, &mut self.current);
    }

    /// Local index of the true row adjacent to `side`.
    pub fn edge_row(&self, side: Side) -> usize {
        match side {
            Side::North => 1,
            Side::South => self.rows,
        }
    }

    /// Local index of the ghost row on `side`.
    pub fn ghost_row(&self, side: Side) -> usize {
        match side {
            Side::North => 0,
            Side::South => self.rows + 1,
        }
    }

    /// Copy of the block's own true row next to `side`, from "previous".
    pub fn send_row(&self, side: Side) -> Vec<f64> {
        self.previous.row(self.edge_row(side)).to_vec()
    }

    /// Store a neighbour's row in the ghost row on `side` of "previous".
    pub fn set_ghost(&mut self, side: Side, values: &[f64]) -> Result<(), GridError> {
        if values.len() != self.width {
            return Err(GridError::RowLength {
                expected: self.width,
                got: values.len(),
            });
        }
        let ghost = self.ghost_row(side);
        for (dst, &src) in self.previous.row_mut(ghost).iter_mut().zip(values) {
            *dst = src;
        }
        Ok(())
    }

    /// Update true rows `rows` (local indices, `1..=self.rows()`).
    pub fn update_rows(&mut self, rows: Range<usize>, alpha: f64) {
        debug_assert!(rows.start >= 1 && rows.end <= self.rows + 1);
        stencil::update_rows(&self.previous, &mut self.current, rows, alpha);
    }

    /// The current buffer's true rows, without ghosts.
    pub fn true_rows(&self) -> ArrayView2<'_, f64> {
        self.current.slice(s![1..self.rows + 1, ..])
    }
}

/// A `rows`×`width` array filled with `value`, or an error instead of an
/// abort when the memory is not available.
pub fn try_filled(rows: usize, width: usize, value: f64) -> Result<Array2<f64>, GridError> {
    let len = rows.saturating_mul(width);
    let bytes = len.saturating_mul(std::mem::size_of::<f64>());
    let alloc_err = || GridError::Allocation { bytes, rows, width };

    let mut data: Vec<f64> = Vec::new();
    data.try_reserve_exact(len).map_err(|_| alloc_err())?;
    data.resize(len, value);
    Array2::from_shape_vec((rows, width), data).map_err(|_| alloc_err())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_middle_block() {
        let mut grid = LocalSubgrid::new(2, 5).unwrap();
        grid.initialize(10.0, 1.0, false, false);
        for buffer in [grid.previous(), grid.current()] {
            assert_eq!(buffer.dim(), (4, 5));
            for i in 1..3 {
                assert_eq!(buffer[[i, 0]], 10.0);
                assert_eq!(buffer[[i, 4]], 10.0);
                for j in 1..4 {
                    assert_eq!(buffer[[i, j]], 1.0);
                }
            }
            // Ghost rows untouched until the first halo exchange.
            assert!(buffer.row(0).iter().all(|&v| v == 0.0));
            assert!(buffer.row(3).iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_initialize_edge_blocks() {
        let mut grid = LocalSubgrid::new(1, 4).unwrap();
        grid.initialize(10.0, 0.0, true, true);
        assert!(grid.previous().row(0).iter().all(|&v| v == 10.0));
        assert!(grid.previous().row(2).iter().all(|&v| v == 10.0));
        assert!(grid.current().row(0).iter().all(|&v| v == 10.0));
        assert_eq!(grid.previous().row(1).to_vec(), vec![10.0, 0.0, 0.0, 10.0]);
    }

    #[test]
    fn test_swap_moves_buffers() {
        let mut grid = LocalSubgrid::new(1, 3).unwrap();
        grid.initialize(4.0, 0.0, true, true);
        grid.update_rows(1..2, 0.25);
        assert_eq!(grid.current()[[1, 1]], 4.0);
        assert_eq!(grid.previous()[[1, 1]], 0.0);

        let before = grid.current().as_ptr();
        grid.swap();
        assert_eq!(grid.previous().as_ptr(), before);
        assert_eq!(grid.previous()[[1, 1]], 4.0);
    }

    #[test]
    fn test_ghost_rows_and_edge_rows() {
        let mut grid = LocalSubgrid::new(3, 3).unwrap();
        grid.initialize(10.0, 2.0, false, false);
        assert_eq!(grid.send_row(Side::North), vec![10.0, 2.0, 10.0]);
        assert_eq!(grid.edge_row(Side::South), 3);
        assert_eq!(grid.ghost_row(Side::South), 4);

        grid.set_ghost(Side::South, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(grid.previous().row(4).to_vec(), vec![1.0, 2.0, 3.0]);

        let err = grid.set_ghost(Side::North, &[1.0]).unwrap_err();
        assert!(matches!(err, GridError::RowLength { expected: 3, got: 1 }));
    }

    #[test]
    fn test_true_rows_skip_ghosts() {
        let mut grid = LocalSubgrid::new(2, 3).unwrap();
        grid.initialize(10.0, 5.0, true, true);
        let rows = grid.true_rows();
        assert_eq!(rows.dim(), (2, 3));
        assert_eq!(rows[[0, 1]], 5.0);
    }

    #[test]
    fn test_degenerate_sizes_rejected() {
        assert!(matches!(
            LocalSubgrid::new(0, 10),
            Err(GridError::Degenerate { .. })
        ));
        assert!(matches!(
            LocalSubgrid::new(4, 2),
            Err(GridError::Degenerate { .. })
        ));
    }

    #[test]
    fn test_huge_allocation_fails_cleanly() {
        let err = LocalSubgrid::new(usize::MAX / 64, 16).unwrap_err();
        assert!(matches!(err, GridError::Allocation { .. }));
    }
}
