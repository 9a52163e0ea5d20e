//! # Dynamic programming aggregation
//!
//! Four independent scanline passes over the reduced grid. Each pass smooths the cost volume with
//! the recurrence
//!
//! ```text
//! out[c][d] = cost[c][d] + min_d'( in[p][d'] + penalty(d, d') ) - min_d' in[p][d']
//! ```
//!
//! where `p` is the previous cell along the scan direction and the penalty is zero, `lambda_step`
//! or `lambda_jump` for a disparity change of zero, one or more steps. Every tableau therefore
//! holds the direct cost of its cell exactly once.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::time::Instant;
use tracing::debug;

use crate::cost::CostVolume;
use crate::grid::Grid3;
use crate::params::StereoLayout;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop
}

/// The four aggregated tableaus.
pub struct Tableaus {
    pub left: Grid3<u32>,
    pub right: Grid3<u32>,
    pub top: Grid3<u32>,
    pub bottom: Grid3<u32>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Direction {
    fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::RightToLeft)
    }

    fn is_reversed(self) -> bool {
        matches!(self, Direction::RightToLeft | Direction::BottomToTop)
    }
}

/// Run the four passes concurrently.
pub fn aggregate(layout: &StereoLayout, volume: &CostVolume) -> Tableaus {
    let start = Instant::now();

    let ((left, right), (top, bottom)) = rayon::join(
        || {
            rayon::join(
                || aggregate_pass(layout, volume, Direction::LeftToRight),
                || aggregate_pass(layout, volume, Direction::RightToLeft)
            )
        },
        || {
            rayon::join(
                || aggregate_pass(layout, volume, Direction::TopToBottom),
                || aggregate_pass(layout, volume, Direction::BottomToTop)
            )
        }
    );

    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "aggregated cost volume");

    Tableaus { left, right, top, bottom }
}

/// Aggregate the cost volume along one direction.
///
/// A scanline restarts (`out = cost`) at its first cell and after every invalid cell, invalid
/// cells hold zeros.
pub fn aggregate_pass(layout: &StereoLayout, volume: &CostVolume, dir: Direction) -> Grid3<u32> {
    let (rows, cols, depth) = (volume.cost.rows(), volume.cost.cols(), volume.cost.depth());
    let mut out = Grid3::new(rows, cols, depth, 0u32);

    let (lines, len) = if dir.is_horizontal() { (rows, cols) } else { (cols, rows) };

    let mut prev = vec![0u32; depth];
    let mut next = vec![0u32; depth];

    for line in 0..lines {
        let mut has_prev = false;

        for step in 0..len {
            let k = if dir.is_reversed() { len - 1 - step } else { step };
            let (row, col) = if dir.is_horizontal() { (line, k) } else { (k, line) };

            if !volume.valid[(row, col)] {
                has_prev = false;
                continue;
            }

            let cost = volume.cost.cell(row, col);
            if has_prev {
                dynamic_step(layout, &prev, cost, &mut next);
            } else {
                next.copy_from_slice(cost);
            }

            out.cell_mut(row, col).copy_from_slice(&next);
            std::mem::swap(&mut prev, &mut next);
            has_prev = true;
        }
    }

    out
}

/// One step of the recurrence from the previous cell tableau `in_cost` to `out_cost`.
pub fn dynamic_step(layout: &StereoLayout, in_cost: &[u32], cost: &[u32], out_cost: &mut [u32]) {
    let n = in_cost.len();
    let floor = in_cost.iter().copied().min().unwrap_or(0);
    let jump = floor.saturating_add(layout.lambda_jump);

    for d in 0..n {
        let mut best = in_cost[d].min(jump);
        if d > 0 {
            best = best.min(in_cost[d - 1].saturating_add(layout.lambda_step));
        }
        if d + 1 < n {
            best = best.min(in_cost[d + 1].saturating_add(layout.lambda_step));
        }
        out_cost[d] = cost[d] + (best - floor);
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::params::StereoParameters;

    fn layout(step: u32, jump: u32) -> StereoLayout {
        StereoParameters {
            disp_max: 4,
            block_size: 2,
            lambda_step: step,
            lambda_jump: jump,
            image_width: 14,
            image_height: 8,
            ..StereoParameters::default()
        }
        .init()
        .unwrap()
    }

    fn volume(rows: usize, cols: usize, cells: &[[u32; 4]]) -> CostVolume {
        let mut cost = Grid3::new(rows, cols, 4, 0u32);
        cost.as_mut_slice().copy_from_slice(&cells.concat());
        CostVolume {
            cost,
            valid: Grid::new(rows, cols, true)
        }
    }

    #[test]
    fn step_applies_penalties() {
        let layout = layout(3, 10);
        let mut out = [0u32; 4];

        dynamic_step(&layout, &[20, 5, 30, 40], &[1, 1, 1, 1], &mut out);

        // floor 5: d=0 via d=1 step, d=1 stays, d=2 via d=1 step, d=3 via jump
        assert_eq!(out, [1 + 3, 1, 1 + 3, 1 + 10]);
    }

    #[test]
    fn step_never_increases_past_jump() {
        let layout = layout(3, 10);
        let mut out = [0u32; 4];

        dynamic_step(&layout, &[1000, 1000, 1000, 0], &[0, 0, 0, 0], &mut out);

        assert_eq!(out, [10, 10, 3, 0]);
    }

    #[test]
    fn passes_follow_their_direction() {
        let layout = layout(3, 10);
        let volume = volume(1, 3, &[[0, 9, 9, 9], [9, 9, 9, 9], [9, 9, 9, 0]]);

        let left = aggregate_pass(&layout, &volume, Direction::LeftToRight);
        let right = aggregate_pass(&layout, &volume, Direction::RightToLeft);

        assert_eq!(left.cell(0, 0), &[0, 9, 9, 9]);
        assert_eq!(left.cell(0, 1), &[9, 12, 18, 18]);
        assert_eq!(right.cell(0, 2), &[9, 9, 9, 0]);
        assert_eq!(right.cell(0, 1), &[18, 18, 12, 9]);
    }

    #[test]
    fn vertical_passes_are_transposed_horizontal_passes() {
        let layout = layout(2, 7);
        let cells = [[3, 1, 4, 1], [5, 9, 2, 6], [5, 3, 5, 8], [9, 7, 9, 3]];
        let row = volume(1, 4, &cells);
        let column = volume(4, 1, &cells);

        let tableaus_row = aggregate(&layout, &row);
        let tableaus_col = aggregate(&layout, &column);

        for i in 0..4 {
            assert_eq!(tableaus_row.left.cell(0, i), tableaus_col.top.cell(i, 0));
            assert_eq!(tableaus_row.right.cell(0, i), tableaus_col.bottom.cell(i, 0));
        }
    }

    #[test]
    fn invalid_cells_break_the_path() {
        let layout = layout(3, 10);
        let mut volume = volume(1, 3, &[[0, 9, 9, 9], [1, 1, 1, 1], [9, 9, 9, 0]]);
        volume.valid[(0, 1)] = false;

        let left = aggregate_pass(&layout, &volume, Direction::LeftToRight);

        assert_eq!(left.cell(0, 1), &[0, 0, 0, 0]);
        assert_eq!(left.cell(0, 2), &[9, 9, 9, 0]);
    }
}
