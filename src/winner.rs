//! # Winner extraction and upsampling
//!
//! The direct cost is held once by each of the four tableaus, so the score of a hypothesis is
//! `left + right + top + bottom - 3 * cost`, which counts it exactly once.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use rayon::prelude::*;

use crate::aggregation::Tableaus;
use crate::cost::{CostVolume, COST_OUT_OF_IMAGE};
use crate::disparity::{DisparityMap, DISPARITY_INVALID};
use crate::geometry::EpipolarGeometry;
use crate::grid::Grid;
use crate::params::StereoLayout;

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

/// Pick the hypothesis with the lowest combined score in every cell, the smallest index on ties.
///
/// A winner whose block lies outside the second image is reported as invalid.
pub fn reconstruct_disparity(volume: &CostVolume, tableaus: &Tableaus) -> Grid<u8> {
    let (rows, cols) = (volume.cost.rows(), volume.cost.cols());

    let disparities = (0..rows * cols)
        .into_par_iter()
        .map(|i| {
            let (row, col) = (i / cols, i % cols);
            if !volume.valid[(row, col)] {
                return DISPARITY_INVALID;
            }

            let cost = volume.cost.cell(row, col);
            let left = tableaus.left.cell(row, col);
            let right = tableaus.right.cell(row, col);
            let top = tableaus.top.cell(row, col);
            let bottom = tableaus.bottom.cell(row, col);

            let mut best = (u32::MAX, DISPARITY_INVALID);
            for d in 0..cost.len() {
                let score = left[d] + right[d] + top[d] + bottom[d] - 3 * cost[d];
                if score < best.0 {
                    best = (score, d as u8);
                }
            }

            // smoothing can pull a cell onto a hypothesis outside image 2
            match cost.get(best.1 as usize) {
                Some(&c) if c != COST_OUT_OF_IMAGE => best.1,
                _ => DISPARITY_INVALID
            }
        })
        .collect();

    Grid::from_vec(rows, cols, disparities)
}

/// Spread the cell disparities over their footprint in a full resolution map.
///
/// Pixels outside the covered ROI or without a valid ray stay invalid.
pub fn upsample_disparity(
    layout: &StereoLayout,
    geometry: &EpipolarGeometry,
    small: &Grid<u8>
) -> DisparityMap {
    let mut disparity = DisparityMap::new(layout.image_width, layout.image_height);

    for vs in 0..layout.small_height {
        for us in 0..layout.small_width {
            let d = small[(vs, us)];
            if d == DISPARITY_INVALID {
                continue;
            }

            for v in layout.v_footprint(vs) {
                for u in layout.u_footprint(us) {
                    if geometry.ray(layout.linear_idx(v, u)).is_some() {
                        disparity.put(u, v, d);
                    }
                }
            }
        }
    }

    disparity.update_range();
    disparity
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
