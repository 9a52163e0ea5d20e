//! # Cost volume
//!
//! Photometric matching cost of every reduced grid cell against each disparity hypothesis along
//! its epipolar curve.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::GrayImage;
use rayon::prelude::*;
use std::time::Instant;
use tracing::debug;

use crate::curve::EpipolarCurve;
use crate::geometry::EpipolarGeometry;
use crate::grid::{Grid, Grid3};
use crate::params::StereoLayout;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Cost of a hypothesis whose block leaves the second image or lies past the end of the curve.
pub const COST_OUT_OF_IMAGE: u32 = 255;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct CostVolume {
    /// Mean absolute difference, indexed by (small row, small col, disparity).
    pub cost: Grid3<u32>,

    /// Cells with an epipolar curve and at least one hypothesis inside both images. Invalid cells
    /// have a zero cost row.
    pub valid: Grid<bool>
}

/// Borrowed single channel image with raw row-major access.
#[derive(Clone, Copy)]
struct Plane<'a> {
    data: &'a [u8],
    width: usize,
    height: usize
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl<'a> Plane<'a> {
    fn new(img: &'a GrayImage) -> Self {
        Self {
            data: img.as_raw(),
            width: img.width() as usize,
            height: img.height() as usize
        }
    }

    /// Top left corner of the block centered at `(x, y)`, if the whole block is inside.
    fn block_origin(&self, x: i32, y: i32, layout: &StereoLayout) -> Option<(usize, usize)> {
        let x0 = x - layout.half_block_size as i32;
        let y0 = y - layout.half_block_size as i32;
        let size = layout.block_size as i32;

        if x0 < 0 || y0 < 0 || x0 + size > self.width as i32 || y0 + size > self.height as i32 {
            None
        } else {
            Some((x0 as usize, y0 as usize))
        }
    }

    fn row(&self, x0: usize, y: usize, len: usize) -> &'a [u8] {
        let start = y * self.width + x0;
        &self.data[start..start + len]
    }
}

/// Fill the cost volume for the pair `img1`, `img2` using the curves of `geometry`.
///
/// Images must already have the size of the layout.
pub fn compute_cost(
    layout: &StereoLayout,
    geometry: &EpipolarGeometry,
    img1: &GrayImage,
    img2: &GrayImage
) -> CostVolume {
    let start = Instant::now();

    let mut cost = Grid3::new(layout.small_height, layout.small_width, layout.disp_max, 0u32);
    let mut valid = Grid::new(layout.small_height, layout.small_width, false);
    let stride = cost.row_stride();
    let plane1 = Plane::new(img1);
    let plane2 = Plane::new(img2);

    cost.as_mut_slice()
        .par_chunks_mut(stride)
        .zip(valid.as_mut_slice().par_chunks_mut(layout.small_width))
        .enumerate()
        .for_each(|(vs, (row, valid_row))| {
            let cells = row.chunks_mut(layout.disp_max).zip(valid_row.iter_mut());
            for (us, (cell, valid)) in cells.enumerate() {
                let curve = match geometry.curve(us, vs) {
                    Some(curve) => curve,
                    None => continue
                };

                *valid = fill_cell(layout, curve, &plane1, &plane2, (us, vs), cell);
                if !*valid {
                    cell.iter_mut().for_each(|c| *c = 0);
                }
            }
        });

    debug!(
        cells = layout.small_width * layout.small_height,
        hypotheses = layout.disp_max,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "computed cost volume"
    );

    CostVolume { cost, valid }
}

/// Cost of every hypothesis of the cell `(us, vs)` along `curve`.
///
/// Returns `false` if no hypothesis has a complete block in both images, the cell is then
/// unmatched.
fn fill_cell(
    layout: &StereoLayout,
    curve: &EpipolarCurve,
    plane1: &Plane,
    plane2: &Plane,
    (us, vs): (usize, usize),
    cell: &mut [u32]
) -> bool {
    let (x1, y1) = (layout.u_big(us) as i32, layout.v_big(vs) as i32);
    let origin1 = match plane1.block_origin(x1, y1, layout) {
        Some(origin) => origin,
        None => return false
    };

    let mut matched = false;
    let mut samples = curve.rasterize();
    for c in cell.iter_mut() {
        *c = match samples.next().and_then(|(x2, y2)| plane2.block_origin(x2, y2, layout)) {
            Some(origin2) => {
                matched = true;
                block_cost(plane1, origin1, plane2, origin2, layout.block_size)
            }
            None => COST_OUT_OF_IMAGE
        };
    }

    matched
}

/// Mean absolute difference between two square blocks.
fn block_cost(
    plane1: &Plane,
    (x1, y1): (usize, usize),
    plane2: &Plane,
    (x2, y2): (usize, usize),
    size: usize
) -> u32 {
    let mut acc = 0u32;

    for j in 0..size {
        let row1 = plane1.row(x1, y1 + j, size);
        let row2 = plane2.row(x2, y2 + j, size);
        acc += row1
            .iter()
            .zip(row2)
            .map(|(&a, &b)| (a as i32 - b as i32).abs() as u32)
            .sum::<u32>();
    }

    acc / (size * size) as u32
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
