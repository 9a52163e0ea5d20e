//! # Stereo parameters
//!
//! Base configuration of the generalized stereo engine and the derived layout of the reduced
//! matching grid. The layout is only obtainable through [`StereoParameters::init`], so derived
//! values can never drift away from the configuration they were computed from.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::disparity::DISPARITY_INVALID;
use crate::error::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StereoParameters {
    /// Number of disparity hypotheses sampled along each epipolar curve.
    pub disp_max: usize,

    /// Matching window size, also the downsampling factor of the reduced grid.
    pub block_size: usize,

    /// Left upper corner of the region of interest.
    pub u_margin: usize,
    pub v_margin: usize,

    /// Size of the region of interest, `None` extends it to the image border.
    pub roi_width: Option<usize>,
    pub roi_height: Option<usize>,

    /// Smoothness penalty for a disparity change of one step.
    pub lambda_step: u32,

    /// Smoothness penalty for a disparity change of more than one step.
    pub lambda_jump: u32,

    pub image_width: usize,
    pub image_height: usize
}

/// Values derived from [`StereoParameters`] by [`StereoParameters::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoLayout {
    pub disp_max: usize,
    pub block_size: usize,
    pub half_block_size: usize,
    pub lambda_step: u32,
    pub lambda_jump: u32,
    pub image_width: usize,
    pub image_height: usize,

    /// First full resolution column/row of the region of interest.
    pub u0: usize,
    pub v0: usize,

    /// Exclusive end of the region of interest.
    pub u_max: usize,
    pub v_max: usize,

    pub small_width: usize,
    pub small_height: usize
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for StereoParameters {
    fn default() -> Self {
        Self {
            disp_max: 48,
            block_size: 3,
            u_margin: 0,
            v_margin: 0,
            roi_width: None,
            roi_height: None,
            lambda_step: 5,
            lambda_jump: 32,
            image_width: 0,
            image_height: 0
        }
    }
}

impl StereoParameters {
    /// Validate the configuration and compute the reduced grid layout.
    ///
    /// Must be called again after any change of the base fields.
    pub fn init(&self) -> Result<StereoLayout> {
        if self.disp_max == 0 {
            return Err(Error::InvalidParameters("disparity range must be positive".into()));
        }
        if self.disp_max > DISPARITY_INVALID as usize {
            return Err(Error::InvalidParameters(format!(
                "disparity range {} exceeds the 8-bit output range of {}",
                self.disp_max, DISPARITY_INVALID
            )));
        }
        if self.block_size == 0 {
            return Err(Error::InvalidParameters("block size must be positive".into()));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(Error::InvalidParameters(format!(
                "image size {}x{} is empty",
                self.image_width, self.image_height
            )));
        }

        let u0 = self.u_margin.max(self.block_size);
        let v0 = self.v_margin.max(self.block_size);

        let u_max = bounded_end(u0, self.roi_width, self.u_margin, self.block_size, self.image_width);
        let v_max = bounded_end(v0, self.roi_height, self.v_margin, self.block_size, self.image_height);

        let small_width = u_max.saturating_sub(u0) / self.block_size;
        let small_height = v_max.saturating_sub(v0) / self.block_size;

        if small_width == 0 || small_height == 0 {
            return Err(Error::InvalidParameters(format!(
                "region of interest [{}, {}) x [{}, {}) holds no complete block",
                u0, u_max, v0, v_max
            )));
        }

        Ok(StereoLayout {
            disp_max: self.disp_max,
            block_size: self.block_size,
            half_block_size: self.block_size / 2,
            lambda_step: self.lambda_step,
            lambda_jump: self.lambda_jump,
            image_width: self.image_width,
            image_height: self.image_height,
            u0,
            v0,
            u_max,
            v_max,
            small_width,
            small_height
        })
    }
}

/// End of the ROI along one axis, never closer than one block to the image border.
fn bounded_end(
    start: usize,
    size: Option<usize>,
    margin: usize,
    block_size: usize,
    image_size: usize
) -> usize {
    let border = image_size.saturating_sub(block_size);
    match size {
        Some(size) => (start + size).min(border),
        None => image_size.saturating_sub(margin.max(block_size))
    }
}

impl StereoLayout {
    /// From image to reduced grid coordinates.
    ///
    /// Returns `None` for pixels not covered by a complete cell.
    pub fn u_small(&self, u: usize) -> Option<usize> {
        if u < self.u0 {
            return None;
        }
        let us = (u - self.u0) / self.block_size;
        if us < self.small_width { Some(us) } else { None }
    }

    pub fn v_small(&self, v: usize) -> Option<usize> {
        if v < self.v0 {
            return None;
        }
        let vs = (v - self.v0) / self.block_size;
        if vs < self.small_height { Some(vs) } else { None }
    }

    /// From reduced grid to image coordinates, the center pixel of the cell.
    pub fn u_big(&self, us: usize) -> usize {
        us * self.block_size + self.half_block_size + self.u0
    }

    pub fn v_big(&self, vs: usize) -> usize {
        vs * self.block_size + self.half_block_size + self.v0
    }

    /// Full resolution columns covered by the cell column `us`.
    pub fn u_footprint(&self, us: usize) -> std::ops::Range<usize> {
        let start = self.u0 + us * self.block_size;
        start..start + self.block_size
    }

    pub fn v_footprint(&self, vs: usize) -> std::ops::Range<usize> {
        let start = self.v0 + vs * self.block_size;
        start..start + self.block_size
    }

    /// Whether the full resolution pixel lies inside the ROI.
    pub fn in_roi(&self, u: usize, v: usize) -> bool {
        u >= self.u0 && u < self.u_max && v >= self.v0 && v < self.v_max
    }

    /// Index of the pixel `[row, col]` in a row-major full resolution buffer.
    pub fn linear_idx(&self, row: usize, col: usize) -> usize {
        self.image_width * row + col
    }

    pub fn num_pixels(&self) -> usize {
        self.image_width * self.image_height
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
