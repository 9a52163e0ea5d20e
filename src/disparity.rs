//! # General disparity objects
//!
//! This module provides generic disparity traits and structures for use by different algorithms.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::GrayImage;

use crate::error::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Disparity value of pixels without a match.
pub const DISPARITY_INVALID: u8 = u8::MAX;

/// Distance value of pixels without a triangulated point.
pub const DISTANCE_INVALID: f32 = 0.0;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A pair of single channel images, the first one is the reference.
pub struct StereoFrame {
    pub left: GrayImage,
    pub right: GrayImage
}

/// A full resolution map of disparity indices along the epipolar curves.
///
/// A disparity is a step index along the curve of the pixel, not a column offset, pixels without
/// a match hold [`DISPARITY_INVALID`].
#[derive(Clone, Debug, PartialEq)]
pub struct DisparityMap {
    data: GrayImage,
    pub max_disp: Option<u8>,
    pub min_disp: Option<u8>
}

/// A full resolution map of distances from the first camera center.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceMap {
    width: usize,
    height: usize,
    data: Vec<f32>
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait DisparityAlgorithm {
    /// Compute the disparity map of the given stereo frame.
    fn compute(&mut self, frame: &StereoFrame) -> Result<DisparityMap>;
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl DisparityMap {
    /// Create a map where every pixel is invalid.
    pub fn new(width: usize, height: usize) -> Self {
        DisparityMap {
            data: GrayImage::from_pixel(width as u32, height as u32, image::Luma([DISPARITY_INVALID])),
            min_disp: None,
            max_disp: None
        }
    }

    pub fn width(&self) -> usize {
        self.data.width() as usize
    }

    pub fn height(&self) -> usize {
        self.data.height() as usize
    }

    pub fn put(&mut self, x: usize, y: usize, val: u8) {
        self.data.put_pixel(x as u32, y as u32, image::Luma([val]))
    }

    /// Raw value at the pixel, [`DISPARITY_INVALID`] included.
    pub fn raw(&self, x: usize, y: usize) -> u8 {
        self.data.get_pixel(x as u32, y as u32)[0]
    }

    /// Disparity at the pixel, `None` if it is invalid or outside the map.
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        match self.raw(x, y) {
            DISPARITY_INVALID => None,
            d => Some(d)
        }
    }

    /// Recompute `min_disp` and `max_disp` from the valid pixels.
    pub fn update_range(&mut self) {
        let valid = self.data.as_raw().iter().copied().filter(|&d| d != DISPARITY_INVALID);
        let (min, max) = valid.fold((None, None), |(min, max): (Option<u8>, Option<u8>), d| {
            (Some(min.map_or(d, |m| m.min(d))), Some(max.map_or(d, |m| m.max(d))))
        });
        self.min_disp = min;
        self.max_disp = max;
    }

    /// Number of valid pixels.
    pub fn count_valid(&self) -> usize {
        self.data.as_raw().iter().filter(|&&d| d != DISPARITY_INVALID).count()
    }

    /// Converts the map into a Luma8 image, invalid pixels are black.
    pub fn to_luma(&self) -> GrayImage {
        let mut new = self.data.clone();

        for px in new.pixels_mut() {
            if px[0] == DISPARITY_INVALID {
                px[0] = 0;
            }
        }

        new
    }

    /// Converts the map to a normalised GrayImage.
    ///
    /// Normalises by the maximum observed disparity in the map. If the maximum disparity is not
    /// set then the function is equivalent to `.to_luma()`.
    pub fn to_luma_normalised(&self) -> GrayImage {
        let mult = match self.max_disp {
            Some(d) if d > 0 => 255.0 / d as f32,
            _ => 1.0
        };

        let mut new = self.to_luma();

        for px in new.pixels_mut() {
            let val = px[0] as f32 * mult;
            px[0] = val.max(0.0).min(255.0) as u8;
        }

        new
    }

    pub fn as_luma(&self) -> &GrayImage {
        &self.data
    }
}

impl DistanceMap {
    /// Create a map where every pixel is invalid.
    pub fn new(width: usize, height: usize) -> Self {
        DistanceMap {
            width,
            height,
            data: vec![DISTANCE_INVALID; width * height]
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn put(&mut self, x: usize, y: usize, val: f32) {
        self.data[self.width * y + x] = val;
    }

    /// Distance at the pixel, `None` if it is invalid or outside the map.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let val = self.data[self.width * y + x];
        if val > DISTANCE_INVALID && val.is_finite() { Some(val) } else { None }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
