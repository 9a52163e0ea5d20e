//! # Generalized Stereo Disparity
//!
//! This crate provides dense disparity computation between two calibrated cameras of arbitrary
//! projection model (pinhole, fisheye, ...) in a known relative pose, without rectification.
//! Matches are searched along generalized epipolar curves and smoothed with four-direction
//! dynamic programming.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod aggregation;
pub mod camera;
pub mod cost;
pub mod curve;
mod disparity;
mod error;
pub mod geometry;
pub mod grid;
pub mod params;
pub mod stereo;
pub mod triangulation;
pub mod winner;

#[cfg(feature = "statistics")]
pub mod stats;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use crate::disparity::{DISPARITY_INVALID, DISTANCE_INVALID};
pub use crate::error::{Error, Result};

pub mod prelude {
    pub use crate::camera::{CameraModel, Eucm, Pinhole};
    pub use crate::disparity::{DisparityAlgorithm, DisparityMap, DistanceMap, StereoFrame};
    pub use crate::params::{StereoLayout, StereoParameters};
    pub use crate::stereo::GeneralizedStereo;
}
