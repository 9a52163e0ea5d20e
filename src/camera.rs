//! # Camera models
//!
//! The projection capability consumed by the stereo engine, and two models implementing it: a
//! plain [`Pinhole`] and the enhanced unified camera model ([`Eucm`]) for wide-angle and fisheye
//! lenses.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

const PRECISION: f64 = 1e-9;

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// Projection and back-projection of a calibrated camera.
pub trait CameraModel: fmt::Debug + Send + Sync {
    /// Project a point in camera coordinates to a pixel, `None` outside the field of view.
    fn project(&self, point: &Vector3<f64>) -> Option<Vector2<f64>>;

    /// Back-project a pixel to a unit ray, `None` outside the field of view.
    fn unproject(&self, pixel: &Vector2<f64>) -> Option<Vector3<f64>>;

    /// Width and height of the image in pixels.
    fn image_size(&self) -> (usize, usize);

    /// Intrinsic parameters in model order.
    fn params(&self) -> Vec<f64>;

    /// Admissible `(lower, upper)` range of each intrinsic parameter.
    fn parameter_bounds(&self) -> Vec<(f64, f64)>;

    fn clone_box(&self) -> Box<dyn CameraModel>;
}

impl Clone for Box<dyn CameraModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Ideal perspective camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pinhole {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: usize,
    pub height: usize
}

/// Enhanced unified camera model.
///
/// A point is projected on the ellipsoid `beta * (x^2 + y^2) + z^2 = 1` and then onto the image
/// plane from a center shifted along the optical axis by `alpha`. With `alpha = 0` the model
/// reduces to a pinhole.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Eucm {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub alpha: f64,
    pub beta: f64,
    pub width: usize,
    pub height: usize
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Pinhole {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: usize, height: usize) -> Self {
        Self { fx, fy, cx, cy, width, height }
    }
}

impl CameraModel for Pinhole {
    fn project(&self, point: &Vector3<f64>) -> Option<Vector2<f64>> {
        if point.z < PRECISION {
            return None;
        }
        Some(Vector2::new(
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy
        ))
    }

    fn unproject(&self, pixel: &Vector2<f64>) -> Option<Vector3<f64>> {
        let ray = Vector3::new((pixel.x - self.cx) / self.fx, (pixel.y - self.cy) / self.fy, 1.0);
        Some(ray.normalize())
    }

    fn image_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn params(&self) -> Vec<f64> {
        vec![self.fx, self.fy, self.cx, self.cy]
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        vec![
            (1.0, f64::INFINITY),
            (1.0, f64::INFINITY),
            (0.0, self.width as f64),
            (0.0, self.height as f64),
        ]
    }

    fn clone_box(&self) -> Box<dyn CameraModel> {
        Box::new(*self)
    }
}

impl Eucm {
    pub fn new(params: [f64; 6], width: usize, height: usize) -> Self {
        let [fx, fy, cx, cy, alpha, beta] = params;
        Self { fx, fy, cx, cy, alpha, beta, width, height }
    }

    /// Lower bound of `z / d` for a point to be projectable.
    fn projection_limit(&self) -> f64 {
        if self.alpha > 0.5 {
            (1.0 - self.alpha) / self.alpha
        } else {
            self.alpha / (1.0 - self.alpha)
        }
    }
}

impl CameraModel for Eucm {
    fn project(&self, point: &Vector3<f64>) -> Option<Vector2<f64>> {
        let (x, y, z) = (point.x, point.y, point.z);

        let d = (self.beta * (x * x + y * y) + z * z).sqrt();
        let denom = self.alpha * d + (1.0 - self.alpha) * z;

        if denom < PRECISION || z <= -self.projection_limit() * d {
            return None;
        }

        Some(Vector2::new(
            self.fx * x / denom + self.cx,
            self.fy * y / denom + self.cy
        ))
    }

    fn unproject(&self, pixel: &Vector2<f64>) -> Option<Vector3<f64>> {
        let mx = (pixel.x - self.cx) / self.fx;
        let my = (pixel.y - self.cy) / self.fy;
        let r2 = mx * mx + my * my;

        let shift = 2.0 * self.alpha - 1.0;
        if self.alpha > 0.5 && r2 * self.beta * shift >= 1.0 {
            return None;
        }

        let num = 1.0 - self.alpha * self.alpha * self.beta * r2;
        let denom = self.alpha * (1.0 - shift * self.beta * r2).sqrt() + 1.0 - self.alpha;
        if denom.abs() < PRECISION {
            return None;
        }

        Some(Vector3::new(mx, my, num / denom).normalize())
    }

    fn image_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn params(&self) -> Vec<f64> {
        vec![self.fx, self.fy, self.cx, self.cy, self.alpha, self.beta]
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        vec![
            (1.0, f64::INFINITY),
            (1.0, f64::INFINITY),
            (0.0, self.width as f64),
            (0.0, self.height as f64),
            (0.0, 1.0),
            (PRECISION, f64::INFINITY),
        ]
    }

    fn clone_box(&self) -> Box<dyn CameraModel> {
        Box::new(*self)
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
