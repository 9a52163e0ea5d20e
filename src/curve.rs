//! # Epipolar curves
//!
//! A generalized epipolar curve is stored as a quadratic parametric polynomial
//! `p(s) = c0 + c1 s + c2 s^2`, `s` in `[0, 1]`, with `p(0)` the projection at infinity. The
//! [`CurveRasterizer`] turns it into the sequence of integer pixels sampled by the cost volume,
//! the n-th pixel being the disparity hypothesis `n`.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use nalgebra::Vector2;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Maximum displacement along the curve between two evaluations, in pixels.
const MAX_STEP_PX: f64 = 0.25;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpipolarCurve {
    pub coeffs: [Vector2<f64>; 3]
}

/// Iterator over the distinct integer pixels of an [`EpipolarCurve`], far to near.
#[derive(Clone, Debug)]
pub struct CurveRasterizer {
    curve: EpipolarCurve,
    s: f64,
    ds: f64,
    last: Option<(i32, i32)>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl EpipolarCurve {
    /// Quadratic through `start` at `s = 0`, `mid` at `s = 0.5` and `end` at `s = 1`.
    pub fn fit(start: Vector2<f64>, mid: Vector2<f64>, end: Vector2<f64>) -> Self {
        Self {
            coeffs: [
                start,
                mid * 4.0 - start * 3.0 - end,
                (start + end) * 2.0 - mid * 4.0,
            ]
        }
    }

    pub fn eval(&self, s: f64) -> Vector2<f64> {
        let [c0, c1, c2] = self.coeffs;
        c0 + (c1 + c2 * s) * s
    }

    pub fn derivative(&self, s: f64) -> Vector2<f64> {
        self.coeffs[1] + self.coeffs[2] * (2.0 * s)
    }

    /// Upper bound of `|p'(s)|` on `[0, 1]`.
    ///
    /// The derivative is affine in `s`, so its norm peaks at one of the ends.
    pub fn max_speed(&self) -> f64 {
        self.derivative(0.0).norm().max(self.derivative(1.0).norm())
    }

    pub fn rasterize(&self) -> CurveRasterizer {
        CurveRasterizer::new(*self)
    }
}

impl CurveRasterizer {
    pub fn new(curve: EpipolarCurve) -> Self {
        let speed = curve.max_speed();
        let ds = if speed > MAX_STEP_PX { MAX_STEP_PX / speed } else { 1.0 };
        Self {
            curve,
            s: 0.0,
            ds,
            last: None
        }
    }

    /// Rasterizer positioned so that the next sample is the `offset`-th pixel of the curve.
    pub fn with_offset(curve: EpipolarCurve, offset: usize) -> Self {
        let mut raster = Self::new(curve);
        if offset > 0 {
            raster.nth(offset - 1);
        }
        raster
    }

    fn round(p: Vector2<f64>) -> (i32, i32) {
        (p.x.round() as i32, p.y.round() as i32)
    }
}

impl Iterator for CurveRasterizer {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        let last = match self.last {
            None => {
                let first = Self::round(self.curve.eval(0.0));
                self.last = Some(first);
                return Some(first);
            }
            Some(last) => last
        };

        while self.s < 1.0 {
            self.s = (self.s + self.ds).min(1.0);
            let px = Self::round(self.curve.eval(self.s));
            if px != last {
                self.last = Some(px);
                return Some(px);
            }
        }

        None
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
