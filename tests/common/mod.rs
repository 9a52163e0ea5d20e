//! Synthetic scenes shared by the integration tests.

#![allow(dead_code)]

use cv_generalized_stereo::prelude::*;
use image::{GrayImage, Luma};
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector2, Vector3};

/// Deterministic per-pixel noise.
pub fn hash_noise(seed: u32, x: u32, y: u32) -> u8 {
    let mut h = seed.wrapping_mul(0x9e37_79b9) ^ x.wrapping_mul(0x85eb_ca6b) ^ y.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    (h >> 24) as u8
}

/// Image of uncorrelated noise.
pub fn random_image(width: u32, height: u32, seed: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| Luma([hash_noise(seed, x, y)]))
}

/// Second camera translated along the first camera x axis.
pub fn lateral_pose(baseline: f64) -> Isometry3<f64> {
    Isometry3::from_parts(Translation3::new(baseline, 0.0, 0.0), UnitQuaternion::identity())
}

/// Textured plane `z = depth` of the first camera frame.
pub struct PlaneScene {
    pub depth: f64,
    texture: GrayImage,
    texel: f64
}

impl PlaneScene {
    pub fn new(depth: f64) -> Self {
        let noise = random_image(512, 512, 7);
        let blurred = imageproc::filter::gaussian_blur_f32(&noise, 1.5);

        let (lo, hi) = blurred
            .as_raw()
            .iter()
            .fold((255u8, 0u8), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        let range = (hi.saturating_sub(lo)).max(1) as f32;
        let texture = GrayImage::from_fn(512, 512, |x, y| {
            let p = blurred.get_pixel(x, y)[0].saturating_sub(lo) as f32;
            Luma([(p * 255.0 / range) as u8])
        });

        PlaneScene {
            depth,
            texture,
            texel: 0.02
        }
    }

    /// Point hit by `ray` of a camera at `pose`, in the first camera frame.
    pub fn intersect(&self, pose: &Isometry3<f64>, ray: &Vector3<f64>) -> Option<Vector3<f64>> {
        let dir = pose.rotation * ray;
        let origin = pose.translation.vector;
        if dir.z <= 1e-9 {
            return None;
        }
        let lambda = (self.depth - origin.z) / dir.z;
        if lambda <= 0.0 {
            return None;
        }
        Some(origin + dir * lambda)
    }

    /// Image of the plane seen by `cam` at `pose`.
    pub fn render(&self, cam: &dyn CameraModel, pose: &Isometry3<f64>) -> GrayImage {
        let (width, height) = cam.image_size();
        GrayImage::from_fn(width as u32, height as u32, |x, y| {
            let val = cam
                .unproject(&Vector2::new(x as f64, y as f64))
                .and_then(|ray| self.intersect(pose, &ray))
                .map_or(0, |p| self.sample(p.x, p.y));
            Luma([val])
        })
    }

    fn sample(&self, x: f64, y: f64) -> u8 {
        let (tw, th) = self.texture.dimensions();
        let tx = x / self.texel + tw as f64 / 2.0;
        let ty = y / self.texel + th as f64 / 2.0;
        if tx < 0.0 || ty < 0.0 || tx >= (tw - 1) as f64 || ty >= (th - 1) as f64 {
            return 0;
        }

        let (x0, y0) = (tx.floor() as u32, ty.floor() as u32);
        let (fx, fy) = (tx - x0 as f64, ty - y0 as f64);
        let p = |x: u32, y: u32| self.texture.get_pixel(x, y)[0] as f64;

        let top = p(x0, y0) * (1.0 - fx) + p(x0 + 1, y0) * fx;
        let bottom = p(x0, y0 + 1) * (1.0 - fx) + p(x0 + 1, y0 + 1) * fx;
        (top * (1.0 - fy) + bottom * fy).round().max(0.0).min(255.0) as u8
    }

    /// Disparity whose matched pixel is the closest to the true projection of the cell center.
    ///
    /// `None` if the cell has no curve or the true match is more than 1.5 pixels off the curve.
    pub fn true_disparity(
        &self,
        stereo: &GeneralizedStereo,
        cam1: &dyn CameraModel,
        cam2: &dyn CameraModel,
        us: usize,
        vs: usize
    ) -> Option<u8> {
        let layout = stereo.layout();
        let (u, v) = (layout.u_big(us), layout.v_big(vs));

        let ray = cam1.unproject(&Vector2::new(u as f64, v as f64))?;
        let point = self.intersect(&Isometry3::identity(), &ray)?;
        let local = stereo.pose().inverse_transform_point(&Point3::from(point));
        let target = cam2.project(&local.coords)?;

        let (best, dist) = (0..layout.disp_max)
            .filter_map(|d| {
                let (x, y) = stereo.matched_pixel(us, vs, d as u8)?;
                Some((d, (Vector2::new(x as f64, y as f64) - target).norm()))
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        if dist <= 1.5 { Some(best as u8) } else { None }
    }
}
