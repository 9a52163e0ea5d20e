//! # Epipolar geometry precomputation
//!
//! Everything the cost volume needs to know about the two cameras, split by what invalidates it:
//!
//! - the ray of every pixel of the first camera only depends on the first camera and is computed
//!   once ([`EpipolarGeometry::new`]),
//! - rotated rays, projections at infinity, the epipole and the epipolar curves depend on the
//!   relative pose and are recomputed by [`EpipolarGeometry::update_pose`].

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use nalgebra::{Isometry3, Point3, Unit, Vector2, Vector3};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, warn};

use crate::camera::CameraModel;
use crate::curve::EpipolarCurve;
use crate::grid::Grid;
use crate::params::StereoLayout;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Translations shorter than this are treated as a pure rotation.
pub const BASELINE_EPSILON: f64 = 1e-9;

/// Number of times the end of the fitted arc may be pulled towards the projection at infinity.
const MAX_HALVINGS: usize = 16;

const PARALLEL_EPSILON: f64 = 1e-9;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct EpipolarGeometry {
    layout: StereoLayout,

    /// Unit ray of every pixel of the first image, in the first camera frame.
    rays: Vec<Option<Vector3<f64>>>,

    /// `rays` expressed in the orientation of the second camera.
    rotated: Vec<Option<Vector3<f64>>>,

    /// Projection of `rotated` by the second camera, as if the points were at infinity.
    pinf: Vec<Option<Vector2<f64>>>,

    /// Direction from the second camera center to the first one, in the second camera frame.
    baseline: Option<Unit<Vector3<f64>>>,

    /// Projection of the first camera center onto the second image.
    epipole: Option<Vector2<f64>>,

    /// One curve per reduced grid cell, fitted at the cell center.
    curves: Grid<Option<EpipolarCurve>>,

    reconstruction_count: usize,
    pose_update_count: usize
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl EpipolarGeometry {
    /// Back-project the first image. Pose dependent buffers stay empty until
    /// [`update_pose`](Self::update_pose) is called.
    pub fn new(layout: StereoLayout, cam1: &dyn CameraModel) -> Self {
        let n = layout.num_pixels();
        let mut geometry = Self {
            layout,
            rays: Vec::new(),
            rotated: vec![None; n],
            pinf: vec![None; n],
            baseline: None,
            epipole: None,
            curves: Grid::new(layout.small_height, layout.small_width, None),
            reconstruction_count: 0,
            pose_update_count: 0
        };
        geometry.reconstruct(cam1);
        geometry
    }

    /// Compute the ray of every ROI pixel of the first image.
    pub fn reconstruct(&mut self, cam1: &dyn CameraModel) {
        let start = Instant::now();
        let layout = self.layout;

        self.rays = (0..layout.num_pixels())
            .into_par_iter()
            .map(|idx| {
                let (u, v) = (idx % layout.image_width, idx / layout.image_width);
                if !layout.in_roi(u, v) {
                    return None;
                }
                cam1.unproject(&Vector2::new(u as f64, v as f64))
            })
            .collect();

        self.reconstruction_count += 1;
        debug!(
            valid = self.rays.iter().filter(|r| r.is_some()).count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "reconstructed first image rays"
        );
    }

    /// Recompute every buffer invalidated by a change of the relative pose.
    ///
    /// `pose` is the pose of the second camera in the first camera frame.
    pub fn update_pose(&mut self, pose: &Isometry3<f64>, cam2: &dyn CameraModel) {
        let start = Instant::now();

        self.compute_rotated(pose);
        self.compute_epipole(pose, cam2);
        self.compute_pinf(cam2);
        self.compute_curves(cam2);

        self.pose_update_count += 1;
        debug!(
            curves = self.curves.as_slice().iter().filter(|c| c.is_some()).count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "updated pose dependent geometry"
        );
    }

    fn compute_rotated(&mut self, pose: &Isometry3<f64>) {
        let rotation = pose.rotation;
        self.rotated = self
            .rays
            .par_iter()
            .map(|ray| ray.as_ref().map(|r| rotation.inverse_transform_vector(r)))
            .collect();
    }

    fn compute_epipole(&mut self, pose: &Isometry3<f64>, cam2: &dyn CameraModel) {
        let center = pose.inverse_transform_point(&Point3::origin()).coords;

        if center.norm() < BASELINE_EPSILON {
            warn!("relative pose has no baseline, disparity is undefined");
            self.baseline = None;
            self.epipole = None;
            return;
        }

        self.baseline = Some(Unit::new_normalize(center));
        self.epipole = cam2.project(&center);
    }

    fn compute_pinf(&mut self, cam2: &dyn CameraModel) {
        self.pinf = self
            .rotated
            .par_iter()
            .map(|ray| ray.as_ref().and_then(|r| cam2.project(r)))
            .collect();
    }

    fn compute_curves(&mut self, cam2: &dyn CameraModel) {
        let layout = self.layout;
        let this = &*self;
        let cells: Vec<_> = (0..layout.small_height * layout.small_width)
            .into_par_iter()
            .map(|i| {
                let (us, vs) = (i % layout.small_width, i / layout.small_width);
                let idx = layout.linear_idx(layout.v_big(vs), layout.u_big(us));
                this.fit_curve(idx, cam2)
            })
            .collect();

        self.curves = Grid::from_vec(layout.small_height, layout.small_width, cells);
    }

    /// Fit the epipolar curve of the pixel with linear index `idx`.
    ///
    /// The true curve is the projection of the direction rotating in the epipolar plane from the
    /// ray (at infinity) towards the baseline (the epipole). It is sampled at the start, the end
    /// and the middle of an arc which is shortened until both samples project and the end lies
    /// within twice the search reach of the projection at infinity.
    pub fn fit_curve(&self, idx: usize, cam2: &dyn CameraModel) -> Option<EpipolarCurve> {
        let baseline = self.baseline?;
        let ray = self.rotated.get(idx).copied().flatten()?;
        let pinf = self.pinf.get(idx).copied().flatten()?;

        let baseline = baseline.into_inner();
        let cos = ray.dot(&baseline).max(-1.0).min(1.0);
        let ortho = baseline - ray * cos;
        let ortho_norm = ortho.norm();
        if ortho_norm < PARALLEL_EPSILON {
            return None;
        }
        let ortho = ortho / ortho_norm;

        let max_arc = 2.0 * (self.layout.disp_max + self.layout.block_size) as f64;
        let direction = |theta: f64| ray * theta.cos() + ortho * theta.sin();

        let mut theta = cos.acos();
        for _ in 0..MAX_HALVINGS {
            let end = cam2.project(&direction(theta));
            let mid = cam2.project(&direction(0.5 * theta));

            if let (Some(end), Some(mid)) = (end, mid) {
                if (end - pinf).norm() <= max_arc {
                    return Some(EpipolarCurve::fit(pinf, mid, end));
                }
            }
            theta *= 0.5;
        }

        None
    }

    pub fn layout(&self) -> &StereoLayout {
        &self.layout
    }

    pub fn ray(&self, idx: usize) -> Option<Vector3<f64>> {
        self.rays.get(idx).copied().flatten()
    }

    pub fn rays(&self) -> &[Option<Vector3<f64>>] {
        &self.rays
    }

    pub fn rotated(&self) -> &[Option<Vector3<f64>>] {
        &self.rotated
    }

    pub fn pinf(&self) -> &[Option<Vector2<f64>>] {
        &self.pinf
    }

    pub fn epipole(&self) -> Option<Vector2<f64>> {
        self.epipole
    }

    /// `None` when the pose is a pure rotation.
    pub fn baseline(&self) -> Option<Unit<Vector3<f64>>> {
        self.baseline
    }

    pub fn curves(&self) -> &Grid<Option<EpipolarCurve>> {
        &self.curves
    }

    pub fn curve(&self, us: usize, vs: usize) -> Option<&EpipolarCurve> {
        self.curves.get(vs, us).and_then(Option::as_ref)
    }

    /// Number of times the first image rays were computed.
    pub fn reconstruction_count(&self) -> usize {
        self.reconstruction_count
    }

    /// Number of times the pose dependent buffers were computed.
    pub fn pose_update_count(&self) -> usize {
        self.pose_update_count
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Eucm, Pinhole};
    use crate::params::StereoParameters;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    const WIDTH: usize = 80;
    const HEIGHT: usize = 60;

    fn layout() -> StereoLayout {
        StereoParameters {
            disp_max: 16,
            block_size: 4,
            image_width: WIDTH,
            image_height: HEIGHT,
            ..StereoParameters::default()
        }
        .init()
        .unwrap()
    }

    fn pinhole() -> Pinhole {
        Pinhole::new(60.0, 60.0, 40.0, 30.0, WIDTH, HEIGHT)
    }

    fn fisheye() -> Eucm {
        Eucm::new([45.0, 45.0, 40.0, 30.0, 0.6, 1.0], WIDTH, HEIGHT)
    }

    fn lateral_pose(baseline: f64) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::new(baseline, 0.0, 0.0), UnitQuaternion::identity())
    }

    #[test]
    fn rays_are_limited_to_roi() {
        let layout = layout();
        let geometry = EpipolarGeometry::new(layout, &pinhole());

        assert!(geometry.ray(layout.linear_idx(0, 0)).is_none());
        assert!(geometry.ray(layout.linear_idx(layout.v0, layout.u0)).is_some());
        assert!(geometry.ray(layout.linear_idx(layout.v_max, layout.u0)).is_none());
        assert_eq!(geometry.rays().len(), WIDTH * HEIGHT);
    }

    #[test]
    fn pure_rotation_has_no_curves() {
        let cam = pinhole();
        let mut geometry = EpipolarGeometry::new(layout(), &cam);
        let pose = Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_euler_angles(0.0, 0.05, 0.0)
        );
        geometry.update_pose(&pose, &cam);

        assert!(geometry.baseline().is_none());
        assert!(geometry.epipole().is_none());
        assert!(geometry.curves().as_slice().iter().all(Option::is_none));
    }

    #[test]
    fn forward_motion_epipole_is_principal_point() {
        let cam = pinhole();
        let mut geometry = EpipolarGeometry::new(layout(), &cam);
        let pose = Isometry3::from_parts(Translation3::new(0.0, 0.0, 0.5), UnitQuaternion::identity());
        geometry.update_pose(&pose, &cam);

        // the first camera lies behind the second one
        assert!(geometry.epipole().is_none());
        assert_relative_eq!(geometry.baseline().unwrap().into_inner(), Vector3::new(0.0, 0.0, -1.0));

        let pose = Isometry3::from_parts(Translation3::new(0.0, 0.0, -0.5), UnitQuaternion::identity());
        geometry.update_pose(&pose, &cam);
        assert_relative_eq!(geometry.epipole().unwrap(), Vector2::new(40.0, 30.0), epsilon = 1e-9);
    }

    #[test]
    fn pinhole_lateral_curve_is_horizontal() {
        let cam = pinhole();
        let layout = layout();
        let mut geometry = EpipolarGeometry::new(layout, &cam);
        geometry.update_pose(&lateral_pose(0.1), &cam);

        let (us, vs) = (3, 2);
        let curve = geometry.curve(us, vs).unwrap();
        let pixels: Vec<_> = curve.rasterize().take(layout.disp_max).collect();
        let (u, v) = (layout.u_big(us) as i32, layout.v_big(vs) as i32);

        assert_eq!(pixels.len(), layout.disp_max);
        for (d, px) in pixels.iter().enumerate() {
            assert_eq!(*px, (u - d as i32, v));
        }
    }

    #[test]
    fn fisheye_curve_passes_through_true_matches() {
        let cam = fisheye();
        let layout = layout();
        let mut geometry = EpipolarGeometry::new(layout, &cam);
        let pose = Isometry3::from_parts(
            Translation3::new(0.2, 0.02, 0.03),
            UnitQuaternion::from_euler_angles(0.01, -0.03, 0.02)
        );
        geometry.update_pose(&pose, &cam);

        for &(us, vs) in &[(2, 2), (8, 6), (15, 10)] {
            let idx = layout.linear_idx(layout.v_big(vs), layout.u_big(us));
            let ray = geometry.ray(idx).unwrap();
            let curve = geometry.curve(us, vs).unwrap();
            let samples: Vec<_> = curve.rasterize().take(layout.disp_max).collect();

            for &depth in &[3.0, 6.0, 20.0] {
                let point = pose.inverse_transform_point(&Point3::from(ray * depth));
                let truth = cam.project(&point.coords).unwrap();
                let nearest = samples
                    .iter()
                    .map(|&(x, y)| (Vector2::new(x as f64, y as f64) - truth).norm())
                    .fold(f64::INFINITY, f64::min);
                assert!(nearest < 1.5, "cell ({}, {}) depth {}: {}", us, vs, depth, nearest);
            }
        }
    }

    #[test]
    fn pose_update_keeps_rays() {
        let cam = fisheye();
        let mut geometry = EpipolarGeometry::new(layout(), &cam);
        let rays = geometry.rays().to_vec();

        geometry.update_pose(&lateral_pose(0.1), &cam);
        let curves = geometry.curves().clone();
        geometry.update_pose(&lateral_pose(-0.1), &cam);

        assert_eq!(geometry.reconstruction_count(), 1);
        assert_eq!(geometry.pose_update_count(), 2);
        assert_eq!(geometry.rays(), &rays[..]);
        assert_ne!(geometry.curves(), &curves);
    }
}
