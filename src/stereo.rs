//! # Generalized stereo
//!
//! Semi-global block matching between two calibrated cameras of any projection model, without
//! rectification. Disparities are searched along the epipolar curve of each reduced grid cell,
//! from the projection at infinity towards the epipole.
//!
//! Buffers are invalidated at three rates: the rays of the first image once per camera pair, the
//! epipolar curves on every [`GeneralizedStereo::set_pose`], and the cost volume and tableaus on
//! every image pair.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{GrayImage, Luma};
use imageproc::drawing::draw_cross_mut;
use nalgebra::{Isometry3, Point3, Vector2, Vector3};

use crate::aggregation::aggregate;
use crate::camera::CameraModel;
use crate::cost::compute_cost;
use crate::curve::{CurveRasterizer, EpipolarCurve};
use crate::disparity::{DisparityAlgorithm, DisparityMap, DistanceMap, StereoFrame};
use crate::error::*;
use crate::geometry::EpipolarGeometry;
use crate::grid::Grid;
use crate::params::{StereoLayout, StereoParameters};
use crate::triangulation;
use crate::winner::{reconstruct_disparity, upsample_disparity};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct GeneralizedStereo {
    params: StereoParameters,
    layout: StereoLayout,
    cam1: Box<dyn CameraModel>,
    cam2: Box<dyn CameraModel>,

    /// Pose of the second camera in the first camera frame.
    pose: Isometry3<f64>,

    geometry: EpipolarGeometry
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl GeneralizedStereo {
    /// Create the engine and precompute the geometry of the camera pair.
    ///
    /// Fails if the parameters are invalid or do not match the image size of the cameras.
    pub fn new(
        pose: Isometry3<f64>,
        cam1: &dyn CameraModel,
        cam2: &dyn CameraModel,
        params: StereoParameters
    ) -> Result<Self> {
        let layout = params.init()?;

        for cam in &[cam1, cam2] {
            let size = cam.image_size();
            if size != (layout.image_width, layout.image_height) {
                return Err(Error::InvalidParameters(format!(
                    "camera image size {:?} differs from the configured {}x{}",
                    size, layout.image_width, layout.image_height
                )));
            }
        }

        let mut geometry = EpipolarGeometry::new(layout, cam1);
        geometry.update_pose(&pose, cam2);

        Ok(Self {
            params,
            layout,
            cam1: cam1.clone_box(),
            cam2: cam2.clone_box(),
            pose,
            geometry
        })
    }

    /// Change the relative pose, only the pose dependent geometry is recomputed.
    pub fn set_pose(&mut self, pose: Isometry3<f64>) {
        self.pose = pose;
        self.geometry.update_pose(&self.pose, self.cam2.as_ref());
    }

    pub fn pose(&self) -> &Isometry3<f64> {
        &self.pose
    }

    pub fn params(&self) -> &StereoParameters {
        &self.params
    }

    pub fn layout(&self) -> &StereoLayout {
        &self.layout
    }

    pub fn geometry(&self) -> &EpipolarGeometry {
        &self.geometry
    }

    /// Compute the full resolution disparity of `img1` against `img2`.
    pub fn compute_stereo(&self, img1: &GrayImage, img2: &GrayImage) -> Result<DisparityMap> {
        let small = self.compute_small_disparity(img1, img2)?;
        Ok(upsample_disparity(&self.layout, &self.geometry, &small))
    }

    /// Disparity of every reduced grid cell.
    pub fn compute_small_disparity(&self, img1: &GrayImage, img2: &GrayImage) -> Result<Grid<u8>> {
        self.check_size(img1)?;
        self.check_size(img2)?;

        let volume = compute_cost(&self.layout, &self.geometry, img1, img2);
        let tableaus = aggregate(&self.layout, &volume);
        Ok(reconstruct_disparity(&volume, &tableaus))
    }

    fn check_size(&self, img: &GrayImage) -> Result<()> {
        let expected = (self.layout.image_width as u32, self.layout.image_height as u32);
        if img.dimensions() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                found: img.dimensions()
            });
        }
        Ok(())
    }

    /// Pixel of the second image matched to the cell `(us, vs)` at disparity `d`.
    pub fn matched_pixel(&self, us: usize, vs: usize, d: u8) -> Option<(i32, i32)> {
        let curve = self.geometry.curve(us, vs)?;
        CurveRasterizer::with_offset(*curve, d as usize).next()
    }

    /// 3D point in the first camera frame explaining the pixel pair `(x1, y1)`, `(x2, y2)`.
    pub fn triangulate(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Option<Vector3<f64>> {
        triangulation::triangulate(
            self.cam1.as_ref(),
            self.cam2.as_ref(),
            &self.pose,
            &Vector2::new(x1, y1),
            &Vector2::new(x2, y2)
        )
    }

    /// Distance from the first camera center of every pixel with a valid disparity.
    ///
    /// Each cell is triangulated at its center and the distance fills the cell footprint.
    pub fn compute_distance(&self, disparity: &DisparityMap) -> Result<DistanceMap> {
        let layout = &self.layout;
        let found = (disparity.width() as u32, disparity.height() as u32);
        let expected = (layout.image_width as u32, layout.image_height as u32);
        if found != expected {
            return Err(Error::DimensionMismatch { expected, found });
        }

        let mut distance = DistanceMap::new(layout.image_width, layout.image_height);

        for vs in 0..layout.small_height {
            for us in 0..layout.small_width {
                let (u, v) = (layout.u_big(us), layout.v_big(vs));
                let point = disparity
                    .get(u, v)
                    .and_then(|d| self.matched_pixel(us, vs, d))
                    .and_then(|(x2, y2)| self.triangulate(u as f64, v as f64, x2 as f64, y2 as f64));

                let dist = match point {
                    Some(point) => point.norm() as f32,
                    None => continue
                };

                for y in layout.v_footprint(vs) {
                    for x in layout.u_footprint(us) {
                        if disparity.get(x, y).is_some() {
                            distance.put(x, y, dist);
                        }
                    }
                }
            }
        }

        Ok(distance)
    }

    /// Distance map of the plane `z = 0` of the frame `pose_camera_plane`, given in the first
    /// camera frame.
    ///
    /// If `polygon` has at least three vertices (plane frame, `z` ignored), only rays hitting the
    /// plane inside it get a distance.
    pub fn generate_plane(
        &self,
        pose_camera_plane: &Isometry3<f64>,
        polygon: &[Vector3<f64>]
    ) -> DistanceMap {
        let layout = &self.layout;
        let normal = pose_camera_plane.rotation * Vector3::z();
        let origin = pose_camera_plane.translation.vector;
        let offset = normal.dot(&origin);

        let mut distance = DistanceMap::new(layout.image_width, layout.image_height);

        for v in layout.v0..layout.v_max {
            for u in layout.u0..layout.u_max {
                let ray = match self.geometry.ray(layout.linear_idx(v, u)) {
                    Some(ray) => ray,
                    None => continue
                };

                let cos = normal.dot(&ray);
                if cos.abs() < 1e-12 {
                    continue;
                }
                let lambda = offset / cos;
                if lambda <= 0.0 {
                    continue;
                }

                if polygon.len() >= 3 {
                    let hit = pose_camera_plane.inverse_transform_point(&Point3::from(ray * lambda));
                    if !inside_polygon(hit.x, hit.y, polygon) {
                        continue;
                    }
                }

                distance.put(u, v, (lambda * ray.norm()) as f32);
            }
        }

        distance
    }

    /// Paint the epipolar curve of the first image pixel `(u, v)` into `out`.
    ///
    /// The searched part of the curve is white, the rest grey, the projection at infinity is
    /// marked with a cross. Returns the fitted curve if the pixel has one.
    pub fn trace_epipolar_curve(&self, u: usize, v: usize, out: &mut GrayImage) -> Option<EpipolarCurve> {
        if u >= self.layout.image_width || v >= self.layout.image_height {
            return None;
        }
        let curve = self.geometry.fit_curve(self.layout.linear_idx(v, u), self.cam2.as_ref())?;
        let (width, height) = out.dimensions();

        for (i, (x, y)) in curve.rasterize().enumerate() {
            if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                let val = if i < self.layout.disp_max { 255 } else { 128 };
                out.put_pixel(x as u32, y as u32, Luma([val]));
            }
        }

        let start = curve.eval(0.0);
        draw_cross_mut(out, Luma([255u8]), start.x.round() as i32, start.y.round() as i32);

        Some(curve)
    }
}

impl DisparityAlgorithm for GeneralizedStereo {
    /// Compute the disparity map of the frame, `left` being the first camera.
    fn compute(&mut self, frame: &StereoFrame) -> Result<DisparityMap> {
        self.compute_stereo(&frame.left, &frame.right)
    }
}

/// Even-odd test of `(x, y)` against a polygon given by its vertices.
fn inside_polygon(x: f64, y: f64, polygon: &[Vector3<f64>]) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;

    for i in 0..polygon.len() {
        let (a, b) = (&polygon[i], &polygon[j]);
        if (a.y > y) != (b.y > y) && x < (b.x - a.x) * (y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }

    inside
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
