//! # Triangulation
//!
//! Recovery of 3D points from matched pixels of the two cameras.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use nalgebra::{Isometry3, Vector2, Vector3};

use crate::camera::CameraModel;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Rays whose directions are closer than this (sine squared) are considered parallel.
const PARALLEL_EPSILON: f64 = 1e-12;

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

/// Triangulate the pixel `p1` of the first camera against `p2` of the second one.
///
/// `pose` is the pose of the second camera in the first camera frame. The result is the midpoint
/// of the shortest segment joining the two rays, in the first camera frame. Returns `None` if a
/// pixel cannot be back-projected, the rays are parallel, or the point lies behind the first
/// camera.
pub fn triangulate(
    cam1: &dyn CameraModel,
    cam2: &dyn CameraModel,
    pose: &Isometry3<f64>,
    p1: &Vector2<f64>,
    p2: &Vector2<f64>
) -> Option<Vector3<f64>> {
    let v1 = cam1.unproject(p1)?;
    let v2 = pose.rotation * cam2.unproject(p2)?;
    let t = pose.translation.vector;

    // minimize |l1 v1 - (t + l2 v2)|^2
    let a = v1.dot(&v1);
    let b = v1.dot(&v2);
    let c = v2.dot(&v2);
    let d = v1.dot(&t);
    let e = v2.dot(&t);

    let denom = a * c - b * b;
    if denom < PARALLEL_EPSILON {
        return None;
    }

    let l1 = (c * d - b * e) / denom;
    let l2 = (b * d - a * e) / denom;
    if l1 <= 0.0 {
        return None;
    }

    Some((v1 * l1 + t + v2 * l2) * 0.5)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Eucm, Pinhole};
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Translation3, UnitQuaternion};
    use rstest::rstest;

    fn pose() -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(0.25, -0.02, 0.05),
            UnitQuaternion::from_euler_angles(0.02, -0.1, 0.03)
        )
    }

    #[rstest]
    #[case(Vector3::new(0.1, 0.2, 2.0))]
    #[case(Vector3::new(-1.5, 0.4, 4.0))]
    #[case(Vector3::new(0.7, -0.3, 12.0))]
    fn round_trip_through_projection(#[case] point: Vector3<f64>) {
        let cam1 = Eucm::new([200.0, 200.0, 160.0, 120.0, 0.6, 1.1], 320, 240);
        let cam2 = Eucm::new([210.0, 205.0, 158.0, 121.0, 0.55, 1.0], 320, 240);
        let pose = pose();

        let p1 = cam1.project(&point).unwrap();
        let p2 = cam2.project(&pose.inverse_transform_point(&Point3::from(point)).coords).unwrap();

        let x = triangulate(&cam1, &cam2, &pose, &p1, &p2).unwrap();
        assert_relative_eq!(x, point, epsilon = 1e-6);
    }

    #[test]
    fn parallel_rays_are_rejected() {
        let cam = Pinhole::new(100.0, 100.0, 50.0, 50.0, 100, 100);
        let pose = Isometry3::from_parts(Translation3::new(0.1, 0.0, 0.0), UnitQuaternion::identity());
        let p = Vector2::new(50.0, 50.0);

        assert!(triangulate(&cam, &cam, &pose, &p, &p).is_none());
    }

    #[test]
    fn points_behind_are_rejected() {
        let cam = Pinhole::new(100.0, 100.0, 50.0, 50.0, 100, 100);
        let pose = Isometry3::from_parts(Translation3::new(0.1, 0.0, 0.0), UnitQuaternion::identity());

        // rays diverge: the closest approach lies behind the cameras
        let p1 = Vector2::new(40.0, 50.0);
        let p2 = Vector2::new(60.0, 50.0);
        assert!(triangulate(&cam, &cam, &pose, &p1, &p2).is_none());
    }
}
