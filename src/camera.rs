// Camera pose and keyframe-to-keyframe blending.
//
// Translation components interpolate linearly; the view direction and up
// vector rotate along the great circle between the two poses so orbiting
// moves stay on the orbit instead of cutting through the focal point.

use crate::geometry::{Point3D, Vector3D};
use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};

/// Camera state saved with each keyframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Point3D,

    pub focal_point: Point3D,

    pub view_up: Vector3D,

    /// Half the viewport height in physical units (orthographic zoom)
    pub parallel_scale: f64,

    pub orthographic: bool,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Point3D::new(0.0, 0.0, 1.0),
            focal_point: Point3D::origin(),
            view_up: Vector3D::new(0.0, 1.0, 0.0),
            parallel_scale: 1.0,
            orthographic: true,
        }
    }
}

/// Blend two camera poses at parameter `t` in [0, 1].
///
/// The focal point, view distance and parallel scale lerp; the view
/// direction and up vector slerp. The projection flag follows the nearer
/// pose since it cannot be blended.
pub fn interpolate(a: &CameraPose, b: &CameraPose, t: f64) -> CameraPose {
    let t = t.clamp(0.0, 1.0);

    let focal_point = a.focal_point + (b.focal_point - a.focal_point) * t;
    let dist_a = (a.position - a.focal_point).norm();
    let dist_b = (b.position - b.focal_point).norm();
    let distance = dist_a + (dist_b - dist_a) * t;

    let dir = rotate_toward(a.position - a.focal_point, b.position - b.focal_point, t);
    let position = if let Some(dir) = dir {
        focal_point + dir * distance
    } else {
        // Coincident position and focal point; fall back to a plain lerp.
        a.position + (b.position - a.position) * t
    };

    let view_up =
        rotate_toward(a.view_up, b.view_up, t).unwrap_or(if t < 0.5 { a.view_up } else { b.view_up });

    CameraPose {
        position,
        focal_point,
        view_up,
        parallel_scale: a.parallel_scale + (b.parallel_scale - a.parallel_scale) * t,
        orthographic: if t < 0.5 { a.orthographic } else { b.orthographic },
    }
}

/// Partially rotate `from` toward `to` along the shortest arc, returning a
/// unit vector. None when either input has no direction.
fn rotate_toward(from: Vector3D, to: Vector3D, t: f64) -> Option<Vector3D> {
    let from_n = from.try_normalize(1e-12)?;
    let to_n = to.try_normalize(1e-12)?;
    match UnitQuaternion::rotation_between(&from_n, &to_n) {
        Some(rotation) => Some(rotation.powf(t) * from_n),
        // Antipodal directions have no unique arc; snap at the midpoint.
        None => Some(if t < 0.5 { from_n } else { to_n }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_reproduce_poses() {
        let a = CameraPose::default();
        let b = CameraPose {
            position: Point3D::new(5.0, 0.0, 0.0),
            focal_point: Point3D::new(1.0, 1.0, 1.0),
            view_up: Vector3D::new(0.0, 0.0, 1.0),
            parallel_scale: 4.0,
            orthographic: false,
        };

        let at_a = interpolate(&a, &b, 0.0);
        assert!((at_a.position - a.position).norm() < 1e-12);
        assert_eq!(at_a.parallel_scale, a.parallel_scale);
        assert_eq!(at_a.orthographic, a.orthographic);

        let at_b = interpolate(&a, &b, 1.0);
        assert!((at_b.position - b.position).norm() < 1e-9);
        assert!((at_b.view_up - b.view_up).norm() < 1e-9);
        assert_eq!(at_b.orthographic, b.orthographic);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        // 90 degree orbit around the origin at radius 2.
        let a = CameraPose {
            position: Point3D::new(2.0, 0.0, 0.0),
            focal_point: Point3D::origin(),
            ..CameraPose::default()
        };
        let b = CameraPose {
            position: Point3D::new(0.0, 2.0, 0.0),
            focal_point: Point3D::origin(),
            ..CameraPose::default()
        };

        let mid = interpolate(&a, &b, 0.5);
        // A linear blend would give radius sqrt(2); the slerp keeps 2.
        assert!((mid.position.coords.norm() - 2.0).abs() < 1e-9);
        // Halfway along the arc: both components equal.
        assert!((mid.position.x - mid.position.y).abs() < 1e-9);
    }

    #[test]
    fn test_scale_lerps() {
        let a = CameraPose {
            parallel_scale: 1.0,
            ..CameraPose::default()
        };
        let b = CameraPose {
            parallel_scale: 3.0,
            ..CameraPose::default()
        };
        assert!((interpolate(&a, &b, 0.5).parallel_scale - 2.0).abs() < 1e-12);
    }
}
