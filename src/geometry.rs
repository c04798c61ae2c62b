use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// 3D point type (volume physical coordinates, anisotropic spacing applied)
pub type Point3D = Point3<f64>;

/// 3D vector type
pub type Vector3D = Vector3<f64>;

/// Dependent axis of the clipping surface.
///
/// The surface is a height field: a function of the two axes perpendicular
/// to the dependent one. Picking Z means "the surface gives a Z value for
/// every (X, Y)".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Index of this axis into `[x, y, z]` arrays
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two remaining axes perpendicular to this one, in ascending order
    pub fn independent(self) -> [usize; 2] {
        match self {
            Axis::X => [1, 2],
            Axis::Y => [0, 2],
            Axis::Z => [0, 1],
        }
    }

    /// Project a point onto the independent plane of this axis
    pub fn project(self, p: &Point3D) -> (f64, f64) {
        let [u, v] = self.independent();
        (p[u], p[v])
    }

    /// The coordinate of a point along this axis
    pub fn dependent(self, p: &Point3D) -> f64 {
        p[self.index()]
    }
}

/// Which side of the clipping surface is retained.
///
/// "Above" keeps voxels whose dependent coordinate exceeds the surface
/// height; "Below" keeps the rest. The boundary itself belongs to the
/// kept side in both conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeptSide {
    Above,
    Below,
}

impl Default for KeptSide {
    fn default() -> Self {
        KeptSide::Above
    }
}

impl KeptSide {
    /// Signed distance toward the kept side; non-negative values are kept
    pub fn signed(self, field: f64) -> f64 {
        match self {
            KeptSide::Above => field,
            KeptSide::Below => -field,
        }
    }

    pub fn flipped(self) -> KeptSide {
        match self {
            KeptSide::Above => KeptSide::Below,
            KeptSide::Below => KeptSide::Above,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_axes() {
        assert_eq!(Axis::X.independent(), [1, 2]);
        assert_eq!(Axis::Y.independent(), [0, 2]);
        assert_eq!(Axis::Z.independent(), [0, 1]);
    }

    #[test]
    fn test_projection() {
        let p = Point3D::new(1.0, 2.0, 3.0);
        assert_eq!(Axis::Z.project(&p), (1.0, 2.0));
        assert_eq!(Axis::X.project(&p), (2.0, 3.0));
        assert_eq!(Axis::Y.dependent(&p), 2.0);
    }

    #[test]
    fn test_kept_side_sign() {
        assert!(KeptSide::Above.signed(1.5) > 0.0);
        assert!(KeptSide::Below.signed(1.5) < 0.0);
        assert_eq!(KeptSide::Above.flipped(), KeptSide::Below);
    }
}
