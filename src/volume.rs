// Volume grid metadata supplied by the external loader.
//
// The engine never owns or mutates voxel buffers; masks are computed from
// the sampling grid alone, so this descriptor is all the mask generator
// needs. Header parsing lives outside the core.

use crate::geometry::{Point3D, Vector3D};
use serde::{Deserialize, Serialize};

/// Voxel sample bit depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    U8,
    U16,
}

impl BitDepth {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            BitDepth::U8 => 1,
            BitDepth::U16 => 2,
        }
    }
}

/// Descriptor of one multi-channel, time-resolved volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMeta {
    pub channels: usize,

    /// Voxel counts along X, Y, Z
    pub dims: [usize; 3],

    /// Physical size of one voxel along each axis (anisotropic)
    pub spacing: Vector3D,

    /// Physical-space position of voxel (0, 0, 0)
    pub origin: Point3D,

    pub bit_depth: BitDepth,

    /// Number of discrete time indices in the series
    pub time_index_count: usize,
}

impl VolumeMeta {
    /// Spatial voxel count of a single channel at a single time index
    pub fn voxel_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Physical-space position of the voxel at grid index (i, j, k)
    pub fn position_of(&self, i: usize, j: usize, k: usize) -> Point3D {
        Point3D::new(
            self.origin.x + self.spacing.x * i as f64,
            self.origin.y + self.spacing.y * j as f64,
            self.origin.z + self.spacing.z * k as f64,
        )
    }

    /// Physical-space bounds of the sampling grid
    pub fn bounds(&self) -> (Point3D, Point3D) {
        let upper = Point3D::new(
            self.origin.x + self.spacing.x * self.dims[0] as f64,
            self.origin.y + self.spacing.y * self.dims[1] as f64,
            self.origin.z + self.spacing.z * self.dims[2] as f64,
        );
        (self.origin, upper)
    }

    /// Resolve a fractional time position to the nearest discrete index
    pub fn clamp_time_index(&self, t: f64) -> usize {
        if self.time_index_count == 0 {
            return 0;
        }
        let max = (self.time_index_count - 1) as f64;
        t.clamp(0.0, max).round() as usize
    }
}
