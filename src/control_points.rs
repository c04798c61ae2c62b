// Control points defining the deformable clipping surface.
//
// The store owns the points for the keyframe being edited. It never triggers
// recomputation; the UI batches edits and requests a re-solve explicitly, so
// dragging a point through many intermediate positions stays cheap.

use crate::geometry::{Axis, Point3D};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tolerance for the collinearity test, relative to the squared extent of
/// the projected point cloud.
const COLLINEAR_REL_TOL: f64 = 1e-12;

/// Stable identifier for a control point.
///
/// Identifiers are never reused within a store, so the UI can move or delete
/// points without losing correspondence across keyframes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ControlPointId(pub u64);

/// A single surface control point in volume physical coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub id: ControlPointId,

    pub position: Point3D,

    /// Influence/smoothing trade-off. Heavier points are tracked more
    /// closely by the regularized solve; the animation interpolator also
    /// fades points in and out through this weight. Default 1.0.
    pub weight: f64,
}

/// An ordered sequence of control points for one time-index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlPointSet {
    pub points: Vec<ControlPoint>,
}

impl ControlPointSet {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, id: ControlPointId) -> Option<&ControlPoint> {
        self.points.iter().find(|cp| cp.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ControlPoint> {
        self.points.iter()
    }

    /// Whether a TPS surface can be solved from this set: at least 3 points
    /// whose projections onto the independent plane are non-collinear.
    ///
    /// Fewer points means the surface is undefined, which is a valid state
    /// rather than an error.
    pub fn is_solvable(&self, axis: Axis) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        let sites: Vec<(f64, f64)> = self
            .points
            .iter()
            .map(|cp| axis.project(&cp.position))
            .collect();

        // Squared extent of the projected cloud scales the tolerance.
        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(u, v) in &sites {
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
        let extent_sq = (max_u - min_u).powi(2) + (max_v - min_v).powi(2);
        if extent_sq <= 0.0 || !extent_sq.is_finite() {
            return false;
        }
        let tol = COLLINEAR_REL_TOL * extent_sq;

        // Find a second point distinct from the first, then any third point
        // off the line through them.
        let (u0, v0) = sites[0];
        let mut base: Option<(f64, f64)> = None;
        for &(u, v) in &sites[1..] {
            let (du, dv) = (u - u0, v - v0);
            match base {
                None => {
                    if du * du + dv * dv > tol {
                        base = Some((du, dv));
                    }
                }
                Some((bu, bv)) => {
                    let cross = bu * dv - bv * du;
                    if cross.abs() > tol {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// Owns and edits the control points of the active keyframe.
///
/// All operations are O(1) amortized except `list_points`. The version
/// counter increments on every mutation so downstream consumers (solver,
/// mask generator) can detect staleness by comparison instead of relying on
/// recomputation order.
#[derive(Debug, Clone, Default)]
pub struct ControlPointStore {
    points: Vec<ControlPoint>,
    index_of: HashMap<ControlPointId, usize>,
    next_id: u64,
    version: u64,
}

impl ControlPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a persisted or interpolated set, preserving the
    /// original identifiers.
    pub fn from_set(set: &ControlPointSet) -> Self {
        let mut store = Self::new();
        for cp in &set.points {
            store.index_of.insert(cp.id, store.points.len());
            store.points.push(*cp);
            store.next_id = store.next_id.max(cp.id.0 + 1);
        }
        store.version = 1;
        store
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Monotonic edit counter, bumped on every mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Add a point and return its stable identifier. `weight` defaults to 1.0.
    pub fn add_point(&mut self, position: Point3D, weight: Option<f64>) -> ControlPointId {
        let id = ControlPointId(self.next_id);
        self.next_id += 1;
        self.index_of.insert(id, self.points.len());
        self.points.push(ControlPoint {
            id,
            position,
            weight: weight.unwrap_or(1.0),
        });
        self.version += 1;
        log::debug!("Added control point {:?} at {:?}", id, position);
        id
    }

    /// Move an existing point to a new position
    pub fn move_point(&mut self, id: ControlPointId, position: Point3D) -> Result<()> {
        let i = self.index(id)?;
        self.points[i].position = position;
        self.version += 1;
        Ok(())
    }

    /// Change the weight of an existing point
    pub fn set_weight(&mut self, id: ControlPointId, weight: f64) -> Result<()> {
        let i = self.index(id)?;
        self.points[i].weight = weight;
        self.version += 1;
        Ok(())
    }

    /// Remove a point. Swap-removes internally, so iteration order changes
    /// at the removal site but stays deterministic between edits.
    pub fn remove_point(&mut self, id: ControlPointId) -> Result<ControlPoint> {
        let i = self.index(id)?;
        let removed = self.points.swap_remove(i);
        self.index_of.remove(&id);
        if let Some(moved) = self.points.get(i) {
            self.index_of.insert(moved.id, i);
        }
        self.version += 1;
        log::debug!("Removed control point {:?}", id);
        Ok(removed)
    }

    /// Snapshot the current points as an owned set
    pub fn list_points(&self) -> ControlPointSet {
        ControlPointSet {
            points: self.points.clone(),
        }
    }

    pub fn get(&self, id: ControlPointId) -> Option<&ControlPoint> {
        self.index_of.get(&id).map(|&i| &self.points[i])
    }

    fn index(&self, id: ControlPointId) -> Result<usize> {
        self.index_of
            .get(&id)
            .copied()
            .ok_or(Error::InvalidReference {
                kind: "control point",
                id: id.0,
            })
    }
}
