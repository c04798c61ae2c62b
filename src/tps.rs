// Thin-plate spline solve for the clipping surface.
//
// Height-field formulation: control points are projected onto the plane of
// the two independent axes and the spline predicts the dependent coordinate.
// Kernel U(r) = r^2 log(r) with U(0) = 0, augmented with the affine block
// [1, u, v], giving a symmetric (n+3)x(n+3) dense system
//
//   [ K + lambda*W  P ] [w]   [h]
//   [ P^T           0 ] [a] = [0]
//
// where the affine columns summing to zero is the natural boundary condition
// that makes the solution minimize bending energy among all interpolants.

use crate::control_points::ControlPointSet;
use crate::geometry::{Axis, Point3D};
use crate::{Error, Result};
use nalgebra::{DMatrix, DVector};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter assigning a generation number to each solved model.
static MODEL_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Relative residual above which a solve is reported as degenerate.
const RESIDUAL_REL_TOL: f64 = 1e-6;

/// Configuration for the TPS solve
#[derive(Debug, Clone)]
pub struct TpsConfig {
    /// Regularization strength lambda. At 0.0 the surface interpolates each
    /// control point exactly; larger values trade tracking for smoothness
    /// and keep near-duplicate points solvable. Each point's diagonal term
    /// is lambda divided by its weight, so heavier points are tracked more
    /// closely. Typical range 0.0 to 1.0.
    pub regularization: f64,
}

impl Default for TpsConfig {
    fn default() -> Self {
        Self {
            regularization: 0.0,
        }
    }
}

/// A solved thin-plate spline surface.
///
/// Immutable once solved; a new control-point set always produces a new
/// model. The coefficients are deterministic for a given set ordering and
/// never depend on solve history.
#[derive(Debug, Clone)]
pub struct TpsModel {
    axis: Axis,
    /// Projected control sites (u, v) in solve order
    sites: Vec<(f64, f64)>,
    /// One kernel weight per site
    kernel_weights: Vec<f64>,
    /// Affine coefficients [constant, u, v]
    affine: [f64; 3],
    generation: u64,
}

impl TpsModel {
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Unique generation number for staleness comparisons
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Surface height at a position on the independent plane
    pub fn height(&self, u: f64, v: f64) -> f64 {
        let mut h = self.affine[0] + self.affine[1] * u + self.affine[2] * v;
        for (w, &(su, sv)) in self.kernel_weights.iter().zip(&self.sites) {
            let d2 = (u - su).powi(2) + (v - sv).powi(2);
            h += w * kernel(d2);
        }
        h
    }

    /// Scalar field value at a physical-space point: the signed offset of
    /// the point's dependent coordinate from the surface height. Positive on
    /// the greater side of the surface.
    pub fn field(&self, p: &Point3D) -> f64 {
        let (u, v) = self.axis.project(p);
        self.axis.dependent(p) - self.height(u, v)
    }
}

/// Kernel phi(r) = r^2 log(r) expressed on the squared distance,
/// since r^2 log(r) = d2 log(d2) / 2. phi(0) = 0 by convention.
fn kernel(d2: f64) -> f64 {
    if d2 <= 0.0 {
        0.0
    } else {
        0.5 * d2 * d2.ln()
    }
}

/// Fit a TPS surface to the control points along the given dependent axis.
///
/// Fails with `UnderdeterminedSurface` when fewer than 3 non-collinear
/// points are supplied (an undefined surface, not a broken one) and with
/// `DegenerateSolve` when the system is singular within tolerance, which
/// near-duplicate points cause at zero regularization.
pub fn solve(set: &ControlPointSet, axis: Axis, config: &TpsConfig) -> Result<TpsModel> {
    let n = set.len();
    if !set.is_solvable(axis) {
        return Err(Error::UnderdeterminedSurface { points: n });
    }

    let sites: Vec<(f64, f64)> = set
        .iter()
        .map(|cp| axis.project(&cp.position))
        .collect();
    let heights: Vec<f64> = set.iter().map(|cp| axis.dependent(&cp.position)).collect();

    log::debug!("Fitting TPS surface to {} control points...", n);

    // Assemble the augmented system.
    let dim = n + 3;
    let mut a = DMatrix::<f64>::zeros(dim, dim);
    for i in 0..n {
        let (ui, vi) = sites[i];
        for j in 0..n {
            let (uj, vj) = sites[j];
            let d2 = (ui - uj).powi(2) + (vi - vj).powi(2);
            a[(i, j)] = kernel(d2);
        }
        // Weighted regularization on the diagonal: heavier points get a
        // smaller term and are tracked more closely.
        let weight = set.points[i].weight.max(f64::MIN_POSITIVE);
        a[(i, i)] += config.regularization / weight;

        a[(i, n)] = 1.0;
        a[(i, n + 1)] = ui;
        a[(i, n + 2)] = vi;
        a[(n, i)] = 1.0;
        a[(n + 1, i)] = ui;
        a[(n + 2, i)] = vi;
    }

    let mut y = DVector::<f64>::zeros(dim);
    for i in 0..n {
        y[i] = heights[i];
    }

    let lu = a.clone().lu();
    let solution = lu.solve(&y).ok_or(Error::DegenerateSolve { points: n })?;

    // LU reports exact singularity only; catch near-singular systems by
    // checking the residual against the right-hand side magnitude.
    let residual = (&a * &solution - &y).norm();
    if !residual.is_finite() || residual > RESIDUAL_REL_TOL * (1.0 + y.norm()) {
        log::warn!(
            "TPS solve is ill-conditioned for {} points (residual {:.3e})",
            n,
            residual
        );
        return Err(Error::DegenerateSolve { points: n });
    }

    let kernel_weights = solution.as_slice()[..n].to_vec();
    let affine = [solution[n], solution[n + 1], solution[n + 2]];
    let generation = MODEL_GENERATION.fetch_add(1, Ordering::Relaxed);
    log::debug!("TPS surface fit (generation {}).", generation);

    Ok(TpsModel {
        axis,
        sites,
        kernel_weights,
        affine,
        generation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_points::ControlPointStore;

    fn store_with(points: &[(f64, f64, f64)]) -> ControlPointStore {
        let mut store = ControlPointStore::new();
        for &(x, y, z) in points {
            store.add_point(Point3D::new(x, y, z), None);
        }
        store
    }

    #[test]
    fn test_underdetermined_with_two_points() {
        let store = store_with(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0)]);
        let err = solve(&store.list_points(), Axis::Z, &TpsConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnderdeterminedSurface { points: 2 }
        ));
    }

    #[test]
    fn test_planar_fit_interpolates_control_points() {
        // Three points with zero height define the z = 0 plane.
        let store = store_with(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0), (0.0, 10.0, 0.0)]);
        let model = solve(&store.list_points(), Axis::Z, &TpsConfig::default()).unwrap();

        assert!(model.height(0.0, 0.0).abs() < 1e-9);
        assert!(model.height(10.0, 0.0).abs() < 1e-9);
        assert!(model.height(3.0, 4.0).abs() < 1e-9);

        // Opposite sides of the plane have opposite field signs.
        assert!(model.field(&Point3D::new(1.0, 1.0, 1.0)) > 0.0);
        assert!(model.field(&Point3D::new(1.0, 1.0, -1.0)) < 0.0);
    }

    #[test]
    fn test_interpolation_property_nonplanar() {
        let points = [
            (0.0, 0.0, 1.0),
            (10.0, 0.0, -2.0),
            (0.0, 10.0, 4.0),
            (10.0, 10.0, 0.5),
            (5.0, 5.0, 3.0),
        ];
        let store = store_with(&points);
        let model = solve(&store.list_points(), Axis::Z, &TpsConfig::default()).unwrap();
        for &(x, y, z) in &points {
            let h = model.height(x, y);
            assert!(
                (h - z).abs() < 1e-6,
                "height({}, {}) = {} expected {}",
                x,
                y,
                h,
                z
            );
        }
    }

    #[test]
    fn test_solve_is_deterministic() {
        let points = [
            (0.0, 0.0, 1.0),
            (10.0, 0.0, -2.0),
            (0.0, 10.0, 4.0),
            (7.0, 3.0, 2.0),
        ];
        let a = solve(
            &store_with(&points).list_points(),
            Axis::Z,
            &TpsConfig::default(),
        )
        .unwrap();
        let b = solve(
            &store_with(&points).list_points(),
            Axis::Z,
            &TpsConfig::default(),
        )
        .unwrap();
        assert_eq!(a.kernel_weights, b.kernel_weights);
        assert_eq!(a.affine, b.affine);
        // Generations are unique even for identical inputs.
        assert_ne!(a.generation(), b.generation());
    }

    #[test]
    fn test_duplicate_points_are_degenerate_without_regularization() {
        let store = store_with(&[
            (0.0, 0.0, 0.0),
            (0.0, 0.0, 5.0), // same projection, conflicting height
            (10.0, 0.0, 0.0),
            (0.0, 10.0, 0.0),
        ]);
        let err = solve(&store.list_points(), Axis::Z, &TpsConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DegenerateSolve { .. }));

        // Regularization makes the same set solvable.
        let config = TpsConfig {
            regularization: 0.1,
        };
        assert!(solve(&store.list_points(), Axis::Z, &config).is_ok());
    }

    #[test]
    fn test_dependent_axis_other_than_z() {
        // Surface x = 2 as a height field over (y, z).
        let store = store_with(&[(2.0, 0.0, 0.0), (2.0, 10.0, 0.0), (2.0, 0.0, 10.0)]);
        let model = solve(&store.list_points(), Axis::X, &TpsConfig::default()).unwrap();
        assert!((model.height(5.0, 5.0) - 2.0).abs() < 1e-9);
        assert!(model.field(&Point3D::new(3.0, 5.0, 5.0)) > 0.0);
        assert!(model.field(&Point3D::new(1.0, 5.0, 5.0)) < 0.0);
    }
}
