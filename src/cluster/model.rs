use ndarray::Array2;

use crate::cluster::dataset::{self, Point};
use crate::cluster::metric::{DistanceMetric, Haversine};
use crate::error::Result;

/// Non-fatal findings attached to a fitted [`ClusterState`].
///
/// The result is still usable when diagnostics are present; they flag that
/// it is diagnosably imperfect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The winning run realized fewer than the requested number of clusters.
    DegenerateClusters { realized: usize, requested: usize },
    /// Iteration stopped at `max_iter` without converging.
    MaxIterReached { max_iter: usize },
}

/// The immutable result of a fit: centers, labels, objective value and any
/// non-fatal diagnostics.
///
/// Distance and label queries against the fitted centers go through
/// [`ClusterState::transform`] and [`ClusterState::predict`]; the state never
/// changes after `fit` returns.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterState {
    centers: Vec<Point>,
    centers_rad: Array2<f64>,
    labels: Vec<usize>,
    inertia: f64,
    weight_in_clusters: Vec<f64>,
    n_iter: usize,
    strict_convergence: bool,
    diagnostics: Vec<Diagnostic>,
}

impl ClusterState {
    pub(crate) fn new(
        centers_rad: Array2<f64>,
        labels: Vec<usize>,
        inertia: f64,
        weight_in_clusters: Vec<f64>,
        n_iter: usize,
        strict_convergence: bool,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let centers = centers_rad
            .outer_iter()
            .map(|row| Point::new(row[0].to_degrees(), row[1].to_degrees()))
            .collect();
        Self {
            centers,
            centers_rad,
            labels,
            inertia,
            weight_in_clusters,
            n_iter,
            strict_convergence,
            diagnostics,
        }
    }

    /// Cluster centers as `(lon, lat)` degree points.
    pub fn centers(&self) -> &[Point] {
        &self.centers
    }

    /// Centers in radians, one `(lon, lat)` row per cluster.
    pub(crate) fn centers_rad(&self) -> &Array2<f64> {
        &self.centers_rad
    }

    /// Cluster assignment for each training point, in `[0, k)`.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Consumes the state, returning only the labels.
    pub fn into_labels(self) -> Vec<usize> {
        self.labels
    }

    /// The clustering objective: weighted sum of angular great-circle
    /// distances from each point to its assigned center.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Total sample weight assigned to each cluster.
    pub fn weight_in_clusters(&self) -> &[f64] {
        &self.weight_in_clusters
    }

    /// Iterations run by the winning restart.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Whether the winning restart stopped because the labels stopped
    /// changing (as opposed to the center-shift tolerance or `max_iter`).
    pub fn strict_convergence(&self) -> bool {
        self.strict_convergence
    }

    /// Non-fatal diagnostics raised during the fit.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Great-circle distances from every query point to every fitted center,
    /// as an n×k matrix.
    ///
    /// Distances are angular (radians) unless `radius` is given, in which
    /// case they are scaled by it at this boundary; the solver itself never
    /// sees a radius. Pass e.g. `Some(6_371.0)` for kilometers on Earth.
    pub fn transform(&self, points: &[Point], radius: Option<f64>) -> Result<Array2<f64>> {
        dataset::validate_points(points)?;
        let coords = dataset::to_radian_matrix(points);
        let mut distances = Haversine.pairwise(coords.view(), self.centers_rad.view());
        if let Some(radius) = radius {
            distances.mapv_inplace(|d| d * radius);
        }
        Ok(distances)
    }

    /// Nearest fitted center for every query point.
    pub fn predict(&self, points: &[Point]) -> Result<Vec<usize>> {
        let distances = self.transform(points, None)?;
        Ok(distances
            .outer_iter()
            .map(|row| {
                let mut best = 0;
                for (c, &d) in row.iter().enumerate() {
                    if d < row[best] {
                        best = c;
                    }
                }
                best
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::solver::GeoKMeans;
    use approx::assert_relative_eq;

    fn fitted_state() -> (Vec<Point>, ClusterState) {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(0.2, 0.1),
            Point::new(40.0, 20.0),
            Point::new(40.1, 20.2),
        ];
        let state = GeoKMeans::new(2).with_seed(1).fit(&points, None).unwrap();
        (points, state)
    }

    #[test]
    fn test_predict_reproduces_training_labels() {
        let (points, state) = fitted_state();
        let predicted = state.predict(&points).unwrap();
        assert_eq!(predicted, state.labels());
    }

    #[test]
    fn test_transform_shape_and_argmin() {
        let (points, state) = fitted_state();
        let distances = state.transform(&points, None).unwrap();
        assert_eq!(distances.shape(), &[4, 2]);
        for (p, &label) in state.labels().iter().enumerate() {
            let other = 1 - label;
            assert!(distances[[p, label]] <= distances[[p, other]]);
        }
    }

    #[test]
    fn test_transform_radius_scaling_only_at_boundary() {
        let (points, state) = fitted_state();
        let angular = state.transform(&points, None).unwrap();
        let km = state.transform(&points, Some(6_371.0)).unwrap();
        for (a, k) in angular.iter().zip(km.iter()) {
            assert_relative_eq!(*k, a * 6_371.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_predict_rejects_invalid_coordinates() {
        let (_, state) = fitted_state();
        assert!(state.predict(&[Point::new(200.0, 0.0)]).is_err());
        assert!(state.predict(&[]).is_err());
    }

    #[test]
    fn test_centers_are_degree_points() {
        let (_, state) = fitted_state();
        for (c, center) in state.centers().iter().enumerate() {
            assert_relative_eq!(
                center.lon.to_radians(),
                state.centers_rad()[[c, 0]],
                epsilon = 1e-15
            );
            assert_relative_eq!(
                center.lat.to_radians(),
                state.centers_rad()[[c, 1]],
                epsilon = 1e-15
            );
        }
    }
}
