//! The Elkan iteration core: triangle-inequality bounds, the pruned
//! assignment pass and the fused center update.
//!
//! The triangle inequality gives `d(p, c) >= |d(p, c') - d(c, c')|`, so a
//! point whose upper bound on the distance to its assigned center is below
//! half the distance to the nearest other center cannot move, and most
//! per-iteration distance computations can be skipped without changing the
//! result. Pruning is exact, never approximate.

use ndarray::Array2;

use crate::cluster::dataset::Dataset;
use crate::cluster::metric::DistanceMetric;

/// Per-point distance bounds carried across iterations of one restart.
///
/// Invariants: `lower[[p, c]] <= d(p, centers[c])` always, and
/// `upper[p] >= d(p, centers[labels[p]])` always (the upper bound may be a
/// stale overestimate between tightening events).
#[derive(Debug)]
pub(crate) struct ElkanBounds {
    /// `upper[p]`: upper bound on the distance from p to its assigned center.
    pub(crate) upper: Vec<f64>,
    /// `lower[[p, c]]`: lower bound on the distance from p to center c.
    pub(crate) lower: Array2<f64>,
}

impl ElkanBounds {
    pub(crate) fn new(n: usize, k: usize) -> Self {
        Self {
            upper: vec![f64::INFINITY; n],
            lower: Array2::zeros((n, k)),
        }
    }

    /// First-iteration full scan: exact distance from every point to every
    /// center, exact bounds, initial labels.
    pub(crate) fn init_full_scan<M: DistanceMetric>(
        &mut self,
        dataset: &Dataset,
        metric: &M,
        centers: &Array2<f64>,
        labels: &mut [usize],
    ) {
        let coords = &dataset.coords_rad;
        let k = centers.nrows();
        for p in 0..dataset.len() {
            let mut best = f64::INFINITY;
            let mut best_c = 0;
            for c in 0..k {
                let d = metric.distance(coords.row(p), centers.row(c));
                self.lower[[p, c]] = d;
                if d < best {
                    best = d;
                    best_c = c;
                }
            }
            labels[p] = best_c;
            self.upper[p] = best;
        }
    }

    /// Revalidates the bounds after the centers moved by `center_shift`:
    /// the upper bound inflates by the shift of the assigned center, every
    /// lower bound deflates by the shift of its center (floored at zero).
    pub(crate) fn update_after_shift(&mut self, center_shift: &[f64], labels: &[usize]) {
        for (p, &label) in labels.iter().enumerate() {
            self.upper[p] += center_shift[label];
            for (c, &shift) in center_shift.iter().enumerate() {
                self.lower[[p, c]] = (self.lower[[p, c]] - shift).max(0.0);
            }
        }
    }
}

/// Half the pairwise distance between centers, recomputed every iteration.
pub(crate) fn center_half_distances<M: DistanceMetric>(
    metric: &M,
    centers: &Array2<f64>,
) -> Array2<f64> {
    let k = centers.nrows();
    let mut half = Array2::zeros((k, k));
    for c1 in 0..k {
        for c2 in (c1 + 1)..k {
            let d = metric.distance(centers.row(c1), centers.row(c2)) / 2.0;
            half[[c1, c2]] = d;
            half[[c2, c1]] = d;
        }
    }
    half
}

/// `distance_next_center[c]`: half the distance from center c to its nearest
/// other center, the per-center pruning threshold.
pub(crate) fn distance_next_center(half_distances: &Array2<f64>) -> Vec<f64> {
    let k = half_distances.nrows();
    (0..k)
        .map(|c| {
            (0..k)
                .filter(|&other| other != c)
                .map(|other| half_distances[[c, other]])
                .fold(f64::INFINITY, f64::min)
        })
        .collect()
}

/// One Elkan assignment pass over all points.
///
/// For each point with current label `l`: if `upper[p]` is at most
/// `distance_next_center[l]` the point cannot move and is skipped outright.
/// Otherwise the upper bound is lazily tightened to the true distance and
/// every center still surviving the `lower` / `center_half_distances` screens
/// gets an exact distance evaluation, refreshing the lower bound and the
/// running best.
///
/// When `update_centers` is set, each point's weighted coordinates fold into
/// `centers_new` / `weight_in_clusters` under its (possibly new) label in the
/// same pass, and a cluster left with zero weight keeps its previous center
/// rather than producing NaN.
#[allow(clippy::too_many_arguments)]
pub(crate) fn elkan_pass<M: DistanceMetric>(
    dataset: &Dataset,
    metric: &M,
    centers: &Array2<f64>,
    half_distances: &Array2<f64>,
    next_center: &[f64],
    bounds: &mut ElkanBounds,
    labels: &mut [usize],
    centers_new: &mut Array2<f64>,
    weight_in_clusters: &mut [f64],
    update_centers: bool,
) {
    let coords = &dataset.coords_rad;
    let k = centers.nrows();

    if update_centers {
        centers_new.fill(0.0);
        weight_in_clusters.iter_mut().for_each(|w| *w = 0.0);
    }

    for p in 0..dataset.len() {
        let mut label = labels[p];
        let mut upper = bounds.upper[p];

        if upper > next_center[label] {
            let mut tightened = false;
            for c in 0..k {
                if c == label
                    || upper <= bounds.lower[[p, c]]
                    || upper <= half_distances[[label, c]]
                {
                    continue;
                }
                if !tightened {
                    upper = metric.distance(coords.row(p), centers.row(label));
                    bounds.lower[[p, label]] = upper;
                    tightened = true;
                    // Re-screen against the tightened bound before paying for
                    // the candidate distance.
                    if upper <= bounds.lower[[p, c]] || upper <= half_distances[[label, c]] {
                        continue;
                    }
                }
                let d = metric.distance(coords.row(p), centers.row(c));
                bounds.lower[[p, c]] = d;
                if d < upper {
                    upper = d;
                    label = c;
                }
            }
            labels[p] = label;
            bounds.upper[p] = upper;
        }

        if update_centers {
            let w = dataset.weights[p];
            centers_new[[label, 0]] += coords[[p, 0]] * w;
            centers_new[[label, 1]] += coords[[p, 1]] * w;
            weight_in_clusters[label] += w;
        }
    }

    if update_centers {
        for c in 0..k {
            if weight_in_clusters[c] > 0.0 {
                centers_new[[c, 0]] /= weight_in_clusters[c];
                centers_new[[c, 1]] /= weight_in_clusters[c];
            } else {
                // Empty cluster: stay where it was.
                let prev = centers.row(c).to_owned();
                centers_new.row_mut(c).assign(&prev);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::dataset::{to_radian_matrix, Dataset, Point};
    use crate::cluster::metric::Haversine;
    use approx::assert_relative_eq;

    fn sample_points() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(0.2, 0.1),
            Point::new(10.0, 10.0),
            Point::new(10.3, 9.8),
            Point::new(-5.0, 40.0),
        ]
    }

    fn brute_force_labels(dataset: &Dataset, centers: &Array2<f64>) -> Vec<usize> {
        (0..dataset.len())
            .map(|p| {
                (0..centers.nrows())
                    .map(|c| {
                        (
                            c,
                            Haversine.distance(dataset.coords_rad.row(p), centers.row(c)),
                        )
                    })
                    .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
                    .unwrap()
                    .0
            })
            .collect()
    }

    #[test]
    fn test_full_scan_matches_brute_force() {
        let points = sample_points();
        let dataset = Dataset::new(&points, None);
        let centers = to_radian_matrix(&[Point::new(0.1, 0.0), Point::new(10.0, 10.0)]);

        let mut bounds = ElkanBounds::new(dataset.len(), 2);
        let mut labels = vec![0usize; dataset.len()];
        bounds.init_full_scan(&dataset, &Haversine, &centers, &mut labels);

        assert_eq!(labels, brute_force_labels(&dataset, &centers));
        for p in 0..dataset.len() {
            for c in 0..2 {
                let d = Haversine.distance(dataset.coords_rad.row(p), centers.row(c));
                assert_relative_eq!(bounds.lower[[p, c]], d, epsilon = 1e-15);
            }
            let d = Haversine.distance(dataset.coords_rad.row(p), centers.row(labels[p]));
            assert_relative_eq!(bounds.upper[p], d, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_pass_with_stationary_centers_keeps_labels() {
        let points = sample_points();
        let dataset = Dataset::new(&points, None);
        let centers = to_radian_matrix(&[Point::new(0.1, 0.0), Point::new(10.0, 10.0)]);

        let mut bounds = ElkanBounds::new(dataset.len(), 2);
        let mut labels = vec![0usize; dataset.len()];
        bounds.init_full_scan(&dataset, &Haversine, &centers, &mut labels);
        let initial = labels.clone();

        let half = center_half_distances(&Haversine, &centers);
        let next = distance_next_center(&half);
        let mut centers_new = Array2::zeros((2, 2));
        let mut weights = vec![0.0; 2];
        elkan_pass(
            &dataset,
            &Haversine,
            &centers,
            &half,
            &next,
            &mut bounds,
            &mut labels,
            &mut centers_new,
            &mut weights,
            false,
        );
        assert_eq!(labels, initial);
    }

    #[test]
    fn test_pass_accumulates_weighted_means() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(100.0, 50.0),
        ];
        let weights = [1.0, 3.0, 1.0];
        let dataset = Dataset::new(&points, Some(&weights));
        let centers = to_radian_matrix(&[Point::new(1.0, 0.0), Point::new(100.0, 50.0)]);

        let mut bounds = ElkanBounds::new(3, 2);
        let mut labels = vec![0usize; 3];
        bounds.init_full_scan(&dataset, &Haversine, &centers, &mut labels);

        let half = center_half_distances(&Haversine, &centers);
        let next = distance_next_center(&half);
        let mut centers_new = Array2::zeros((2, 2));
        let mut weight_in_clusters = vec![0.0; 2];
        elkan_pass(
            &dataset,
            &Haversine,
            &centers,
            &half,
            &next,
            &mut bounds,
            &mut labels,
            &mut centers_new,
            &mut weight_in_clusters,
            true,
        );

        assert_eq!(weight_in_clusters, vec![4.0, 1.0]);
        // Weighted mean of lon 0 (w=1) and lon 2 (w=3) is lon 1.5.
        assert_relative_eq!(
            centers_new[[0, 0]],
            1.5f64.to_radians(),
            epsilon = 1e-12
        );
        assert_relative_eq!(centers_new[[0, 1]], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_empty_cluster_keeps_previous_center() {
        let points = vec![Point::new(0.0, 0.0), Point::new(0.1, 0.1)];
        let dataset = Dataset::new(&points, None);
        // Second center is far from every point and attracts nothing.
        let centers = to_radian_matrix(&[Point::new(0.0, 0.0), Point::new(170.0, -80.0)]);

        let mut bounds = ElkanBounds::new(2, 2);
        let mut labels = vec![0usize; 2];
        bounds.init_full_scan(&dataset, &Haversine, &centers, &mut labels);

        let half = center_half_distances(&Haversine, &centers);
        let next = distance_next_center(&half);
        let mut centers_new = Array2::zeros((2, 2));
        let mut weight_in_clusters = vec![0.0; 2];
        elkan_pass(
            &dataset,
            &Haversine,
            &centers,
            &half,
            &next,
            &mut bounds,
            &mut labels,
            &mut centers_new,
            &mut weight_in_clusters,
            true,
        );

        assert_eq!(weight_in_clusters[1], 0.0);
        assert_eq!(centers_new.row(1), centers.row(1));
        assert!(centers_new.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_bounds_stay_valid_after_shift() {
        let points = sample_points();
        let dataset = Dataset::new(&points, None);
        let centers = to_radian_matrix(&[Point::new(0.1, 0.0), Point::new(10.0, 10.0)]);
        let moved = to_radian_matrix(&[Point::new(0.3, 0.2), Point::new(9.8, 10.1)]);

        let mut bounds = ElkanBounds::new(dataset.len(), 2);
        let mut labels = vec![0usize; dataset.len()];
        bounds.init_full_scan(&dataset, &Haversine, &centers, &mut labels);

        let shift: Vec<f64> = (0..2)
            .map(|c| Haversine.distance(centers.row(c), moved.row(c)))
            .collect();
        bounds.update_after_shift(&shift, &labels);

        for p in 0..dataset.len() {
            let d_assigned = Haversine.distance(dataset.coords_rad.row(p), moved.row(labels[p]));
            assert!(bounds.upper[p] >= d_assigned - 1e-12);
            for c in 0..2 {
                let d = Haversine.distance(dataset.coords_rad.row(p), moved.row(c));
                assert!(bounds.lower[[p, c]] <= d + 1e-12);
                assert!(bounds.lower[[p, c]] >= 0.0);
            }
        }
    }

    #[test]
    fn test_distance_next_center_single_cluster_is_infinite() {
        let half = Array2::zeros((1, 1));
        let next = distance_next_center(&half);
        assert_eq!(next, vec![f64::INFINITY]);
    }
}
