use ndarray::Array2;
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::cluster::dataset::Dataset;
use crate::cluster::metric::DistanceMetric;

/// Geodesic k-means++ seeding.
///
/// Picks the first center uniformly at random, then draws each subsequent
/// center from a handful of candidates sampled with probability proportional
/// to their distance from the nearest already-chosen center, committing the
/// candidate that minimizes the resulting potential. Deterministic given a
/// seeded RNG.
///
/// Returns the k×2 center matrix (radians) and the source indices of the
/// chosen points.
pub(crate) fn kmeans_plus_plus<M: DistanceMetric>(
    dataset: &Dataset,
    k: usize,
    metric: &M,
    rng: &mut ChaCha20Rng,
) -> (Array2<f64>, Vec<usize>) {
    let n = dataset.len();
    let coords = &dataset.coords_rad;
    let mut centers = Array2::zeros((k, 2));
    let mut indices = Vec::with_capacity(k);

    let first = rng.gen_range(0..n);
    centers.row_mut(0).assign(&coords.row(first));
    indices.push(first);

    // closest_dist[p]: geodesic distance from p to its nearest chosen center.
    let mut closest_dist: Vec<f64> = (0..n)
        .map(|p| metric.distance(coords.row(p), coords.row(first)))
        .collect();
    let mut current_potential: f64 = closest_dist.iter().sum();

    let n_local_trials = 2 + (k as f64).ln().floor() as usize;

    for c in 1..k {
        let mut best_index = sample_proportional(&closest_dist, current_potential, rng);
        let mut best_row = distance_row(dataset, metric, best_index);
        let mut best_potential = trial_potential(&best_row, &closest_dist);

        for _ in 1..n_local_trials {
            let candidate = sample_proportional(&closest_dist, current_potential, rng);
            let row = distance_row(dataset, metric, candidate);
            let potential = trial_potential(&row, &closest_dist);
            if potential < best_potential {
                best_index = candidate;
                best_row = row;
                best_potential = potential;
            }
        }

        centers.row_mut(c).assign(&coords.row(best_index));
        indices.push(best_index);
        for (cd, &d) in closest_dist.iter_mut().zip(&best_row) {
            if d < *cd {
                *cd = d;
            }
        }
        current_potential = best_potential;
    }

    (centers, indices)
}

/// Distance from every dataset point to the point at `index`.
fn distance_row<M: DistanceMetric>(dataset: &Dataset, metric: &M, index: usize) -> Vec<f64> {
    let coords = &dataset.coords_rad;
    (0..dataset.len())
        .map(|p| metric.distance(coords.row(p), coords.row(index)))
        .collect()
}

/// Potential after hypothetically committing a candidate with distance row `row`.
fn trial_potential(row: &[f64], closest_dist: &[f64]) -> f64 {
    row.iter()
        .zip(closest_dist)
        .map(|(&d, &cd)| d.min(cd))
        .sum()
}

/// Samples an index with probability proportional to `weights`.
///
/// Zero-weight entries (points already coincident with a chosen center) are
/// never selected. Falls back to a uniform draw when the total mass is zero,
/// which happens when every point coincides with a chosen center.
fn sample_proportional(weights: &[f64], total: f64, rng: &mut ChaCha20Rng) -> usize {
    if total <= 0.0 {
        return rng.gen_range(0..weights.len());
    }
    let threshold = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        last_positive = i;
        if cumulative >= threshold {
            return i;
        }
    }
    // Rounding can leave the cumulative sum a hair under the threshold.
    last_positive
}
