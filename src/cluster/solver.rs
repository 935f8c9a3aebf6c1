use std::collections::HashMap;

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

use crate::cluster::dataset::{self, Dataset, Point};
use crate::cluster::elkan::{center_half_distances, distance_next_center, elkan_pass, ElkanBounds};
use crate::cluster::init::kmeans_plus_plus;
use crate::cluster::metric::{DistanceMetric, Haversine};
use crate::cluster::model::{ClusterState, Diagnostic};
use crate::error::{Error, Result};

/// Center seeding strategy.
#[derive(Debug, Clone)]
pub enum InitMethod {
    /// Geodesic k-means++ seeding (the default).
    KMeansPlusPlus,
    /// Explicit initial centers; forces a single restart.
    Centers(Vec<Point>),
}

/// Geodesic K-Means with Elkan triangle-inequality acceleration.
///
/// Partitions `(lon, lat)` points into `k` clusters minimizing the weighted
/// sum of great-circle distances to the assigned centers. All internal
/// arithmetic is angular (radians); see [`ClusterState::transform`] for
/// radius scaling at the reporting boundary.
///
/// # Example
///
/// ```
/// use geokmeans::{GeoKMeans, Point};
///
/// let points = vec![
///     Point::new(0.0, 0.0),
///     Point::new(0.1, 0.1),
///     Point::new(30.0, 30.0),
///     Point::new(30.1, 30.1),
/// ];
/// let state = GeoKMeans::new(2).with_seed(42).fit(&points, None).unwrap();
/// assert_eq!(state.labels()[0], state.labels()[1]);
/// assert_ne!(state.labels()[0], state.labels()[2]);
/// ```
#[derive(Debug, Clone)]
pub struct GeoKMeans {
    k: usize,
    n_init: usize,
    max_iter: usize,
    tol: f64,
    seed: Option<u64>,
    init: InitMethod,
}

/// Outcome of one independent restart.
struct RunResult {
    centers_rad: Array2<f64>,
    labels: Vec<usize>,
    inertia: f64,
    n_iter: usize,
    strict_convergence: bool,
    converged: bool,
}

impl GeoKMeans {
    /// Creates a solver for `k` clusters with default settings:
    /// 10 restarts, 300 iterations, tolerance `1e-6`, entropy-seeded RNG.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            n_init: 10,
            max_iter: 300,
            tol: 1e-6,
            seed: None,
            init: InitMethod::KMeansPlusPlus,
        }
    }

    /// Sets the number of independent restarts.
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Sets the maximum number of iterations per restart.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the convergence tolerance on the summed squared center shift
    /// (angular radians squared).
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Sets the master RNG seed for reproducible fits.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the center seeding strategy.
    pub fn with_init(mut self, init: InitMethod) -> Self {
        self.init = init;
        self
    }

    /// Fits the model and returns the best clustering across restarts.
    ///
    /// Fails with [`Error`] only on invalid input; convergence problems are
    /// reported as non-fatal [`Diagnostic`] values on the returned state.
    pub fn fit(&self, points: &[Point], weights: Option<&[f64]>) -> Result<ClusterState> {
        dataset::validate(points, weights, self.k)?;
        if let InitMethod::Centers(centers) = &self.init {
            if centers.len() != self.k {
                return Err(Error::invalid_input(format!(
                    "expected {} initial centers, got {}",
                    self.k,
                    centers.len()
                )));
            }
            dataset::validate_points(centers)?;
        }

        let dataset = Dataset::new(points, weights);
        let metric = Haversine;

        // Explicit centers make every restart identical, so run once.
        let n_runs = match self.init {
            InitMethod::Centers(_) => 1,
            InitMethod::KMeansPlusPlus => self.n_init.max(1),
        };
        let mut master = match self.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        let run_seeds: Vec<u64> = (0..n_runs).map(|_| master.gen()).collect();

        // Restarts are independent and share only the read-only dataset;
        // results are folded in run order so the winner does not depend on
        // thread scheduling.
        let runs: Vec<RunResult> = run_seeds
            .par_iter()
            .map(|&seed| self.solve_single(&dataset, &metric, seed))
            .collect();

        let mut runs = runs.into_iter();
        let mut best = runs
            .next()
            .ok_or_else(|| Error::invalid_input("n_init must be at least 1"))?;
        for run in runs {
            // A lower inertia on the same partition is floating-point noise,
            // not an improvement; require a genuinely different partition.
            if run.inertia < best.inertia && !same_partition(&run.labels, &best.labels) {
                best = run;
            }
        }

        let mut diagnostics = Vec::new();
        let realized = distinct_label_count(&best.labels);
        if realized < self.k {
            log::warn!(
                "clustering realized {} distinct clusters out of {} requested",
                realized,
                self.k
            );
            diagnostics.push(Diagnostic::DegenerateClusters {
                realized,
                requested: self.k,
            });
        }
        if !best.converged {
            log::warn!(
                "clustering stopped at max_iter = {} without converging",
                self.max_iter
            );
            diagnostics.push(Diagnostic::MaxIterReached {
                max_iter: self.max_iter,
            });
        }

        let mut weight_in_clusters = vec![0.0; self.k];
        for (p, &label) in best.labels.iter().enumerate() {
            weight_in_clusters[label] += dataset.weights[p];
        }

        Ok(ClusterState::new(
            best.centers_rad,
            best.labels,
            best.inertia,
            weight_in_clusters,
            best.n_iter,
            best.strict_convergence,
            diagnostics,
        ))
    }

    /// Fits the model and returns only the labels.
    pub fn fit_predict(&self, points: &[Point], weights: Option<&[f64]>) -> Result<Vec<usize>> {
        self.fit(points, weights).map(ClusterState::into_labels)
    }

    /// One independent restart: seed centers, iterate the Elkan pass until
    /// convergence, re-assign once against the final centers if the labels
    /// are not already known to be consistent with them.
    fn solve_single<M: DistanceMetric>(
        &self,
        dataset: &Dataset,
        metric: &M,
        seed: u64,
    ) -> RunResult {
        let n = dataset.len();
        let k = self.k;
        let mut rng = ChaCha20Rng::seed_from_u64(seed);

        let mut centers = match &self.init {
            InitMethod::KMeansPlusPlus => kmeans_plus_plus(dataset, k, metric, &mut rng).0,
            InitMethod::Centers(points) => dataset::to_radian_matrix(points),
        };
        let mut centers_new = Array2::zeros((k, 2));
        let mut weight_in_clusters = vec![0.0; k];

        let mut labels = vec![0usize; n];
        // Sentinel so the first iteration never registers as strict convergence.
        let mut labels_old = vec![usize::MAX; n];
        let mut bounds = ElkanBounds::new(n, k);
        bounds.init_full_scan(dataset, metric, &centers, &mut labels);

        let mut strict_convergence = false;
        let mut converged = false;
        let mut n_iter = 0;

        for iteration in 0..self.max_iter {
            let half_distances = center_half_distances(metric, &centers);
            let next_center = distance_next_center(&half_distances);
            elkan_pass(
                dataset,
                metric,
                &centers,
                &half_distances,
                &next_center,
                &mut bounds,
                &mut labels,
                &mut centers_new,
                &mut weight_in_clusters,
                true,
            );

            let center_shift: Vec<f64> = (0..k)
                .map(|c| metric.distance(centers.row(c), centers_new.row(c)))
                .collect();
            bounds.update_after_shift(&center_shift, &labels);
            std::mem::swap(&mut centers, &mut centers_new);
            n_iter = iteration + 1;

            if labels == labels_old {
                // Identical labels imply an identical partition, hence zero
                // center shift: the labels already match the final centers.
                strict_convergence = true;
                converged = true;
                break;
            }
            let shift_total: f64 = center_shift.iter().map(|s| s * s).sum();
            if shift_total <= self.tol {
                converged = true;
                break;
            }
            labels_old.copy_from_slice(&labels);
        }

        if !strict_convergence {
            // The centers moved after the last assignment; one non-mutating
            // pass makes the returned labels consistent with them.
            let half_distances = center_half_distances(metric, &centers);
            let next_center = distance_next_center(&half_distances);
            elkan_pass(
                dataset,
                metric,
                &centers,
                &half_distances,
                &next_center,
                &mut bounds,
                &mut labels,
                &mut centers_new,
                &mut weight_in_clusters,
                false,
            );
        }

        let inertia = inertia(dataset, metric, &centers, &labels);

        RunResult {
            centers_rad: centers,
            labels,
            inertia,
            n_iter,
            strict_convergence,
            converged,
        }
    }
}

/// Weighted sum of distances from every point to its assigned center.
pub(crate) fn inertia<M: DistanceMetric>(
    dataset: &Dataset,
    metric: &M,
    centers: &Array2<f64>,
    labels: &[usize],
) -> f64 {
    labels
        .iter()
        .enumerate()
        .map(|(p, &label)| {
            dataset.weights[p] * metric.distance(dataset.coords_rad.row(p), centers.row(label))
        })
        .sum()
}

/// Relabels a partition so the first label seen becomes 0, the next unseen
/// label 1, and so on, making partitions comparable up to permutation of
/// cluster ids.
fn normalized_partition(labels: &[usize]) -> Vec<usize> {
    let mut mapping = HashMap::new();
    let mut next = 0usize;
    labels
        .iter()
        .map(|&label| {
            *mapping.entry(label).or_insert_with(|| {
                let id = next;
                next += 1;
                id
            })
        })
        .collect()
}

/// Whether two label vectors describe the same partition up to permutation.
fn same_partition(a: &[usize], b: &[usize]) -> bool {
    normalized_partition(a) == normalized_partition(b)
}

fn distinct_label_count(labels: &[usize]) -> usize {
    let mut seen: Vec<usize> = labels.to_vec();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}
