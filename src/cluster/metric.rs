use ndarray::{Array2, ArrayView1, ArrayView2};

/// A distance function over coordinate rows.
///
/// The Elkan solver is generic over this trait; any metric satisfying the
/// triangle inequality keeps the bound-based pruning exact. Implementations
/// receive rows of whatever coordinate space the caller prepared
/// ([`Haversine`] expects `(lon, lat)` pairs already converted to radians).
pub trait DistanceMetric: Sync {
    /// Distance between two coordinate rows.
    fn distance(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64;

    /// Full pairwise distance matrix between the rows of `a` and the rows of `b`.
    fn pairwise(&self, a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = Array2::zeros((a.nrows(), b.nrows()));
        for (i, row_a) in a.outer_iter().enumerate() {
            for (j, row_b) in b.outer_iter().enumerate() {
                out[[i, j]] = self.distance(row_a, row_b);
            }
        }
        out
    }
}

/// Great-circle (haversine) distance on the unit sphere.
///
/// Operates on `(lon, lat)` rows in radians and returns the angular distance
/// in radians:
///
/// `d = 2·asin(sqrt(sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlon/2)))`
///
/// No physical radius is applied here; ordering and pruning only depend on
/// the angular distance, and radius scaling happens at the reporting boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl DistanceMetric for Haversine {
    fn distance(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        let (lon1, lat1) = (a[0], a[1]);
        let (lon2, lat2) = (b[0], b[1]);
        let half_dlat = (lat2 - lat1) / 2.0;
        let half_dlon = (lon2 - lon1) / 2.0;
        let h = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlon.sin().powi(2);
        // h can creep above 1 through rounding on near-antipodal pairs.
        2.0 * h.sqrt().min(1.0).asin()
    }
}

/// Plain Euclidean distance between coordinate rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl DistanceMetric for Euclidean {
    fn distance(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }
}
