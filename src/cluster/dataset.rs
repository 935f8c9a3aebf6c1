use ndarray::Array2;

use crate::error::{Error, Result};

/// A geographic point given as (longitude, latitude) in degrees.
///
/// Longitude must lie in `[-180, 180]` and latitude in `[-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl Point {
    /// Creates a new point from degree coordinates.
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// The immutable per-fit view of the input data.
///
/// Coordinates are converted to radians exactly once when the dataset is
/// built and shared read-only by every restart. Rows are `(lon, lat)`.
#[derive(Debug)]
pub(crate) struct Dataset {
    pub(crate) coords_rad: Array2<f64>,
    pub(crate) weights: Vec<f64>,
}

impl Dataset {
    /// Builds the radian-converted dataset. Inputs must already be validated.
    pub(crate) fn new(points: &[Point], weights: Option<&[f64]>) -> Self {
        let weights = match weights {
            Some(w) => w.to_vec(),
            None => vec![1.0; points.len()],
        };
        Self {
            coords_rad: to_radian_matrix(points),
            weights,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.coords_rad.nrows()
    }
}

/// Converts degree points into an n×2 radian matrix with `(lon, lat)` rows.
pub(crate) fn to_radian_matrix(points: &[Point]) -> Array2<f64> {
    Array2::from_shape_fn((points.len(), 2), |(i, j)| {
        if j == 0 {
            points[i].lon.to_radians()
        } else {
            points[i].lat.to_radians()
        }
    })
}

/// Checks that every point carries finite, in-range degree coordinates.
pub(crate) fn validate_points(points: &[Point]) -> Result<()> {
    if points.is_empty() {
        return Err(Error::invalid_input("dataset must contain at least one point"));
    }
    for (i, p) in points.iter().enumerate() {
        if !p.lon.is_finite() || !(-180.0..=180.0).contains(&p.lon) {
            return Err(Error::invalid_input(format!(
                "point {}: longitude {} outside [-180, 180]",
                i, p.lon
            )));
        }
        if !p.lat.is_finite() || !(-90.0..=90.0).contains(&p.lat) {
            return Err(Error::invalid_input(format!(
                "point {}: latitude {} outside [-90, 90]",
                i, p.lat
            )));
        }
    }
    Ok(())
}

/// Full pre-flight validation: shape, coordinate ranges, cluster count and
/// optional per-point weights. Pure; called once before any restart.
pub(crate) fn validate(points: &[Point], weights: Option<&[f64]>, k: usize) -> Result<()> {
    validate_points(points)?;
    if k == 0 || k > points.len() {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_points: points.len(),
        });
    }
    if let Some(w) = weights {
        if w.len() != points.len() {
            return Err(Error::invalid_input(format!(
                "weights length {} does not match point count {}",
                w.len(),
                points.len()
            )));
        }
        let mut total = 0.0;
        for (i, &wi) in w.iter().enumerate() {
            if !wi.is_finite() || wi < 0.0 {
                return Err(Error::invalid_input(format!(
                    "weight {}: {} must be finite and non-negative",
                    i, wi
                )));
            }
            total += wi;
        }
        if total <= 0.0 {
            return Err(Error::invalid_input("weights must not all be zero"));
        }
    }
    Ok(())
}
