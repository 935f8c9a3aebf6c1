pub mod cluster;
pub mod error;

pub use cluster::{
    ClusterState, Diagnostic, DistanceMetric, Euclidean, GeoKMeans, Haversine, InitMethod, Point,
};
pub use error::{Error, Result};
