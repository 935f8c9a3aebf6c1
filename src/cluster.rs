pub mod dataset;
pub mod elkan;
pub mod init;
pub mod metric;
pub mod model;
pub mod solver;

// Re-export public types and functions
pub use dataset::Point;
pub use metric::{DistanceMetric, Euclidean, Haversine};
pub use model::{ClusterState, Diagnostic};
pub use solver::{GeoKMeans, InitMethod};
