//! Per-metric prediction
//!
//! Each [`Metric`] has its own fitted model and its own input fields. Results
//! are paired with fixed-threshold insight strings.

pub mod metric;
pub mod model;
pub mod registry;

pub use metric::{Metric, CLUSTER_LEVELS};
pub use model::{CentroidModel, LinearModel, LogisticModel, ModelArtifact};
pub use registry::{extract_features, ModelRegistry, PredictionSet};
