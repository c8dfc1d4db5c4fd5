//! DevFlow Insights - Compute engine for developer ratings and productivity insights
//!
//! The engine turns per-user code-analysis and flow-metrics records, raw error
//! messages, and session behaviour vectors into JSON results through
//! deterministic pipelines:
//!
//! - **Rating**: batch normalization → weighted quality and flow scores → composite rating
//! - **Error categories**: cleaning → TF-IDF → LDA topics → labelled histogram
//! - **Productivity clusters**: seeded k-means++ → ranked cluster labels
//! - **Predictions**: registered linear, logistic and centroid models → value, label, insight
//! - **Sessions**: activity summaries, typing rhythm, productivity trend, focus
//!   anomalies and recommendations
//!
//! Every JSON result is wrapped in a [`report::Report`] envelope.

pub mod aggregator;
pub mod cluster;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod predict;
pub mod report;
pub mod session;
pub mod text;
pub mod types;

pub use aggregator::{aggregate_rating, rate, rate_users, ProductivityStatus};
pub use cluster::{cluster_sessions, ClusterModel, KMeans};
pub use config::InsightsConfig;
pub use error::ComputeError;
pub use normalizer::{normalize, normalize_all};
pub use pipeline::{
    categorize_to_json, cluster_to_json, predict_to_json, rating_to_json, InsightsEngine,
};
pub use predict::{Metric, ModelRegistry};
pub use session::{analyze_samples, summarize_sessions};
pub use text::{categorize_errors, ErrorCategorizer};
pub use types::{FlowMetrics, MetricRecord, QualityMetrics, RatingOutcome};

/// Engine version embedded in every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report envelopes
pub const PRODUCER_NAME: &str = "devflow-insights";
