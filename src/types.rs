//! Core types for the DevFlow Insights engine
//!
//! This module defines the records that flow into the engine (quality analyses,
//! flow sessions) and the derived results it hands back (ratings, topic and
//! cluster assignments, predictions).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// A family of named numeric metrics sharing one schema.
///
/// Implementors expose a fixed column order so batches can be flattened into a
/// [`MetricTable`] for normalization and rebuilt afterwards.
pub trait MetricFamily: Sized {
    /// Category name used in reports and `NoData` errors
    const CATEGORY: &'static str;

    /// Column names in row order
    fn columns() -> &'static [&'static str];

    /// Flatten into a row following [`MetricFamily::columns`]
    fn to_row(&self) -> Vec<f64>;

    /// Rebuild from a row following [`MetricFamily::columns`]
    fn from_row(row: &[f64]) -> Result<Self, ComputeError>;
}

/// Code-quality metrics from a single analysis, each nominally 0-100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub readability: f64,
    pub maintainability: f64,
    pub modularity: f64,
    pub documentation: f64,
    pub error_handling: f64,
    pub duplication: f64,
}

impl MetricFamily for QualityMetrics {
    const CATEGORY: &'static str = "code_analysis";

    fn columns() -> &'static [&'static str] {
        &[
            "readability",
            "maintainability",
            "modularity",
            "documentation",
            "errorHandling",
            "duplication",
        ]
    }

    fn to_row(&self) -> Vec<f64> {
        vec![
            self.readability,
            self.maintainability,
            self.modularity,
            self.documentation,
            self.error_handling,
            self.duplication,
        ]
    }

    fn from_row(row: &[f64]) -> Result<Self, ComputeError> {
        match row {
            [readability, maintainability, modularity, documentation, error_handling, duplication] => {
                Ok(Self {
                    readability: *readability,
                    maintainability: *maintainability,
                    modularity: *modularity,
                    documentation: *documentation,
                    error_handling: *error_handling,
                    duplication: *duplication,
                })
            }
            _ => Err(ComputeError::ParseError(format!(
                "quality row needs 6 values, got {}",
                row.len()
            ))),
        }
    }
}

/// Flow-session metrics, all non-negative
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMetrics {
    pub focus_score: f64,
    /// Session length in minutes
    pub session_duration: f64,
    pub syntax_errors: f64,
    pub warning_count: f64,
    pub problem_count: f64,
}

impl MetricFamily for FlowMetrics {
    const CATEGORY: &'static str = "flow_metrics";

    fn columns() -> &'static [&'static str] {
        &[
            "focusScore",
            "sessionDuration",
            "syntaxErrors",
            "warningCount",
            "problemCount",
        ]
    }

    fn to_row(&self) -> Vec<f64> {
        vec![
            self.focus_score,
            self.session_duration,
            self.syntax_errors,
            self.warning_count,
            self.problem_count,
        ]
    }

    fn from_row(row: &[f64]) -> Result<Self, ComputeError> {
        match row {
            [focus_score, session_duration, syntax_errors, warning_count, problem_count] => {
                Ok(Self {
                    focus_score: *focus_score,
                    session_duration: *session_duration,
                    syntax_errors: *syntax_errors,
                    warning_count: *warning_count,
                    problem_count: *problem_count,
                })
            }
            _ => Err(ComputeError::ParseError(format!(
                "flow row needs 5 values, got {}",
                row.len()
            ))),
        }
    }
}

/// One observation per (user, timestamp) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord<M> {
    pub user_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: M,
}

impl<M> MetricRecord<M> {
    pub fn new(user_id: impl Into<String>, timestamp: DateTime<Utc>, metrics: M) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp,
            metrics,
        }
    }
}

pub type QualityRecord = MetricRecord<QualityMetrics>;
pub type FlowRecord = MetricRecord<FlowMetrics>;

/// Rectangular batch of numeric rows sharing a column schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMetricTable")]
pub struct MetricTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

/// Unchecked wire form of [`MetricTable`]
#[derive(Deserialize)]
struct RawMetricTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl TryFrom<RawMetricTable> for MetricTable {
    type Error = ComputeError;

    fn try_from(raw: RawMetricTable) -> Result<Self, Self::Error> {
        MetricTable::new(raw.columns, raw.rows)
    }
}

/// A single row of a normalized table
pub type NormalizedRecord = Vec<f64>;

impl MetricTable {
    /// Create a table, checking every row matches the column count
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, ComputeError> {
        let table = Self { columns, rows };
        let ragged = table.ragged_rows();
        if !ragged.is_empty() {
            return Err(ComputeError::InputValidation { fields: ragged });
        }
        Ok(table)
    }

    /// Names of rows whose width differs from the column count
    pub fn ragged_rows(&self) -> Vec<String> {
        let width = self.columns.len();
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.len() != width)
            .map(|(i, _)| format!("row[{i}]"))
            .collect()
    }

    /// Flatten a batch of metric records into a table
    pub fn from_records<M: MetricFamily>(records: &[MetricRecord<M>]) -> Self {
        Self {
            columns: M::columns().iter().map(|c| c.to_string()).collect(),
            rows: records.iter().map(|r| r.metrics.to_row()).collect(),
        }
    }

    /// Rebuild typed metrics from the rows
    pub fn to_metrics<M: MetricFamily>(&self) -> Result<Vec<M>, ComputeError> {
        self.rows.iter().map(|row| M::from_row(row)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of a named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom
    pub fn column(&self, index: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(move |row| row[index])
    }
}

/// Per-record weighted scores kept for audit and reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingBreakdown {
    pub normalized_quality: Vec<QualityMetrics>,
    pub normalized_flow: Vec<FlowMetrics>,
    pub weighted_score_quality: Vec<f64>,
    pub weighted_score_flow: Vec<f64>,
    /// `focusScore * sessionDuration / total sessionDuration` per flow record
    pub weighted_focus: Vec<f64>,
}

/// Composite rating for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRating {
    pub composite_rating: f64,
    pub code_analysis_score: f64,
    pub flow_metrics_score: f64,
    pub average_focus_score: f64,
    pub details: RatingBreakdown,
}

/// Result of rating one user: either a score or the missing category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RatingOutcome {
    Rated(Box<CompositeRating>),
    NoData { category: String },
}

/// Topic assigned to a single error message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAssignment {
    /// Index of the message in the cleaned corpus
    pub document: usize,
    pub topic: usize,
    pub label: String,
    /// Posterior weight of the winning topic
    pub weight: f64,
}

/// Cluster assigned to a session feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAssignment {
    pub cluster_id: usize,
    pub centroid: Vec<f64>,
}

/// Output of one predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub metric: String,
    pub value: f64,
    /// Class label for classification-style metrics ("High", "Low", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight: Option<String>,
}
