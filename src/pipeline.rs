//! Pipeline orchestration
//!
//! This module provides the public JSON-in / JSON-out API. The stateless
//! `*_to_json` functions use default settings and a fresh engine per call;
//! [`InsightsEngine`] keeps a validated config and a shared model registry
//! for long-running callers.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::aggregator::{duration_weighted_focus, rate_users, round2, ProductivityStatus};
use crate::cluster::{
    cluster_statistics, rank_clusters, ClusterModel, ClusterRank, ClusterStatistics,
    SessionFeatures,
};
use crate::config::InsightsConfig;
use crate::error::ComputeError;
use crate::normalizer::normalize;
use crate::predict::{ModelRegistry, PredictionSet};
use crate::report::ReportEncoder;
use crate::session::{
    analyze_samples, productivity_trend, summarize_sessions, typing_rhythm, ActivitySample,
    SessionAnalytics, SessionSummary, Trend,
};
use crate::text::{categorize_errors_with, CategoryReport};
use crate::types::{ClusterAssignment, FlowRecord, MetricTable, QualityRecord, RatingOutcome};

/// Both record sources for a rating request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingInput {
    #[serde(default)]
    pub code_analysis: Vec<QualityRecord>,
    #[serde(default)]
    pub flow_metrics: Vec<FlowRecord>,
}

/// One session to cluster: a raw vector or named features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionInput {
    Vector(Vec<f64>),
    Features(SessionFeatures),
}

impl SessionInput {
    pub fn into_vector(self) -> Vec<f64> {
        match self {
            SessionInput::Vector(v) => v,
            SessionInput::Features(f) => f.to_vector(),
        }
    }
}

/// Clusters for a batch of sessions, named by rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterReport {
    pub assignments: Vec<ClusterAssignment>,
    /// Rank label for each session, in input order
    pub labels: Vec<String>,
    pub ranking: Vec<ClusterRank>,
    pub statistics: Vec<ClusterStatistics>,
    pub model: ClusterModel,
}

/// Activity inputs for a session summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInput {
    pub sessions: Vec<FlowRecord>,
    /// Inter-keystroke intervals in milliseconds, oldest first
    #[serde(default)]
    pub typing_intervals: Vec<f64>,
    /// Focus scores, oldest first
    #[serde(default)]
    pub focus_history: Vec<f64>,
    /// Timestamped activity samples for anomaly and recommendation analytics
    #[serde(default)]
    pub samples: Vec<ActivitySample>,
}

/// Session summary with focus indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    pub summary: SessionSummary,
    pub average_focus_score: f64,
    pub productivity_status: String,
    pub typing_rhythm: f64,
    pub productivity_trend: Trend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<SessionAnalytics>,
}

/// Stateful engine sharing one config and one model registry across calls
#[derive(Debug, Clone)]
pub struct InsightsEngine {
    config: InsightsConfig,
    registry: Arc<ModelRegistry>,
    encoder: ReportEncoder,
}

impl Default for InsightsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightsEngine {
    /// Engine with default settings and no prediction models
    pub fn new() -> Self {
        Self {
            config: InsightsConfig::default(),
            registry: Arc::new(ModelRegistry::new()),
            encoder: ReportEncoder::new(),
        }
    }

    pub fn with_config(config: InsightsConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    pub fn with_registry(mut self, registry: Arc<ModelRegistry>) -> Self {
        info!(models = registry.metrics().count(), "attached model registry");
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &InsightsConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Rate every user in the input
    pub fn rate(&self, input: &RatingInput) -> Result<BTreeMap<String, RatingOutcome>, ComputeError> {
        rate_users(&input.code_analysis, &input.flow_metrics)
    }

    /// Batch-relative normalization of every column into the configured range
    pub fn normalize(&self, table: &MetricTable) -> Result<MetricTable, ComputeError> {
        let columns: Vec<&str> = table.columns.iter().map(String::as_str).collect();
        normalize(table, &columns, self.config.normalization.range())
    }

    pub fn categorize(&self, messages: &[Value]) -> Result<CategoryReport, ComputeError> {
        categorize_errors_with(
            messages,
            &self.config.categorizer,
            self.config.report.top_terms,
        )
    }

    /// Fit clusters on the batch, then name and describe them
    pub fn cluster(&self, sessions: Vec<SessionInput>) -> Result<ClusterReport, ComputeError> {
        let vectors: Vec<Vec<f64>> = sessions.into_iter().map(SessionInput::into_vector).collect();
        let clustering = &self.config.clustering;

        let model = clustering.kmeans.fit(&vectors)?;
        let assignments = model.assign(&vectors)?;
        // Vectors too narrow for the ranking feature are clustered but left unranked
        let ranking = if clustering.rank_feature < model.dimension() {
            rank_clusters(&model, clustering.rank_feature, clustering.rank_descending)?
        } else {
            debug!(
                rank_feature = clustering.rank_feature,
                dimension = model.dimension(),
                "skipping cluster ranking"
            );
            Vec::new()
        };
        let statistics = cluster_statistics(&vectors, &assignments)?;

        let mut label_of: Vec<String> = (0..model.k()).map(|id| format!("Cluster {id}")).collect();
        for rank in &ranking {
            label_of[rank.cluster_id] = rank.label.clone();
        }
        let labels = assignments
            .iter()
            .map(|a| label_of[a.cluster_id].clone())
            .collect();

        debug!(sessions = vectors.len(), k = model.k(), "clustered sessions");
        Ok(ClusterReport {
            assignments,
            labels,
            ranking,
            statistics,
            model,
        })
    }

    /// Predict one metric, or every registered metric when `metric` is `None`
    pub fn predict(&self, metric: Option<&str>, input: &Value) -> Result<PredictionSet, ComputeError> {
        match metric {
            Some(name) => Ok(PredictionSet {
                predictions: vec![self.registry.predict(name, input)?],
                skipped: BTreeMap::new(),
            }),
            None => self.registry.predict_all(input),
        }
    }

    pub fn summarize(&self, input: &ActivityInput) -> Result<ActivityReport, ComputeError> {
        let summary = summarize_sessions(&input.sessions)?;
        let raw: Vec<_> = input.sessions.iter().map(|r| r.metrics).collect();
        let average_focus_score = round2(duration_weighted_focus(&raw).iter().sum());
        let analytics = if input.samples.is_empty() {
            None
        } else {
            Some(analyze_samples(&input.samples)?)
        };

        Ok(ActivityReport {
            summary,
            average_focus_score,
            productivity_status: ProductivityStatus::from_score(average_focus_score)
                .as_str()
                .to_string(),
            typing_rhythm: round2(typing_rhythm(&input.typing_intervals)),
            productivity_trend: productivity_trend(&input.focus_history),
            analytics,
        })
    }

    /// Rate users from a JSON [`RatingInput`]
    pub fn rate_json(&self, json: &str) -> Result<String, ComputeError> {
        let input: RatingInput = serde_json::from_str(json)?;
        let ratings = self.rate(&input)?;
        self.encode("rating", ratings)
    }

    /// Categorize a JSON array of messages, or an object with a `messages` array
    pub fn categorize_json(&self, json: &str) -> Result<String, ComputeError> {
        let value: Value = serde_json::from_str(json)?;
        let messages = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("messages") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(ComputeError::ParseError(
                        "expected a \"messages\" array".to_string(),
                    ))
                }
            },
            _ => {
                return Err(ComputeError::ParseError(
                    "expected an array of messages".to_string(),
                ))
            }
        };
        let report = self.categorize(&messages)?;
        self.encode("categories", report)
    }

    /// Cluster a JSON array of session vectors or session feature objects
    pub fn cluster_json(&self, json: &str) -> Result<String, ComputeError> {
        let sessions: Vec<SessionInput> = serde_json::from_str(json)?;
        let report = self.cluster(sessions)?;
        self.encode("clusters", report)
    }

    pub fn predict_json(&self, metric: Option<&str>, json: &str) -> Result<String, ComputeError> {
        let input: Value = serde_json::from_str(json)?;
        let predictions = self.predict(metric, &input)?;
        self.encode("predictions", predictions)
    }

    /// Summarize a JSON [`ActivityInput`], or a bare array of sessions
    pub fn summarize_json(&self, json: &str) -> Result<String, ComputeError> {
        let value: Value = serde_json::from_str(json)?;
        let input = if value.is_array() {
            ActivityInput {
                sessions: serde_json::from_value(value)?,
                ..ActivityInput::default()
            }
        } else {
            serde_json::from_value(value)?
        };
        let report = self.summarize(&input)?;
        self.encode("activity", report)
    }

    fn encode<T: Serialize>(&self, kind: &str, result: T) -> Result<String, ComputeError> {
        self.encoder
            .encode_to_json(kind, result, self.config.report.pretty)
    }
}

/// Rate every user in a JSON rating input.
///
/// # Example
/// ```ignore
/// let json = rating_to_json(r#"{"codeAnalysis": [...], "flowMetrics": [...]}"#)?;
/// ```
pub fn rating_to_json(json: &str) -> Result<String, ComputeError> {
    InsightsEngine::new().rate_json(json)
}

/// Categorize error messages with default settings
pub fn categorize_to_json(json: &str) -> Result<String, ComputeError> {
    InsightsEngine::new().categorize_json(json)
}

/// Cluster session vectors with default settings
pub fn cluster_to_json(json: &str) -> Result<String, ComputeError> {
    InsightsEngine::new().cluster_json(json)
}

/// Predict with models loaded from `registry_json`
pub fn predict_to_json(
    registry_json: &str,
    metric: Option<&str>,
    input_json: &str,
) -> Result<String, ComputeError> {
    let registry = ModelRegistry::from_json(registry_json)?;
    InsightsEngine::new()
        .with_registry(Arc::new(registry))
        .predict_json(metric, input_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rating_request() -> String {
        json!({
            "codeAnalysis": [
                {"userId": "u1", "timestamp": "2024-01-15T10:00:00Z", "readability": 80,
                 "maintainability": 70, "modularity": 60, "documentation": 50,
                 "errorHandling": 40, "duplication": 10}
            ],
            "flowMetrics": [
                {"userId": "u1", "timestamp": "2024-01-15T11:00:00Z", "focusScore": 90,
                 "sessionDuration": 60, "syntaxErrors": 1, "warningCount": 2, "problemCount": 0},
                {"userId": "u2", "timestamp": "2024-01-15T12:00:00Z", "focusScore": 40,
                 "sessionDuration": 30, "syntaxErrors": 0, "warningCount": 0, "problemCount": 0}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_rating_to_json() {
        let out = rating_to_json(&rating_request()).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["kind"], "rating");
        let u1 = &value["result"]["u1"];
        assert_eq!(u1["status"], "rated");
        assert_eq!(u1["compositeRating"], 50.0);
        assert_eq!(u1["averageFocusScore"], 90.0);

        let u2 = &value["result"]["u2"];
        assert_eq!(u2["status"], "no_data");
        assert_eq!(u2["category"], "code_analysis");
    }

    #[test]
    fn test_rating_rejects_bad_json() {
        assert!(matches!(
            rating_to_json("{not json"),
            Err(ComputeError::JsonError(_))
        ));
    }

    #[test]
    fn test_categorize_to_json_accepts_both_shapes() {
        let messages = json!([
            "Syntax error: unexpected token",
            "Warning: unused variable",
            "NullPointerException at line 5"
        ]);
        let bare = categorize_to_json(&messages.to_string()).unwrap();
        let wrapped = categorize_to_json(&json!({ "messages": messages }).to_string()).unwrap();

        let a: Value = serde_json::from_str(&bare).unwrap();
        let b: Value = serde_json::from_str(&wrapped).unwrap();
        assert_eq!(a["result"]["histogram"], b["result"]["histogram"]);
        assert_eq!(a["result"]["documents"], 3);

        assert!(matches!(
            categorize_to_json("42"),
            Err(ComputeError::ParseError(_))
        ));
    }

    #[test]
    fn test_cluster_to_json_labels_sessions() {
        let mut sessions = Vec::new();
        for base in [0.0, 50.0, 100.0] {
            for j in 0..3 {
                let jitter = j as f64;
                sessions.push(json!({
                    "typing_rhythm": base + jitter,
                    "tab_switches": 5.0,
                    "errors": 1.0,
                    "debugging": 2.0,
                    "active_file_duration": base + jitter,
                    "idle_time": 100.0 - base
                }));
            }
        }
        let out = cluster_to_json(&Value::Array(sessions).to_string()).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        let labels = value["result"]["labels"].as_array().unwrap();
        assert_eq!(labels.len(), 9);
        assert_eq!(labels[0], "Low Productivity");
        assert_eq!(labels[4], "Moderate Productivity");
        assert_eq!(labels[8], "High Productivity");
        assert_eq!(value["result"]["statistics"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_cluster_rejects_too_few_sessions() {
        let engine = InsightsEngine::new();
        let sessions = vec![
            SessionInput::Vector(vec![0.0; 6]),
            SessionInput::Vector(vec![1.0; 6]),
        ];
        assert!(matches!(
            engine.cluster(sessions),
            Err(ComputeError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_cluster_narrow_vectors_are_unranked() {
        let vectors = json!([
            [0.0, 0.0], [0.5, 0.2],
            [50.0, 50.0], [50.4, 49.8],
            [100.0, 0.0], [100.3, 0.4]
        ]);
        let out = cluster_to_json(&vectors.to_string()).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        let result = &value["result"];

        assert!(result["ranking"].as_array().unwrap().is_empty());
        let labels = result["labels"].as_array().unwrap();
        assert_eq!(labels.len(), 6);
        let ids = result["assignments"].as_array().unwrap();
        for (label, assignment) in labels.iter().zip(ids) {
            assert_eq!(
                label.as_str().unwrap(),
                format!("Cluster {}", assignment["clusterId"])
            );
        }
        assert_eq!(ids[0]["clusterId"], ids[1]["clusterId"]);
        assert_eq!(ids[2]["clusterId"], ids[3]["clusterId"]);
        assert_eq!(ids[4]["clusterId"], ids[5]["clusterId"]);
        assert_ne!(ids[0]["clusterId"], ids[2]["clusterId"]);
    }

    #[test]
    fn test_predict_to_json() {
        let registry = json!({
            "tab_switching_impact": {
                "kind": "linear",
                "intercept": 100.0,
                "coefficients": [-1.0, -2.0]
            }
        });
        let input = json!({"tabMetrics_total": 30, "tabMetrics_rapid": 15});
        let out =
            predict_to_json(&registry.to_string(), Some("tab_switching_impact"), &input.to_string())
                .unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        let p = &value["result"]["predictions"][0];
        assert_eq!(p["value"], 40.0);
        assert_eq!(
            p["insight"],
            "Excessive tab switching is reducing your focus. Avoid unnecessary tab switches."
        );

        let err = predict_to_json(&registry.to_string(), Some("focus_score"), &input.to_string());
        assert!(matches!(err, Err(ComputeError::UnknownMetric(_))));
    }

    #[test]
    fn test_summarize_json() {
        let engine = InsightsEngine::new();
        let request = json!({
            "sessions": [
                {"userId": "u1", "timestamp": "2024-01-15T09:10:00Z", "focusScore": 90,
                 "sessionDuration": 60, "syntaxErrors": 0, "warningCount": 0, "problemCount": 0},
                {"userId": "u1", "timestamp": "2024-01-16T09:40:00Z", "focusScore": 60,
                 "sessionDuration": 30, "syntaxErrors": 0, "warningCount": 0, "problemCount": 0}
            ],
            "typingIntervals": [120, 120, 120]
        });
        let out = engine.summarize_json(&request.to_string()).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        let result = &value["result"];
        assert_eq!(result["summary"]["totalTimeSpent"], 90.0);
        assert_eq!(result["summary"]["mostActiveHour"], 9);
        assert_eq!(result["averageFocusScore"], 80.0);
        assert_eq!(result["productivityStatus"], "Flow State");
        assert_eq!(result["typingRhythm"], 100.0);
        assert_eq!(result["productivityTrend"], "stable");
        assert!(result.get("analytics").is_none());
    }

    #[test]
    fn test_summarize_with_activity_samples() {
        let engine = InsightsEngine::new();
        let request = json!({
            "sessions": [
                {"userId": "u1", "timestamp": "2024-01-15T10:00:00Z", "focusScore": 70,
                 "sessionDuration": 45, "syntaxErrors": 1, "warningCount": 0, "problemCount": 1}
            ],
            "samples": [
                {"timestamp": "2024-01-15T10:00:00Z", "focusScore": 80, "typingRhythm": 60,
                 "relativeTypingRhythm": -15, "idleTime": 2, "debugging": 5, "errors": 1},
                {"timestamp": "2024-01-15T16:00:00Z", "focusScore": 40, "typingRhythm": 50,
                 "idleTime": 20, "debugging": 15, "errors": 3}
            ]
        });
        let out = engine.summarize_json(&request.to_string()).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        let analytics = &value["result"]["analytics"];
        assert_eq!(analytics["hours"]["bestHour"], 10);
        assert_eq!(analytics["hours"]["worstHour"], 16);
        assert_eq!(analytics["daily"][0]["totalDebugging"], 20.0);
        assert_eq!(analytics["averageDailyFocus"], 60.0);
        assert_eq!(
            analytics["recommendations"][0],
            json!([
                "This is the best time for deep work. Focus on complex tasks!",
                "Your typing rhythm is slower than usual. Consider taking a break."
            ])
        );
        assert_eq!(
            analytics["recommendations"][1],
            json!(["High idle time detected. Minimize distractions."])
        );
    }

    #[test]
    fn test_engine_normalizes_into_configured_range() {
        let mut config = InsightsConfig::default();
        config.normalization.range_min = -1.0;
        config.normalization.range_max = 1.0;
        let engine = InsightsEngine::with_config(config).unwrap();

        let table = MetricTable::new(vec!["x".to_string()], vec![vec![0.0], vec![10.0]]).unwrap();
        let out = engine.normalize(&table).unwrap();
        assert_eq!(out.rows, vec![vec![-1.0], vec![1.0]]);
    }
}
