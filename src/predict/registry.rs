//! Model registry
//!
//! Holds one fitted artifact per metric. The registry is built once at
//! startup and only read afterwards, so it can be shared behind an `Arc`
//! without locking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::metric::Metric;
use super::model::ModelArtifact;
use crate::error::ComputeError;
use crate::types::Prediction;

/// Fitted predictors keyed by metric
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRegistry {
    models: BTreeMap<Metric, ModelArtifact>,
}

/// Predictions for every registered metric whose inputs were supplied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    pub predictions: Vec<Prediction>,
    /// Metrics left out, with the fields they were missing
    pub skipped: BTreeMap<String, Vec<String>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load artifacts from a JSON object keyed by metric name
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let raw: BTreeMap<String, ModelArtifact> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (name, artifact) in raw {
            let metric: Metric = name.parse()?;
            registry.insert(metric, artifact)?;
        }
        info!(models = registry.models.len(), "loaded model registry");
        Ok(registry)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// Register an artifact; its kind and input width must match the metric
    pub fn insert(&mut self, metric: Metric, artifact: ModelArtifact) -> Result<(), ComputeError> {
        if artifact.kind() != metric.artifact_kind() {
            return Err(ComputeError::InputValidation {
                fields: vec![format!(
                    "{metric}: expected a {} model, got {}",
                    metric.artifact_kind(),
                    artifact.kind()
                )],
            });
        }
        let expected = metric.features().len();
        if artifact.input_width() != expected {
            return Err(ComputeError::InputValidation {
                fields: vec![format!(
                    "{metric}: model takes {} features, metric has {expected}",
                    artifact.input_width()
                )],
            });
        }
        self.models.insert(metric, artifact);
        Ok(())
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.models.contains_key(&metric)
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.models.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Predict one metric from a JSON object of input fields.
    ///
    /// Every required field must be present and numeric; all offending
    /// fields are reported together.
    pub fn predict(&self, name: &str, input: &Value) -> Result<Prediction, ComputeError> {
        let metric: Metric = name.parse()?;
        let artifact = self
            .models
            .get(&metric)
            .ok_or_else(|| ComputeError::UnknownMetric(name.to_string()))?;

        let features = extract_features(metric, input)?;
        let value = artifact.predict(&features)?;
        let label = metric.label(value)?;
        let insight = metric.insight(value, label.as_deref());
        debug!(%metric, value, "predicted");

        Ok(Prediction {
            metric: metric.as_str().to_string(),
            value,
            label,
            insight,
        })
    }

    /// Run every registered predictor whose inputs are present
    pub fn predict_all(&self, input: &Value) -> Result<PredictionSet, ComputeError> {
        let mut predictions = Vec::new();
        let mut skipped = BTreeMap::new();
        for metric in self.metrics() {
            match self.predict(metric.as_str(), input) {
                Ok(p) => predictions.push(p),
                Err(ComputeError::InputValidation { fields }) => {
                    skipped.insert(metric.as_str().to_string(), fields);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(PredictionSet {
            predictions,
            skipped,
        })
    }
}

/// Pull a metric's feature vector out of a JSON object
pub fn extract_features(metric: Metric, input: &Value) -> Result<Vec<f64>, ComputeError> {
    let object: &Map<String, Value> = input
        .as_object()
        .ok_or_else(|| ComputeError::invalid_field("input"))?;

    let mut values = Vec::with_capacity(metric.features().len());
    let mut invalid = Vec::new();
    for field in metric.features() {
        match object.get(*field).and_then(Value::as_f64) {
            Some(v) if v.is_finite() => values.push(v),
            _ => invalid.push(field.to_string()),
        }
    }

    if invalid.is_empty() {
        Ok(values)
    } else {
        Err(ComputeError::InputValidation { fields: invalid })
    }
}
