//! Fitted model artifacts
//!
//! Artifacts are plain serde structs so they can be trained offline, stored as
//! JSON and loaded once at startup. Each carries the [`StandardScaler`] it was
//! trained with; inputs are scaled with those parameters, never refitted.

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterModel;
use crate::error::ComputeError;
use crate::normalizer::StandardScaler;

/// Default decision threshold for logistic models
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Linear regression `intercept + coefficients . x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<StandardScaler>,
}

impl LinearModel {
    /// Ridge regression through the normal equations. The intercept is not
    /// penalised. With `standardize` a scaler is fitted on `rows` first and
    /// stored with the model.
    pub fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        ridge: f64,
        standardize: bool,
    ) -> Result<Self, ComputeError> {
        if rows.is_empty() {
            return Err(ComputeError::EmptyInput(
                "cannot fit a model on zero rows".to_string(),
            ));
        }
        if rows.len() != targets.len() {
            return Err(ComputeError::invalid_field("targets"));
        }
        if ridge < 0.0 || !ridge.is_finite() {
            return Err(ComputeError::invalid_field("ridge"));
        }

        let scaler = if standardize {
            Some(StandardScaler::fit(rows)?)
        } else {
            None
        };
        let design: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| {
                let x = match &scaler {
                    Some(s) => s.transform(r)?,
                    None => r.clone(),
                };
                let mut with_bias = Vec::with_capacity(x.len() + 1);
                with_bias.push(1.0);
                with_bias.extend(x);
                Ok(with_bias)
            })
            .collect::<Result<_, ComputeError>>()?;

        let width = design[0].len();
        if design.iter().any(|r| r.len() != width) {
            return Err(ComputeError::invalid_field("rows"));
        }

        // (X'X + ridge * I') beta = X'y, bias column unpenalised
        let mut gram = vec![vec![0.0; width]; width];
        let mut moment = vec![0.0; width];
        for (row, y) in design.iter().zip(targets) {
            for i in 0..width {
                moment[i] += row[i] * y;
                for j in 0..width {
                    gram[i][j] += row[i] * row[j];
                }
            }
        }
        for (i, row) in gram.iter_mut().enumerate().skip(1) {
            row[i] += ridge;
        }

        let beta = solve(gram, moment)?;
        Ok(Self {
            intercept: beta[0],
            coefficients: beta[1..].to_vec(),
            scaler,
        })
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64, ComputeError> {
        let x = scale(&self.scaler, features)?;
        Ok(self.intercept + dot(&self.coefficients, &x)?)
    }
}

/// Binary classifier over a logistic score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<StandardScaler>,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl LogisticModel {
    /// Probability of class 1
    pub fn probability(&self, features: &[f64]) -> Result<f64, ComputeError> {
        let x = scale(&self.scaler, features)?;
        let z = self.intercept + dot(&self.coefficients, &x)?;
        Ok(1.0 / (1.0 + (-z).exp()))
    }

    /// Class 1 when the probability reaches the threshold, else 0
    pub fn predict(&self, features: &[f64]) -> Result<f64, ComputeError> {
        let p = self.probability(features)?;
        Ok(if p >= self.threshold { 1.0 } else { 0.0 })
    }
}

/// Nearest-centroid classifier; the output is a cluster index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidModel {
    pub centroids: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<StandardScaler>,
}

impl CentroidModel {
    pub fn from_cluster_model(model: &ClusterModel, scaler: Option<StandardScaler>) -> Self {
        Self {
            centroids: model.centroids.clone(),
            scaler,
        }
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64, ComputeError> {
        let x = scale(&self.scaler, features)?;
        let model = ClusterModel {
            centroids: self.centroids.clone(),
        };
        Ok(model.predict(&x)? as f64)
    }
}

/// Any fitted predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearModel),
    Logistic(LogisticModel),
    Centroid(CentroidModel),
}

impl ModelArtifact {
    /// Serialized `kind` tag
    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::Linear(_) => "linear",
            ModelArtifact::Logistic(_) => "logistic",
            ModelArtifact::Centroid(_) => "centroid",
        }
    }

    /// Number of input features the artifact expects
    pub fn input_width(&self) -> usize {
        match self {
            ModelArtifact::Linear(m) => m.coefficients.len(),
            ModelArtifact::Logistic(m) => m.coefficients.len(),
            ModelArtifact::Centroid(m) => m.centroids.first().map(Vec::len).unwrap_or(0),
        }
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64, ComputeError> {
        match self {
            ModelArtifact::Linear(m) => m.predict(features),
            ModelArtifact::Logistic(m) => m.predict(features),
            ModelArtifact::Centroid(m) => m.predict(features),
        }
    }
}

fn scale(scaler: &Option<StandardScaler>, features: &[f64]) -> Result<Vec<f64>, ComputeError> {
    match scaler {
        Some(s) => s.transform(features),
        None => Ok(features.to_vec()),
    }
}

fn dot(coefficients: &[f64], x: &[f64]) -> Result<f64, ComputeError> {
    if coefficients.len() != x.len() {
        return Err(ComputeError::InputValidation {
            fields: vec![format!(
                "expected {} features, got {}",
                coefficients.len(),
                x.len()
            )],
        });
    }
    Ok(coefficients.iter().zip(x).map(|(c, v)| c * v).sum())
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, ComputeError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(ComputeError::InputValidation {
                fields: vec!["rows (singular design matrix)".to_string()],
            });
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fit_recovers_exact_line() {
        let rows = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let targets = vec![1.0, 3.0, 5.0, 7.0];
        let model = LinearModel::fit(&rows, &targets, 0.0, false).unwrap();
        assert!((model.intercept - 1.0).abs() < 1e-9);
        assert!((model.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((model.predict(&[10.0]).unwrap() - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_with_scaler_predicts_on_raw_inputs() {
        let rows = vec![vec![10.0, 1.0], vec![20.0, 0.0], vec![30.0, 1.0], vec![40.0, 0.0]];
        let targets: Vec<f64> = rows.iter().map(|r| 0.5 * r[0] + 3.0 * r[1]).collect();
        let model = LinearModel::fit(&rows, &targets, 0.0, true).unwrap();
        assert!(model.scaler.is_some());
        let p = model.predict(&[25.0, 1.0]).unwrap();
        assert!((p - 15.5).abs() < 1e-9);
    }

    #[test]
    fn test_singular_design_is_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]];
        let targets = vec![1.0, 2.0, 3.0];
        assert!(LinearModel::fit(&rows, &targets, 0.0, false).is_err());
        // Ridge makes it solvable
        assert!(LinearModel::fit(&rows, &targets, 0.1, false).is_ok());
    }

    #[test]
    fn test_logistic_threshold() {
        let model = LogisticModel {
            intercept: 0.0,
            coefficients: vec![1.0],
            threshold: DEFAULT_THRESHOLD,
            scaler: None,
        };
        assert_eq!(model.predict(&[2.0]).unwrap(), 1.0);
        assert_eq!(model.predict(&[-2.0]).unwrap(), 0.0);
        assert_eq!(model.predict(&[0.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_artifact_json_shape() {
        let artifact: ModelArtifact = serde_json::from_value(json!({
            "kind": "centroid",
            "centroids": [[0.0, 0.0], [10.0, 10.0]]
        }))
        .unwrap();
        assert_eq!(artifact.input_width(), 2);
        assert_eq!(artifact.predict(&[9.0, 8.0]).unwrap(), 1.0);
        assert!(artifact.predict(&[9.0]).is_err());

        let logistic: ModelArtifact = serde_json::from_value(json!({
            "kind": "logistic",
            "intercept": 0.0,
            "coefficients": [1.0]
        }))
        .unwrap();
        match logistic {
            ModelArtifact::Logistic(m) => assert_eq!(m.threshold, DEFAULT_THRESHOLD),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_centroid_model_from_clusters() {
        let clusters = ClusterModel {
            centroids: vec![vec![1.0], vec![5.0], vec![9.0]],
        };
        let model = CentroidModel::from_cluster_model(&clusters, None);
        assert_eq!(model.predict(&[6.0]).unwrap(), 1.0);
    }
}
