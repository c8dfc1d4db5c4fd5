//! Metric normalization
//!
//! Two distinct paths live here:
//! - Batch-relative min-max rescaling: parameters are recomputed from every
//!   batch, so the same raw value can map differently depending on its batch.
//! - Training-time scalers ([`MinMaxScaler`], [`StandardScaler`]): parameters
//!   are fitted once and applied unchanged to later inputs.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::types::MetricTable;

/// Default target range for batch-relative normalization
pub const DEFAULT_RANGE: (f64, f64) = (0.0, 100.0);

/// Rescale each listed column of `table` into `range` using the batch's own
/// minimum and maximum.
///
/// Columns that are not listed pass through untouched. A constant column maps
/// to the midpoint of `range`.
pub fn normalize(
    table: &MetricTable,
    columns: &[&str],
    range: (f64, f64),
) -> Result<MetricTable, ComputeError> {
    let scaler = MinMaxScaler::fit(table, columns, range)?;
    scaler.transform(table)
}

/// Normalize every column of `table` into [`DEFAULT_RANGE`]
pub fn normalize_all(table: &MetricTable) -> Result<MetricTable, ComputeError> {
    let columns: Vec<&str> = table.columns.iter().map(String::as_str).collect();
    normalize(table, &columns, DEFAULT_RANGE)
}

/// Fitted min/max of a single column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpan {
    pub min: f64,
    pub max: f64,
}

/// Min-max scaler with parameters fixed at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub columns: Vec<String>,
    pub spans: Vec<ColumnSpan>,
    pub range: (f64, f64),
}

impl MinMaxScaler {
    /// Learn per-column min/max from `table`
    pub fn fit(
        table: &MetricTable,
        columns: &[&str],
        range: (f64, f64),
    ) -> Result<Self, ComputeError> {
        if table.is_empty() {
            return Err(ComputeError::EmptyInput(
                "cannot normalize an empty batch".to_string(),
            ));
        }
        if !(range.0.is_finite() && range.1.is_finite()) || range.0 > range.1 {
            return Err(ComputeError::invalid_field("range"));
        }

        let indices = resolve_columns(table, columns)?;
        check_rows(table, &indices)?;

        let spans = indices
            .iter()
            .map(|&idx| {
                let (min, max) = table
                    .column(idx)
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                        (lo.min(v), hi.max(v))
                    });
                ColumnSpan { min, max }
            })
            .collect();

        Ok(Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            spans,
            range,
        })
    }

    /// Apply the fitted spans to `table`. Values outside the fitted span are
    /// extrapolated, not clamped.
    pub fn transform(&self, table: &MetricTable) -> Result<MetricTable, ComputeError> {
        let names: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let indices = resolve_columns(table, &names)?;
        check_rows(table, &indices)?;

        let (lo, hi) = self.range;
        let midpoint = (lo + hi) / 2.0;

        let mut out = table.clone();
        for row in &mut out.rows {
            for (span, &idx) in self.spans.iter().zip(&indices) {
                let width = span.max - span.min;
                row[idx] = if width == 0.0 {
                    midpoint
                } else {
                    lo + (row[idx] - span.min) / width * (hi - lo)
                };
            }
        }
        Ok(out)
    }
}

/// Fitted mean and standard deviation of one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureMoments {
    pub mean: f64,
    pub std_dev: f64,
}

/// Z-score scaler fitted on training data
///
/// Attached to prediction models so request-time inputs are scaled with the
/// parameters the model was trained with, never refitted on the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub moments: Vec<FeatureMoments>,
}

impl StandardScaler {
    /// Fit on training rows (population standard deviation)
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, ComputeError> {
        let first = rows.first().ok_or_else(|| {
            ComputeError::EmptyInput("cannot fit scaler on zero rows".to_string())
        })?;
        let width = first.len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(ComputeError::invalid_field("rows"));
        }

        let n = rows.len() as f64;
        let moments = (0..width)
            .map(|j| {
                let mean = rows.iter().map(|r| r[j]).sum::<f64>() / n;
                let variance = rows.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
                FeatureMoments {
                    mean,
                    std_dev: variance.sqrt(),
                }
            })
            .collect();

        Ok(Self { moments })
    }

    /// Scale one feature vector. Zero-variance features map to 0.
    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>, ComputeError> {
        if values.len() != self.moments.len() {
            return Err(ComputeError::InputValidation {
                fields: vec![format!(
                    "expected {} scaled features, got {}",
                    self.moments.len(),
                    values.len()
                )],
            });
        }
        Ok(values
            .iter()
            .zip(&self.moments)
            .map(|(v, m)| {
                if m.std_dev == 0.0 {
                    0.0
                } else {
                    (v - m.mean) / m.std_dev
                }
            })
            .collect())
    }
}

fn resolve_columns(table: &MetricTable, columns: &[&str]) -> Result<Vec<usize>, ComputeError> {
    let mut indices = Vec::with_capacity(columns.len());
    let mut unknown = Vec::new();
    for name in columns {
        match table.column_index(name) {
            Some(idx) => indices.push(idx),
            None => unknown.push(name.to_string()),
        }
    }
    if unknown.is_empty() {
        Ok(indices)
    } else {
        Err(ComputeError::InputValidation { fields: unknown })
    }
}

fn check_rows(table: &MetricTable, indices: &[usize]) -> Result<(), ComputeError> {
    let ragged = table.ragged_rows();
    if !ragged.is_empty() {
        return Err(ComputeError::InputValidation { fields: ragged });
    }

    let bad: Vec<String> = indices
        .iter()
        .filter(|&&idx| table.column(idx).any(|v| !v.is_finite()))
        .map(|&idx| table.columns[idx].clone())
        .collect();
    if bad.is_empty() {
        Ok(())
    } else {
        Err(ComputeError::InputValidation { fields: bad })
    }
}
