//! Weighted rating aggregation
//!
//! Turns a user's code-analysis records and flow-session records into one
//! composite developer rating:
//!
//! ```text
//! composite = 0.6 * mean(weighted quality score)
//!           + 0.4 * mean(weighted flow score)
//! ```
//!
//! Both batches are normalized batch-relatively into 0-100 before weighting.
//! The flow weights give syntax errors and warnings a positive sign after
//! normalization, so more errors raise the flow score. That mirrors the
//! established scoring and is kept as-is until the intended sign is confirmed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ComputeError;
use crate::normalizer::normalize_all;
use crate::types::{
    CompositeRating, FlowMetrics, FlowRecord, MetricFamily, MetricRecord, MetricTable,
    QualityMetrics, QualityRecord, RatingBreakdown, RatingOutcome,
};

/// Fixed mapping from metric name to weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightVector {
    pub entries: &'static [(&'static str, f64)],
}

impl WeightVector {
    /// Weight of a named metric (0 when absent)
    pub fn weight(&self, metric: &str) -> f64 {
        self.entries
            .iter()
            .find(|(name, _)| *name == metric)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Weighted sum of a row laid out as `columns`
    pub fn apply(&self, columns: &[&str], row: &[f64]) -> f64 {
        columns
            .iter()
            .zip(row)
            .map(|(name, value)| self.weight(name) * value)
            .sum()
    }
}

/// Code-analysis weights (sum to 1.0)
pub const QUALITY_WEIGHTS: WeightVector = WeightVector {
    entries: &[
        ("readability", 0.30),
        ("maintainability", 0.30),
        ("modularity", 0.15),
        ("documentation", 0.15),
        ("errorHandling", 0.05),
        ("duplication", 0.05),
    ],
};

/// Flow-metric weights (sum to 1.0)
pub const FLOW_WEIGHTS: WeightVector = WeightVector {
    entries: &[
        ("focusScore", 0.50),
        ("syntaxErrors", 0.20),
        ("warningCount", 0.20),
        ("problemCount", 0.10),
    ],
};

/// Share of the code-analysis score in the composite rating
pub const CODE_ANALYSIS_SHARE: f64 = 0.6;

/// Share of the flow-metrics score in the composite rating
pub const FLOW_METRICS_SHARE: f64 = 0.4;

/// Compute the composite rating for one user's two batches.
///
/// Fails with [`ComputeError::NoData`] naming the empty category when either
/// batch is empty; a score is never built from one source alone. Negative
/// flow fields fail with [`ComputeError::InputValidation`].
pub fn aggregate_rating(
    quality: &[QualityRecord],
    flow: &[FlowRecord],
) -> Result<CompositeRating, ComputeError> {
    if quality.is_empty() {
        return Err(ComputeError::NoData {
            category: QualityMetrics::CATEGORY.to_string(),
        });
    }
    if flow.is_empty() {
        return Err(ComputeError::NoData {
            category: FlowMetrics::CATEGORY.to_string(),
        });
    }

    check_flow_counts(flow)?;

    let quality_table = normalize_all(&MetricTable::from_records(quality))?;
    let flow_table = normalize_all(&MetricTable::from_records(flow))?;

    let weighted_score_quality =
        weighted_scores(&quality_table, QualityMetrics::columns(), &QUALITY_WEIGHTS);
    let weighted_score_flow = weighted_scores(&flow_table, FlowMetrics::columns(), &FLOW_WEIGHTS);

    let raw_flow: Vec<FlowMetrics> = flow.iter().map(|r| r.metrics).collect();
    let weighted_focus = duration_weighted_focus(&raw_flow);
    let average_focus_score = weighted_focus.iter().sum::<f64>();

    let code_analysis_score = mean(&weighted_score_quality);
    let flow_metrics_score = mean(&weighted_score_flow);
    let composite =
        CODE_ANALYSIS_SHARE * code_analysis_score + FLOW_METRICS_SHARE * flow_metrics_score;

    debug!(
        quality_records = quality.len(),
        flow_records = flow.len(),
        code_analysis_score,
        flow_metrics_score,
        composite,
        "aggregated composite rating"
    );

    Ok(CompositeRating {
        composite_rating: round2(composite),
        code_analysis_score: round2(code_analysis_score),
        flow_metrics_score: round2(flow_metrics_score),
        average_focus_score: round2(average_focus_score),
        details: RatingBreakdown {
            normalized_quality: quality_table.to_metrics()?,
            normalized_flow: flow_table.to_metrics()?,
            weighted_score_quality,
            weighted_score_flow,
            weighted_focus,
        },
    })
}

/// Rate one user, turning a missing category into a [`RatingOutcome::NoData`]
pub fn rate(quality: &[QualityRecord], flow: &[FlowRecord]) -> Result<RatingOutcome, ComputeError> {
    match aggregate_rating(quality, flow) {
        Ok(rating) => Ok(RatingOutcome::Rated(Box::new(rating))),
        Err(ComputeError::NoData { category }) => Ok(RatingOutcome::NoData { category }),
        Err(e) => Err(e),
    }
}

/// Rate every user present in either batch.
///
/// Records are grouped by `user_id`; each user's batches are normalized on
/// their own, never against other users.
pub fn rate_users(
    quality: &[QualityRecord],
    flow: &[FlowRecord],
) -> Result<BTreeMap<String, RatingOutcome>, ComputeError> {
    let quality_by_user = group_by_user(quality);
    let flow_by_user = group_by_user(flow);

    let users: BTreeSet<&str> = quality_by_user
        .keys()
        .chain(flow_by_user.keys())
        .copied()
        .collect();

    let mut ratings = BTreeMap::new();
    for user in users {
        let q = quality_by_user.get(user).cloned().unwrap_or_default();
        let f = flow_by_user.get(user).cloned().unwrap_or_default();
        ratings.insert(user.to_string(), rate(&q, &f)?);
    }
    Ok(ratings)
}

/// Session-duration weighted focus per record.
///
/// Each record contributes `focusScore * sessionDuration / total duration`; the
/// sum of the contributions is the user's average focus score. When the total
/// duration is zero every record gets an equal share.
pub fn duration_weighted_focus(flow: &[FlowMetrics]) -> Vec<f64> {
    let total_duration: f64 = flow.iter().map(|f| f.session_duration).sum();
    if total_duration > 0.0 {
        flow.iter()
            .map(|f| f.focus_score * (f.session_duration / total_duration))
            .collect()
    } else {
        let share = 1.0 / flow.len().max(1) as f64;
        flow.iter().map(|f| f.focus_score * share).collect()
    }
}

/// Human-readable productivity bucket for a 0-100 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductivityStatus {
    FlowState,
    InTheZone,
    Focused,
    GettingStarted,
}

/// Thresholds for [`ProductivityStatus`]: high, medium, low
pub const PRODUCTIVITY_THRESHOLDS: (f64, f64, f64) = (80.0, 60.0, 40.0);

impl ProductivityStatus {
    pub fn from_score(score: f64) -> Self {
        let (high, medium, low) = PRODUCTIVITY_THRESHOLDS;
        if score >= high {
            ProductivityStatus::FlowState
        } else if score >= medium {
            ProductivityStatus::InTheZone
        } else if score >= low {
            ProductivityStatus::Focused
        } else {
            ProductivityStatus::GettingStarted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductivityStatus::FlowState => "Flow State",
            ProductivityStatus::InTheZone => "In The Zone",
            ProductivityStatus::Focused => "Focused",
            ProductivityStatus::GettingStarted => "Getting Started",
        }
    }
}

/// Flow metrics are non-negative; every offending field is named
fn check_flow_counts(flow: &[FlowRecord]) -> Result<(), ComputeError> {
    let fields: Vec<String> = flow
        .iter()
        .enumerate()
        .flat_map(|(i, record)| {
            FlowMetrics::columns()
                .iter()
                .zip(record.metrics.to_row())
                .filter(|(_, value)| *value < 0.0)
                .map(move |(name, _)| format!("flowMetrics[{i}].{name}"))
        })
        .collect();
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ComputeError::InputValidation { fields })
    }
}

fn weighted_scores(table: &MetricTable, columns: &[&str], weights: &WeightVector) -> Vec<f64> {
    table
        .rows
        .iter()
        .map(|row| weights.apply(columns, row))
        .collect()
}

fn group_by_user<M: Clone>(records: &[MetricRecord<M>]) -> BTreeMap<&str, Vec<MetricRecord<M>>> {
    let mut groups: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.user_id.as_str())
            .or_default()
            .push(record.clone());
    }
    groups
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn quality(user: &str, values: [f64; 6]) -> QualityRecord {
        MetricRecord::new(
            user,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            QualityMetrics {
                readability: values[0],
                maintainability: values[1],
                modularity: values[2],
                documentation: values[3],
                error_handling: values[4],
                duplication: values[5],
            },
        )
    }

    fn flow(user: &str, values: [f64; 5]) -> FlowRecord {
        MetricRecord::new(
            user,
            Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap(),
            FlowMetrics {
                focus_score: values[0],
                session_duration: values[1],
                syntax_errors: values[2],
                warning_count: values[3],
                problem_count: values[4],
            },
        )
    }

    #[test]
    fn test_weight_vectors_sum_to_one() {
        assert!((QUALITY_WEIGHTS.total() - 1.0).abs() < 1e-12);
        assert!((FLOW_WEIGHTS.total() - 1.0).abs() < 1e-12);
        assert!((CODE_ANALYSIS_SHARE + FLOW_METRICS_SHARE - 1.0).abs() < 1e-12);
        // Session duration is not weighted into the flow score directly
        assert_eq!(FLOW_WEIGHTS.weight("sessionDuration"), 0.0);
    }

    #[test]
    fn test_single_record_batches_rate_fifty() {
        let q = vec![quality("u1", [80.0, 80.0, 70.0, 70.0, 70.0, 40.0])];
        let f = vec![flow("u1", [90.0, 60.0, 0.0, 1.0, 2.0])];

        let rating = aggregate_rating(&q, &f).unwrap();
        assert_eq!(rating.composite_rating, 50.00);
        assert_eq!(rating.code_analysis_score, 50.00);
        assert_eq!(rating.flow_metrics_score, 50.00);
        // Raw focus weighted by the only session's full share
        assert_eq!(rating.average_focus_score, 90.00);
    }

    #[test]
    fn test_rating_is_deterministic_and_bounded() {
        let q = vec![
            quality("u1", [90.0, 85.0, 70.0, 60.0, 50.0, 30.0]),
            quality("u1", [60.0, 65.0, 80.0, 90.0, 70.0, 60.0]),
            quality("u1", [75.0, 70.0, 75.0, 70.0, 95.0, 45.0]),
        ];
        let f = vec![
            flow("u1", [85.0, 45.0, 2.0, 3.0, 1.0]),
            flow("u1", [40.0, 20.0, 6.0, 1.0, 4.0]),
        ];

        let first = aggregate_rating(&q, &f).unwrap();
        let second = aggregate_rating(&q, &f).unwrap();
        assert_eq!(first, second);
        assert!((0.0..=100.0).contains(&first.composite_rating));
        assert_eq!(first.details.weighted_score_quality.len(), 3);
        assert_eq!(first.details.weighted_score_flow.len(), 2);
    }

    #[test]
    fn test_flow_score_follows_documented_weights() {
        let q = vec![quality("u1", [50.0; 6])];
        let f = vec![
            flow("u1", [100.0, 30.0, 0.0, 0.0, 0.0]),
            flow("u1", [0.0, 30.0, 10.0, 10.0, 10.0]),
        ];

        let rating = aggregate_rating(&q, &f).unwrap();
        // Record 0 normalizes to focus 100, counts 0 -> 50
        // Record 1 normalizes to focus 0, counts 100 -> 50
        assert_eq!(rating.details.weighted_score_flow, vec![50.0, 50.0]);
        assert_eq!(rating.flow_metrics_score, 50.0);
    }

    #[test]
    fn test_longer_sessions_weigh_more_in_focus_average() {
        let metrics = vec![
            FlowMetrics {
                focus_score: 90.0,
                session_duration: 90.0,
                syntax_errors: 0.0,
                warning_count: 0.0,
                problem_count: 0.0,
            },
            FlowMetrics {
                focus_score: 30.0,
                session_duration: 10.0,
                syntax_errors: 0.0,
                warning_count: 0.0,
                problem_count: 0.0,
            },
        ];
        let weighted = duration_weighted_focus(&metrics);
        let average: f64 = weighted.iter().sum();
        assert!((average - 84.0).abs() < 1e-9);
        // A simple mean would be 60
        assert!(average > 60.0);
    }

    #[test]
    fn test_zero_total_duration_falls_back_to_mean() {
        let metrics = vec![
            FlowMetrics {
                focus_score: 80.0,
                session_duration: 0.0,
                syntax_errors: 0.0,
                warning_count: 0.0,
                problem_count: 0.0,
            },
            FlowMetrics {
                focus_score: 40.0,
                session_duration: 0.0,
                syntax_errors: 0.0,
                warning_count: 0.0,
                problem_count: 0.0,
            },
        ];
        let average: f64 = duration_weighted_focus(&metrics).iter().sum();
        assert!((average - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_category_reports_no_data() {
        let q = vec![quality("u1", [50.0; 6])];
        match aggregate_rating(&q, &[]) {
            Err(ComputeError::NoData { category }) => assert_eq!(category, "flow_metrics"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            rate(&[], &[flow("u1", [1.0; 5])]).unwrap(),
            RatingOutcome::NoData {
                category: "code_analysis".to_string()
            }
        );
    }

    #[test]
    fn test_negative_flow_fields_are_rejected() {
        let q = vec![quality("u1", [50.0; 6])];
        let f = vec![
            flow("u1", [80.0, 30.0, 0.0, 1.0, 0.0]),
            flow("u1", [70.0, -30.0, 0.0, -2.0, 1.0]),
        ];
        match aggregate_rating(&q, &f) {
            Err(ComputeError::InputValidation { fields }) => assert_eq!(
                fields,
                vec![
                    "flowMetrics[1].sessionDuration",
                    "flowMetrics[1].warningCount"
                ]
            ),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(rate(&q, &f).is_err());
    }

    #[test]
    fn test_rate_users_groups_per_user() {
        let q = vec![
            quality("alice", [80.0, 80.0, 70.0, 70.0, 70.0, 40.0]),
            quality("bob", [10.0, 10.0, 10.0, 10.0, 10.0, 10.0]),
        ];
        let f = vec![flow("alice", [90.0, 60.0, 0.0, 1.0, 2.0])];

        let ratings = rate_users(&q, &f).unwrap();
        assert_eq!(ratings.len(), 2);
        match &ratings["alice"] {
            RatingOutcome::Rated(r) => assert_eq!(r.composite_rating, 50.0),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            ratings["bob"],
            RatingOutcome::NoData {
                category: "flow_metrics".to_string()
            }
        );
    }

    #[test]
    fn test_productivity_status_thresholds() {
        assert_eq!(ProductivityStatus::from_score(80.0), ProductivityStatus::FlowState);
        assert_eq!(ProductivityStatus::from_score(79.9), ProductivityStatus::InTheZone);
        assert_eq!(ProductivityStatus::from_score(40.0), ProductivityStatus::Focused);
        assert_eq!(
            ProductivityStatus::from_score(12.0).as_str(),
            "Getting Started"
        );
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(49.996), 50.0);
        assert_eq!(round2(12.344), 12.34);
    }
}
