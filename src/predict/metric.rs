//! Predicted metrics, their input features and insight thresholds

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Labels for cluster-index metrics, in index order
pub const CLUSTER_LEVELS: [&str; 3] = ["Low", "Medium", "High"];

const LOW_FOCUS: &str =
    "Your focus score is low. Try reducing idle time and avoiding rapid tab switching.";
const GOOD_FOCUS: &str = "Your focus score is good. Keep maintaining your workflow!";
const LOW_QUALITY: &str = "Your code quality needs improvement. Focus on reducing code complexity and increasing test coverage.";
const HIGH_ERRORS: &str =
    "High error count predicted. Review your code changes carefully and write more unit tests.";
const LOW_PRODUCTIVITY: &str =
    "Your productivity is low. Try scheduling shorter, more focused work sessions.";
const UNEVEN_TYPING: &str =
    "Your typing rhythm is affecting your focus. Try maintaining a consistent typing speed.";
const TAB_SWITCHING: &str =
    "Excessive tab switching is reducing your focus. Avoid unnecessary tab switches.";
const HIGH_COMPLEXITY: &str =
    "High code complexity detected. Consider refactoring your code to improve maintainability.";
const SHORT_SESSIONS: &str =
    "Your session duration is too short. Try longer, uninterrupted work sessions.";
const HIGH_SEVERITY: &str =
    "High-severity errors detected. Prioritize fixing these errors to improve code quality.";

const CODE_FEATURES: &[&str] = &[
    "codeMetrics_linesAdded",
    "codeMetrics_linesDeleted",
    "codeMetrics_fileEdits",
    "codeMetrics_codeComplexity",
    "codeMetrics_testCoverage",
];

/// A metric with its own predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    FocusScore,
    CodeQuality,
    ErrorCount,
    ProductivityCluster,
    TypingRhythmImpact,
    TabSwitchingImpact,
    ComplexityImpact,
    SessionImpact,
    SeverityCluster,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::FocusScore,
        Metric::CodeQuality,
        Metric::ErrorCount,
        Metric::ProductivityCluster,
        Metric::TypingRhythmImpact,
        Metric::TabSwitchingImpact,
        Metric::ComplexityImpact,
        Metric::SessionImpact,
        Metric::SeverityCluster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::FocusScore => "focus_score",
            Metric::CodeQuality => "code_quality",
            Metric::ErrorCount => "error_count",
            Metric::ProductivityCluster => "productivity_cluster",
            Metric::TypingRhythmImpact => "typing_rhythm_impact",
            Metric::TabSwitchingImpact => "tab_switching_impact",
            Metric::ComplexityImpact => "complexity_impact",
            Metric::SessionImpact => "session_impact",
            Metric::SeverityCluster => "severity_cluster",
        }
    }

    /// Input fields read by this metric's predictor, in model column order
    pub fn features(&self) -> &'static [&'static str] {
        match self {
            Metric::FocusScore => &[
                "currentStreak",
                "longestStreak",
                "sessionDuration",
                "activeFileDuration",
                "idleTime",
                "typingRhythm",
            ],
            Metric::CodeQuality | Metric::ErrorCount => CODE_FEATURES,
            Metric::ProductivityCluster => &[
                "sessionDuration",
                "activeFileDuration",
                "idleTime",
                "typingRhythm",
            ],
            Metric::TypingRhythmImpact => &[
                "typingRhythm",
                "sessionDuration",
                "activeFileDuration",
                "idleTime",
            ],
            Metric::TabSwitchingImpact => &["tabMetrics_total", "tabMetrics_rapid"],
            Metric::ComplexityImpact => &["codeMetrics_codeComplexity", "codeMetrics_testCoverage"],
            Metric::SessionImpact => &["sessionDuration", "activeFileDuration", "idleTime"],
            Metric::SeverityCluster => &[
                "errorSummary_bySeverity_error",
                "errorSummary_bySeverity_warning",
                "errorSummary_bySeverity_info",
            ],
        }
    }

    /// Artifact kind that produces this metric's output
    pub fn artifact_kind(&self) -> &'static str {
        match self {
            Metric::CodeQuality => "logistic",
            Metric::ProductivityCluster | Metric::SeverityCluster => "centroid",
            _ => "linear",
        }
    }

    /// Class label for a raw model output, for metrics that have one.
    ///
    /// Class outputs must be non-negative whole numbers; anything else
    /// came from the wrong kind of model.
    pub fn label(&self, value: f64) -> Result<Option<String>, ComputeError> {
        let label = match self {
            Metric::CodeQuality => {
                let class = match class_index(*self, value)? {
                    0 => "Low",
                    1 => "High",
                    other => return Err(not_a_class(*self, other as f64)),
                };
                class.to_string()
            }
            Metric::ProductivityCluster | Metric::SeverityCluster => {
                let index = class_index(*self, value)?;
                CLUSTER_LEVELS
                    .get(index)
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| format!("Cluster {index}"))
            }
            _ => return Ok(None),
        };
        Ok(Some(label))
    }

    /// Fixed-threshold advice for a prediction, if any applies
    pub fn insight(&self, value: f64, label: Option<&str>) -> Option<String> {
        let message = match self {
            Metric::FocusScore if value < 50.0 => LOW_FOCUS,
            Metric::FocusScore => GOOD_FOCUS,
            Metric::CodeQuality if label == Some("Low") => LOW_QUALITY,
            Metric::ErrorCount if value > 10.0 => HIGH_ERRORS,
            Metric::ProductivityCluster if label == Some("Low") => LOW_PRODUCTIVITY,
            Metric::TypingRhythmImpact if value < 50.0 => UNEVEN_TYPING,
            Metric::TabSwitchingImpact if value < 50.0 => TAB_SWITCHING,
            Metric::ComplexityImpact if value > 7.0 => HIGH_COMPLEXITY,
            Metric::SessionImpact if value < 50.0 => SHORT_SESSIONS,
            Metric::SeverityCluster if label == Some("High") => HIGH_SEVERITY,
            _ => return None,
        };
        Some(message.to_string())
    }
}

fn class_index(metric: Metric, value: f64) -> Result<usize, ComputeError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(not_a_class(metric, value));
    }
    Ok(value as usize)
}

fn not_a_class(metric: Metric, value: f64) -> ComputeError {
    ComputeError::ParseError(format!("{metric} output {value} is not a class index"))
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "focus" {
            return Ok(Metric::FocusScore);
        }
        Metric::ALL
            .iter()
            .find(|m| m.as_str() == s)
            .copied()
            .ok_or_else(|| ComputeError::UnknownMetric(s.to_string()))
    }
}
