//! Error types for DevFlow Insights

use thiserror::Error;

/// Errors that can occur during computation
///
/// Every variant is local to a single call: callers get a structured error
/// back and the process keeps serving.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("No data for category: {category}")]
    NoData { category: String },

    #[error("Insufficient data: {required} samples required, {actual} available")]
    InsufficientData { required: usize, actual: usize },

    #[error("Invalid input fields: {}", fields.join(", "))]
    InputValidation { fields: Vec<String> },

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ComputeError {
    /// Build an `InputValidation` error for a single field
    pub fn invalid_field(field: impl Into<String>) -> Self {
        ComputeError::InputValidation {
            fields: vec![field.into()],
        }
    }

    /// Stable machine-readable code, used by the CLI error envelope
    pub fn code(&self) -> &'static str {
        match self {
            ComputeError::EmptyInput(_) => "EMPTY_INPUT",
            ComputeError::NoData { .. } => "NO_DATA",
            ComputeError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            ComputeError::InputValidation { .. } => "INPUT_VALIDATION",
            ComputeError::UnknownMetric(_) => "UNKNOWN_METRIC",
            ComputeError::ParseError(_) => "PARSE_ERROR",
            ComputeError::JsonError(_) => "JSON_ERROR",
            ComputeError::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}
