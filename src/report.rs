//! Report envelope
//!
//! Wraps every JSON result with producer metadata so downstream consumers
//! can tell which engine build and which engine instance computed it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ComputeError;
use crate::{PRODUCER_NAME, VERSION};

/// Engine that produced a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// A computed result with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report<T> {
    pub producer: Producer,
    /// Which computation produced `result` ("rating", "categories", ...)
    pub kind: String,
    pub computed_at_utc: String,
    pub result: T,
}

/// Builds report envelopes for one engine instance
#[derive(Debug, Clone)]
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create an encoder with a fresh instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn wrap<T>(&self, kind: &str, result: T) -> Report<T> {
        Report {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            kind: kind.to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            result,
        }
    }

    /// Wrap and serialize in one step
    pub fn encode_to_json<T: Serialize>(
        &self,
        kind: &str,
        result: T,
        pretty: bool,
    ) -> Result<String, ComputeError> {
        let report = self.wrap(kind, result);
        if pretty {
            serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
        } else {
            serde_json::to_string(&report).map_err(ComputeError::JsonError)
        }
    }
}
