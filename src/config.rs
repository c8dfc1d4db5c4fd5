//! Engine configuration
//!
//! Every section has defaults, so an empty TOML file is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cluster::{KMeans, DEFAULT_RANK_FEATURE};
use crate::error::ComputeError;
use crate::normalizer::DEFAULT_RANGE;
use crate::text::CategorizerParams;

/// Top-level configuration for [`crate::InsightsEngine`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub normalization: NormalizationConfig,
    pub categorizer: CategorizerParams,
    pub clustering: ClusteringConfig,
    pub report: ReportConfig,
}

/// Target range for batch-relative normalization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub range_min: f64,
    pub range_max: f64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            range_min: DEFAULT_RANGE.0,
            range_max: DEFAULT_RANGE.1,
        }
    }
}

impl NormalizationConfig {
    pub fn range(&self) -> (f64, f64) {
        (self.range_min, self.range_max)
    }
}

/// k-means settings plus the rule used to name clusters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub kmeans: KMeans,
    /// Session feature index whose centroid value orders the clusters
    pub rank_feature: usize,
    pub rank_descending: bool,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            kmeans: KMeans::default(),
            rank_feature: DEFAULT_RANK_FEATURE,
            rank_descending: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Terms listed per topic in categorization reports
    pub top_terms: usize,
    pub pretty: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_terms: 5,
            pretty: true,
        }
    }
}

impl InsightsConfig {
    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ComputeError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ComputeError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ComputeError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ComputeError> {
        toml::to_string_pretty(self).map_err(|e| ComputeError::ConfigError(e.to_string()))
    }

    /// Check every setting, reporting all problems at once
    pub fn validate(&self) -> Result<(), ComputeError> {
        let mut errors = Vec::new();

        let (lo, hi) = self.normalization.range();
        if !(lo.is_finite() && hi.is_finite()) || lo > hi {
            errors.push(format!("normalization: invalid range [{lo}, {hi}]"));
        }
        if self.categorizer.max_features == 0 {
            errors.push("categorizer.max_features must be positive".to_string());
        }
        if self.categorizer.lda.n_topics == 0 {
            errors.push("categorizer.lda.n_topics must be positive".to_string());
        }
        if self.clustering.kmeans.k == 0 {
            errors.push("clustering.kmeans.k must be positive".to_string());
        }
        let tolerance = self.clustering.kmeans.tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            errors.push("clustering.kmeans.tolerance must be non-negative".to_string());
        }
        if self.clustering.rank_feature >= crate::cluster::SESSION_FEATURES.len() {
            errors.push(format!(
                "clustering.rank_feature {} is out of range",
                self.clustering.rank_feature
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ComputeError::ConfigError(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::LabelStrategy;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = InsightsConfig::from_toml_str("").unwrap();
        assert_eq!(config, InsightsConfig::default());
        assert_eq!(config.normalization.range(), (0.0, 100.0));
        assert_eq!(config.clustering.kmeans.k, 3);
        assert_eq!(config.categorizer.lda.n_topics, 3);
    }

    #[test]
    fn test_partial_override() {
        let config = InsightsConfig::from_toml_str(
            r#"
            [categorizer]
            labels = "calibrated"

            [categorizer.lda]
            seed = 7

            [clustering.kmeans]
            max_iter = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.categorizer.labels, LabelStrategy::Calibrated);
        assert_eq!(config.categorizer.lda.seed, 7);
        assert_eq!(config.categorizer.lda.n_topics, 3);
        assert_eq!(config.clustering.kmeans.max_iter, 50);
        assert_eq!(config.clustering.kmeans.k, 3);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = InsightsConfig::default();
        config.report.top_terms = 8;
        config.clustering.rank_descending = false;
        let text = config.to_toml_string().unwrap();
        assert_eq!(InsightsConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_validation_collects_errors() {
        let err = InsightsConfig::from_toml_str(
            r#"
            [normalization]
            range_min = 10.0
            range_max = 0.0

            [clustering.kmeans]
            k = 0
            "#,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("normalization"));
        assert!(message.contains("clustering.kmeans.k"));
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            InsightsConfig::from_toml_str("[report\ntop_terms = 1"),
            Err(ComputeError::ConfigError(_))
        ));
    }
}
