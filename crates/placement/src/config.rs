//! Tunables of a resolution pass.

use corelib::aggregator::DEFAULT_IQR_K;
use corelib::{AggregatorKind, Result};
use serde::{Deserialize, Serialize};

/// Backup factor used when neither the policy nor the configuration sets one.
pub const DEFAULT_BACKUP_FACTOR: u32 = 3;

/// Configuration for container node selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Backup factor applied when the policy carries zero.
    pub backup_factor: u32,
    /// Statistic used to weight buckets against each other.
    pub aggregator: AggregatorKind,
    /// Outlier scaling factor of the `mean_iqr` aggregator.
    pub iqr_k: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            backup_factor: DEFAULT_BACKUP_FACTOR,
            aggregator: AggregatorKind::MeanIqr,
            iqr_k: DEFAULT_IQR_K,
        }
    }
}

impl SelectionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SelectionConfig::default();
        assert_eq!(config.backup_factor, 3);
        assert_eq!(config.aggregator, AggregatorKind::MeanIqr);
        assert_eq!(config.iqr_k, 1.5);
    }

    #[test]
    fn test_partial_json() {
        let config = SelectionConfig::from_json(r#"{"aggregator": "max"}"#).unwrap();
        assert_eq!(config.aggregator, AggregatorKind::Max);
        assert_eq!(config.backup_factor, DEFAULT_BACKUP_FACTOR);
    }
}
