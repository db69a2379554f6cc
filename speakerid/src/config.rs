use serde::{Deserialize, Serialize};

use crate::similarity::Aggregation;

/// Threshold applied when a call does not supply one.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Controls registry behavior.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Embedding dimension (e.g. 192 or 512 depending on the model).
    /// 0 leaves it to the first enrollment.
    pub dim: usize,

    /// Minimum cosine similarity to accept a match when the caller omits
    /// one. Unset means [`DEFAULT_THRESHOLD`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_threshold: Option<f32>,

    /// How samples of one identity are combined into its score.
    pub aggregation: Aggregation,
}

impl Config {
    /// Threshold applied when a call does not supply one.
    pub fn threshold(&self) -> f32 {
        self.default_threshold.unwrap_or(DEFAULT_THRESHOLD)
    }

    pub(crate) fn fixed_dim(&self) -> Option<usize> {
        (self.dim > 0).then_some(self.dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::default();
        assert_eq!(cfg.threshold(), 0.6);
        assert_eq!(cfg.aggregation, Aggregation::Max);
        assert_eq!(cfg.fixed_dim(), None);
    }

    #[test]
    fn explicit_values_are_kept() {
        let cfg = Config {
            dim: 192,
            default_threshold: Some(0.75),
            aggregation: Aggregation::Mean,
        };
        assert_eq!(cfg.threshold(), 0.75);
        assert_eq!(cfg.fixed_dim(), Some(192));
    }

    #[test]
    fn explicit_zero_threshold_is_kept() {
        let cfg = Config {
            default_threshold: Some(0.0),
            ..Config::default()
        };
        assert_eq!(cfg.threshold(), 0.0);
    }
}
