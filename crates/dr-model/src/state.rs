//! Persisted model parameters.
//!
//! A model file is a JSON object with a fixed set of keys. `theta`, `mean`,
//! `std` and `M` are required; the training metadata is optional. Unknown keys
//! are rejected.

use std::path::Path;

use anyhow::{Context, Result};
use dr_core::BotError;
use serde::{Deserialize, Serialize};

/// Trained parameters of one model. Read-only during live trading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelState {
    /// Weights, `[bias, x[t-M]..x[t-1], Ft[t-1]]`. Length `M + 2`.
    pub theta: Vec<f64>,
    /// Mean of the training price differences.
    pub mean: f64,
    /// Population standard deviation of the training price differences.
    pub std: f64,
    /// Lookback window length.
    #[serde(rename = "M")]
    pub m: usize,

    // -- Training metadata --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpes: Option<Vec<f64>>,
    #[serde(rename = "N", default, skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
    #[serde(rename = "P", default, skip_serializing_if = "Option::is_none")]
    pub p: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epochs: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_dataset_name: Option<String>,
}

impl ModelState {
    /// Bare parameters without training metadata.
    pub fn new(theta: Vec<f64>, mean: f64, std: f64) -> Self {
        let m = theta.len().saturating_sub(2);
        Self {
            theta,
            mean,
            std,
            m,
            sharpes: None,
            n: None,
            p: None,
            epochs: None,
            commission: None,
            learning_rate: None,
            train_dataset_name: None,
        }
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<(), BotError> {
        if self.theta.len() != self.m + 2 {
            return Err(BotError::Config(format!(
                "theta has {} weights, expected M + 2 = {}",
                self.theta.len(),
                self.m + 2
            )));
        }
        if let Some(i) = self.theta.iter().position(|w| !w.is_finite()) {
            return Err(BotError::Config(format!("theta[{i}] is not finite")));
        }
        if !self.mean.is_finite() {
            return Err(BotError::Config("mean is not finite".into()));
        }
        if !(self.std.is_finite() && self.std > 0.0) {
            return Err(BotError::Config(format!("std must be positive, got {}", self.std)));
        }
        Ok(())
    }

    /// Parse and validate a model document.
    pub fn from_json_str(content: &str) -> Result<Self, BotError> {
        let state: Self = serde_json::from_str(content).map_err(|e| BotError::Parse(format!("model file: {e}")))?;
        state.validate()?;
        Ok(state)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed to read model file: {}", path.display()))?;
        Ok(Self::from_json_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("failed to serialize model")?;
        std::fs::write(path, content).with_context(|| format!("failed to write model file: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_loads() {
        let state = ModelState::from_json_str(r#"{"theta": [0.1, 0.2, 0.3, 0.4], "mean": 1.5, "std": 20.0, "M": 2}"#)
            .unwrap();
        assert_eq!(state.m, 2);
        assert!(state.sharpes.is_none());
    }

    #[test]
    fn training_metadata_is_accepted() {
        let doc = r#"{
            "theta": [0.1, 0.2, 0.3], "mean": 0.0, "std": 1.0, "M": 1,
            "sharpes": [0.01, 0.02], "N": 1000, "P": 200, "epochs": 2,
            "commission": 0.001, "learning_rate": 0.3, "train_dataset_name": "BTCUSDT-1d"
        }"#;
        let state = ModelState::from_json_str(doc).unwrap();
        assert_eq!(state.n, Some(1000));
        assert_eq!(state.train_dataset_name.as_deref(), Some("BTCUSDT-1d"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = ModelState::from_json_str(r#"{"theta": [0.1, 0.2], "mean": 0.0, "std": 1.0, "M": 0, "x_train": []}"#)
            .unwrap_err();
        assert!(matches!(err, BotError::Parse(_)));
    }

    #[test]
    fn missing_required_key_is_rejected() {
        let err = ModelState::from_json_str(r#"{"theta": [0.1, 0.2], "mean": 0.0, "M": 0}"#).unwrap_err();
        assert!(matches!(err, BotError::Parse(_)));
    }

    #[test]
    fn theta_length_must_match_window() {
        let err = ModelState::from_json_str(r#"{"theta": [0.1, 0.2, 0.3], "mean": 0.0, "std": 1.0, "M": 5}"#)
            .unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn non_positive_std_is_rejected() {
        assert!(ModelState::new(vec![0.0, 0.0], 0.0, 0.0).validate().is_err());
        assert!(ModelState::new(vec![0.0, 0.0], 0.0, -1.0).validate().is_err());
    }

    #[test]
    fn save_then_load_preserves_parameters() {
        let mut state = ModelState::new(vec![0.5, -0.25, 0.125], 3.0, 42.0);
        state.epochs = Some(10);
        let path = std::env::temp_dir().join(format!("dr-model-state-{}.json", std::process::id()));
        state.save(&path).unwrap();
        let loaded = ModelState::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, state);
    }
}
