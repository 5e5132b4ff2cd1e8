//! Model artifact manifest.
//!
//! A trained model version is a directory:
//!   manifest.json          - feature names, threshold, fusion weights, normalization
//!   isolation_forest.json  - fitted tree ensemble
//!   autoencoder.onnx       - optional reconstruction model
//!
//! Training produces these; the core only reads them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::logic::detector;
use crate::logic::features::FEATURE_COUNT;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ISOLATION_FOREST_FILE: &str = "isolation_forest.json";
pub const AUTOENCODER_FILE: &str = "autoencoder.onnx";

/// Min/max normalization parameters from training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub min_vals: Vec<f32>,
    pub max_vals: Vec<f32>,
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self {
            min_vals: vec![0.0; FEATURE_COUNT],
            max_vals: vec![1.0; FEATURE_COUNT],
        }
    }
}

impl NormalizationParams {
    /// Scale features to [0, 1] with the training min/max.
    pub fn normalize(&self, features: &[f32]) -> Vec<f32> {
        features
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let min_val = self.min_vals.get(i).copied().unwrap_or(0.0);
                let max_val = self.max_vals.get(i).copied().unwrap_or(1.0);
                let range = (max_val - min_val).max(1e-8);
                ((v - min_val) / range).clamp(0.0, 1.0)
            })
            .collect()
    }
}

/// Parsed manifest.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version_tag: String,
    /// Ordered feature names the model was trained against.
    pub feature_names: Vec<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_weight")]
    pub weight_if: f32,
    #[serde(default = "default_weight")]
    pub weight_ae: f32,
    /// Reconstruction-MSE calibration for the autoencoder score.
    #[serde(default = "default_ae_mse_threshold")]
    pub ae_mse_threshold: f32,
    #[serde(default)]
    pub normalization: NormalizationParams,
}

fn default_threshold() -> f32 {
    detector::DEFAULT_THRESHOLD
}

fn default_weight() -> f32 {
    detector::DEFAULT_WEIGHT_IF
}

fn default_ae_mse_threshold() -> f32 {
    0.1
}

impl ModelManifest {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Artifact(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| CoreError::Artifact(format!("parse {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scales_to_unit_interval() {
        let params = NormalizationParams {
            min_vals: vec![0.0; FEATURE_COUNT],
            max_vals: vec![100.0; FEATURE_COUNT],
        };
        let features = vec![50.0f32; FEATURE_COUNT];
        let normalized = params.normalize(&features);
        assert!((normalized[0] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_normalize_clamps_out_of_range() {
        let params = NormalizationParams::default();
        let normalized = params.normalize(&[-5.0, 5.0]);
        assert_eq!(normalized[0], 0.0);
        assert_eq!(normalized[1], 1.0);
    }

    #[test]
    fn test_manifest_defaults() {
        let json = r#"{"version_tag":"v3","feature_names":["a","b"]}"#;
        let manifest: ModelManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.threshold, detector::DEFAULT_THRESHOLD);
        assert_eq!(manifest.weight_if, 0.5);
        assert_eq!(manifest.weight_ae, 0.5);
        assert!(manifest.ae_mse_threshold > 0.0);
    }
}
