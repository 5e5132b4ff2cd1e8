//! Model Manager - resolves the active trained-model version.
//!
//! Explicitly constructed and injected into each session; never a process
//! singleton. Versions are immutable after load and shared read-only as
//! `Arc` snapshots; `reload` swaps the pointer atomically so in-flight
//! scoring keeps a consistent version.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::logic::detector::{self, AnomalyResult, Autoencoder, IsolationForest};
use crate::logic::features::{layout, FeatureVector};
use crate::logic::model::artifact::{
    ModelManifest, NormalizationParams, AUTOENCODER_FILE, ISOLATION_FOREST_FILE, MANIFEST_FILE,
};

/// One immutable loaded model version.
#[derive(Debug)]
pub struct ModelVersion {
    pub version_tag: String,
    pub feature_names: Vec<String>,
    pub threshold: f32,
    pub weight_if: f32,
    pub weight_ae: f32,
    pub normalization: NormalizationParams,
    pub isolation_forest: IsolationForest,
    pub autoencoder: Option<Autoencoder>,
    pub loaded_at: DateTime<Utc>,
}

/// Engine status for the operator surface.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub version_tag: String,
    pub has_autoencoder: bool,
    pub tree_count: usize,
    pub threshold: f32,
    pub avg_latency_ms: f32,
    pub inference_count: u64,
    pub loaded_at: DateTime<Utc>,
}

pub struct ModelManager {
    dir: PathBuf,
    threshold_override: Option<f32>,
    current: RwLock<Arc<ModelVersion>>,
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

impl ModelManager {
    /// Load the artifact directory. The isolation forest is required; a
    /// missing autoencoder degrades to single-detector scoring.
    pub fn load(dir: &Path, threshold_override: Option<f32>) -> CoreResult<Self> {
        let version = load_version(dir, threshold_override)?;
        tracing::info!(
            version = %version.version_tag,
            trees = version.isolation_forest.tree_count(),
            has_autoencoder = version.autoencoder.is_some(),
            "model version loaded"
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            threshold_override,
            current: RwLock::new(Arc::new(version)),
            latency_sum_us: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
        })
    }

    /// Snapshot of the active version.
    pub fn current(&self) -> Arc<ModelVersion> {
        self.current.read().clone()
    }

    /// Re-read the artifact directory and swap the active version atomically.
    pub fn reload(&self) -> CoreResult<String> {
        let version = load_version(&self.dir, self.threshold_override)?;
        let tag = version.version_tag.clone();
        *self.current.write() = Arc::new(version);
        tracing::info!(version = %tag, "model version reloaded");
        Ok(tag)
    }

    /// Score one feature vector against the current version.
    pub fn score(&self, fv: &FeatureVector) -> CoreResult<AnomalyResult> {
        let started = Instant::now();
        let model = self.current();

        fv.validate().map_err(|e| CoreError::FeatureSchemaMismatch {
            detail: e.to_string(),
        })?;

        let normalized = model.normalization.normalize(fv.as_slice());
        let if_score = model.isolation_forest.score(&normalized);

        let ae_score = match &model.autoencoder {
            Some(ae) => match ae.score(&normalized) {
                Ok(score) => Some(score),
                Err(e) => {
                    tracing::warn!(error = %e, "autoencoder scoring failed, continuing without it");
                    None
                }
            },
            None => None,
        };

        let result = detector::fuse(
            if_score,
            ae_score,
            model.threshold,
            model.weight_if,
            model.weight_ae,
        );

        self.latency_sum_us
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        Ok(result)
    }

    pub fn status(&self) -> EngineStatus {
        let model = self.current();
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 {
            (sum as f32 / count as f32) / 1000.0
        } else {
            0.0
        };
        EngineStatus {
            version_tag: model.version_tag.clone(),
            has_autoencoder: model.autoencoder.is_some(),
            tree_count: model.isolation_forest.tree_count(),
            threshold: model.threshold,
            avg_latency_ms: avg,
            inference_count: count,
            loaded_at: model.loaded_at,
        }
    }
}

fn load_version(dir: &Path, threshold_override: Option<f32>) -> CoreResult<ModelVersion> {
    let manifest = ModelManifest::from_file(&dir.join(MANIFEST_FILE))?;

    // The declared feature order is a hard contract with the extractor.
    layout::check_feature_names(&manifest.feature_names)
        .map_err(|detail| CoreError::FeatureSchemaMismatch { detail })?;

    let forest_bytes = std::fs::read(dir.join(ISOLATION_FOREST_FILE))
        .map_err(|e| CoreError::Artifact(format!("read {}: {}", ISOLATION_FOREST_FILE, e)))?;
    let isolation_forest = IsolationForest::from_json(&forest_bytes)?;

    let ae_path = dir.join(AUTOENCODER_FILE);
    let autoencoder = match Autoencoder::load(&ae_path, manifest.ae_mse_threshold) {
        Ok(ae) => Some(ae),
        Err(e) => {
            tracing::warn!(error = %e, "running without the autoencoder scorer");
            None
        }
    };

    Ok(ModelVersion {
        version_tag: manifest.version_tag,
        feature_names: manifest.feature_names,
        threshold: threshold_override.unwrap_or(manifest.threshold),
        weight_if: manifest.weight_if,
        weight_ae: manifest.weight_ae,
        normalization: manifest.normalization,
        isolation_forest,
        autoencoder,
        loaded_at: Utc::now(),
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_and_score_without_autoencoder() {
        let dir = TempDir::new().unwrap();
        test_support::write_artifacts(dir.path(), "v1", 0.6);

        let manager = ModelManager::load(dir.path(), None).unwrap();
        let fv = FeatureVector::new();
        let result = manager.score(&fv).unwrap();

        assert!(!result.has_autoencoder);
        assert_eq!(result.anomaly_score, result.if_score);
        assert_eq!(result.confidence, detector::SINGLE_DETECTOR_CONFIDENCE);
        assert_eq!(result.threshold, 0.6);
    }

    #[test]
    fn test_inference_stats_accumulate() {
        let dir = TempDir::new().unwrap();
        test_support::write_artifacts(dir.path(), "v1", 0.6);
        let manager = ModelManager::load(dir.path(), None).unwrap();

        let fv = FeatureVector::new();
        manager.score(&fv).unwrap();
        manager.score(&fv).unwrap();

        let status = manager.status();
        assert_eq!(status.inference_count, 2);
        assert_eq!(status.version_tag, "v1");
        assert!(!status.has_autoencoder);
    }

    #[test]
    fn test_reload_swaps_version() {
        let dir = TempDir::new().unwrap();
        test_support::write_artifacts(dir.path(), "v1", 0.6);
        let manager = ModelManager::load(dir.path(), None).unwrap();

        let before = manager.current();
        test_support::write_artifacts(dir.path(), "v2", 0.7);
        let tag = manager.reload().unwrap();

        assert_eq!(tag, "v2");
        assert_eq!(manager.current().version_tag, "v2");
        // The old snapshot is still valid for in-flight use
        assert_eq!(before.version_tag, "v1");
    }

    #[test]
    fn test_threshold_override_wins() {
        let dir = TempDir::new().unwrap();
        test_support::write_artifacts(dir.path(), "v1", 0.6);
        let manager = ModelManager::load(dir.path(), Some(0.8)).unwrap();
        assert_eq!(manager.current().threshold, 0.8);
    }

    #[test]
    fn test_wrong_feature_names_is_schema_mismatch() {
        let dir = TempDir::new().unwrap();
        test_support::write_artifacts(dir.path(), "v1", 0.6);

        // Corrupt the declared names
        let manifest = serde_json::json!({
            "version_tag": "bad",
            "feature_names": ["wrong", "names"],
        });
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();

        let err = ModelManager::load(dir.path(), None).unwrap_err();
        assert!(matches!(err, CoreError::FeatureSchemaMismatch { .. }));
    }

    #[test]
    fn test_missing_forest_is_artifact_error() {
        let dir = TempDir::new().unwrap();
        test_support::write_artifacts(dir.path(), "v1", 0.6);
        std::fs::remove_file(dir.path().join(ISOLATION_FOREST_FILE)).unwrap();

        let err = ModelManager::load(dir.path(), None).unwrap_err();
        assert!(matches!(err, CoreError::Artifact(_)));
    }
}
