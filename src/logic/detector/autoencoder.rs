//! Autoencoder scorer - ONNX Runtime reconstruction error.
//!
//! The backing runtime or artifact may be absent; every failure here maps to
//! `ModelUnavailable` and the caller degrades to isolation-forest-only
//! scoring. Never fatal.

use std::path::Path;

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::logic::features::FEATURE_COUNT;

pub struct Autoencoder {
    session: Mutex<Session>,
    /// Reconstruction-MSE calibration from training; scores normalize against it.
    mse_threshold: f32,
}

impl std::fmt::Debug for Autoencoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autoencoder")
            .field("mse_threshold", &self.mse_threshold)
            .finish()
    }
}

impl Autoencoder {
    /// Load the ONNX artifact. Any failure is `ModelUnavailable`.
    pub fn load(model_path: &Path, mse_threshold: f32) -> CoreResult<Self> {
        if !model_path.exists() {
            return Err(CoreError::ModelUnavailable(format!(
                "autoencoder artifact not found: {}",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| CoreError::ModelUnavailable(format!("session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| CoreError::ModelUnavailable(format!("optimization level: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| CoreError::ModelUnavailable(format!("model load: {}", e)))?;

        tracing::info!(path = %model_path.display(), "autoencoder model loaded");

        Ok(Self {
            session: Mutex::new(session),
            mse_threshold: mse_threshold.max(1e-6),
        })
    }

    /// Reconstruction-error score in [0, 1] for one normalized feature vector.
    pub fn score(&self, features: &[f32]) -> CoreResult<f32> {
        if features.len() != FEATURE_COUNT {
            return Err(CoreError::ModelUnavailable(format!(
                "autoencoder input has {} values, expected {}",
                features.len(),
                FEATURE_COUNT
            )));
        }

        let input_array = Array2::<f32>::from_shape_vec((1, FEATURE_COUNT), features.to_vec())
            .map_err(|e| CoreError::ModelUnavailable(format!("input shape: {}", e)))?;

        let mut session = self.session.lock();

        // Output name read before run to avoid a borrow conflict
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| CoreError::ModelUnavailable("model has no output".into()))?;

        let input_tensor = Value::from_array(input_array)
            .map_err(|e| CoreError::ModelUnavailable(format!("tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| CoreError::ModelUnavailable(format!("inference: {}", e)))?;

        let output = outputs
            .get(&output_name)
            .ok_or_else(|| CoreError::ModelUnavailable("no output from model".into()))?;

        let output_tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| CoreError::ModelUnavailable(format!("output extract: {}", e)))?;
        let reconstructed = output_tensor.1;

        let mut mse = 0.0f32;
        let mut count = 0usize;
        for (i, &original) in features.iter().enumerate() {
            if let Some(&r) = reconstructed.get(i) {
                mse += (original - r).powi(2);
                count += 1;
            }
        }
        if count == 0 {
            return Err(CoreError::ModelUnavailable("empty model output".into()));
        }
        mse /= count as f32;

        Ok((mse / (self.mse_threshold * 2.0)).min(1.0))
    }
}
