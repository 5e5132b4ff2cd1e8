//! Baseline Manager - named reference profiles with snapshot reads.
//!
//! `mark` appends, never overwrites. `select` repoints the active reference
//! with an atomic `Arc` swap, so a `compare` that started before the swap
//! keeps reading the baseline that was active when it began.

pub mod compare;
pub mod types;

pub use compare::{compare, spectral_estimate, SpectralEstimate};
pub use types::{Baseline, ComparativeResult, SensorAnomaly, ShiftSeverity};

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::constants::BASELINE_MODE_COUNT;
use crate::error::{CoreError, CoreResult};
use crate::logic::window::Window;

#[derive(Default)]
pub struct BaselineManager {
    baselines: RwLock<Vec<Arc<Baseline>>>,
    active: RwLock<Option<Arc<Baseline>>>,
}

impl BaselineManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract a spectral fingerprint from the window and store it as a new
    /// immutable baseline.
    pub fn mark(&self, name: &str, description: &str, window: &Window) -> Arc<Baseline> {
        let est = spectral_estimate(window, BASELINE_MODE_COUNT);
        let baseline = Arc::new(Baseline {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
            peak_frequencies: est.peak_frequencies,
            damping_ratios: est.damping_ratios,
            sensor_rms: est.sensor_rms,
            description: description.to_string(),
        });
        self.baselines.write().push(baseline.clone());
        tracing::info!(
            baseline_id = %baseline.id,
            name = %baseline.name,
            modes = baseline.peak_frequencies.len(),
            "baseline marked"
        );
        baseline
    }

    /// Repoint the active reference. The active baseline is unchanged when
    /// the id is unknown.
    pub fn select(&self, id: Uuid) -> CoreResult<Arc<Baseline>> {
        let found = self
            .baselines
            .read()
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(CoreError::BaselineNotFound(id))?;
        *self.active.write() = Some(found.clone());
        tracing::info!(baseline_id = %id, "baseline selected");
        Ok(found)
    }

    /// All baselines in creation order.
    pub fn list(&self) -> Vec<Arc<Baseline>> {
        self.baselines.read().clone()
    }

    /// Snapshot of the active baseline at the moment of the call.
    pub fn active(&self) -> Option<Arc<Baseline>> {
        self.active.read().clone()
    }

    /// Compare a window against the baseline active when the call began.
    pub fn compare_active(&self, window: &Window) -> Option<ComparativeResult> {
        let snapshot = self.active()?;
        Some(compare(window, &snapshot))
    }
}
