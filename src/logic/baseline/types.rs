//! Baseline data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored reference spectral/damping fingerprint of a known-healthy state.
/// Immutable after creation; many may coexist, one is active per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Modal peak frequencies in Hz, ascending.
    pub peak_frequencies: Vec<f64>,
    /// Damping ratio per mode, same order as `peak_frequencies`.
    pub damping_ratios: Vec<f64>,
    /// Per-sensor reference vibration RMS captured at mark time; feeds the
    /// comparative energy heatmap.
    pub sensor_rms: Vec<(u16, f64)>,
    pub description: String,
}

/// Severity banding for a per-peak frequency shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftSeverity {
    Ok,
    Warn,
    Alert,
}

impl ShiftSeverity {
    /// |shift| > 5% alert, > 2% warn, else ok.
    pub fn classify(shift_pct: f64) -> Self {
        let s = shift_pct.abs();
        if s > 5.0 {
            ShiftSeverity::Alert
        } else if s > 2.0 {
            ShiftSeverity::Warn
        } else {
            ShiftSeverity::Ok
        }
    }
}

/// One sensor's energy-anomaly entry in the comparative heatmap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorAnomaly {
    pub sensor_id: u16,
    /// Energy deviation from the baseline reference, in [0, 1].
    pub score: f64,
}

/// Live window vs. active baseline. Absent when no baseline is selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparativeResult {
    /// Per-peak frequency shift percent, baseline order.
    pub delta_f_pct: Vec<f64>,
    /// Per-mode damping ratio delta, baseline order.
    pub damping_delta: Vec<f64>,
    pub heatmap: Vec<SensorAnomaly>,
    /// Overall agreement with the baseline, in [0, 1].
    pub quality: f64,
}

impl ComparativeResult {
    /// Largest absolute frequency shift, if any peak matched.
    pub fn max_shift_pct(&self) -> Option<f64> {
        self.delta_f_pct
            .iter()
            .copied()
            .max_by(|a, b| {
                a.abs()
                    .partial_cmp(&b.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}
