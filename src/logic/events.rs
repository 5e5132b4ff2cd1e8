//! Wire events - tagged unions for both directions of the stream.
//!
//! Inbound and outbound payloads are closed enums dispatched by exhaustive
//! matching; the serde tag keeps the wire shape a flat JSON object with an
//! "event"/"type" discriminator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::alerts::Alert;
use crate::logic::baseline::{Baseline, ComparativeResult};
use crate::logic::detector::AnomalyResult;
use crate::logic::quality::QcResult;

/// Per-sensor summary derived from the feature vector, for charting clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSummary {
    pub sensor_id: u16,
    pub rms: f32,
    pub peak_frequency_hz: f32,
}

/// Derived metrics carried on every window result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowMetrics {
    pub feature_version: u8,
    pub layout_hash: u32,
    pub features: Vec<f32>,
    pub sensors: Vec<SensorSummary>,
}

/// Compact baseline description for list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub peak_frequencies: Vec<f64>,
    pub description: String,
}

impl From<&Baseline> for BaselineSummary {
    fn from(b: &Baseline) -> Self {
        Self {
            id: b.id,
            name: b.name.clone(),
            created_at: b.created_at,
            peak_frequencies: b.peak_frequencies.clone(),
            description: b.description.clone(),
        }
    }
}

/// One message per completed window, plus discrete control events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundEvent {
    WindowResult {
        ts: f64,
        qc: QcResult,
        metrics: WindowMetrics,
        #[serde(skip_serializing_if = "Option::is_none")]
        comparative: Option<ComparativeResult>,
        ml_anomaly: AnomalyResult,
        alerts: Vec<Alert>,
    },
    BaselineMarked {
        baseline_id: Uuid,
        name: String,
    },
    BaselineSelected {
        baseline_id: Uuid,
    },
    BaselineList {
        baselines: Vec<BaselineSummary>,
    },
    Error {
        message: String,
    },
}

/// Messages arriving on the stream: samples plus baseline control ops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Sample {
        sensor_id: u16,
        timestamp: f64,
        x: f64,
        y: f64,
        z: f64,
    },
    MarkBaseline {
        name: String,
        #[serde(default)]
        description: String,
    },
    SelectBaseline {
        baseline_id: Uuid,
    },
    ListBaselines,
}
