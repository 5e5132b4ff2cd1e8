//! Alert Dispatcher - threshold rules with dedup, debounce and auto-expiry.
//!
//! Rules are re-evaluated on every completed window. Debounce state is keyed
//! by (kind, severity) with explicit expiry timestamps, swept at the start of
//! each evaluation tick. State is per dispatcher instance; concurrent
//! sessions get independent dispatchers.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::baseline::ComparativeResult;
use crate::logic::detector::AnomalyResult;
use crate::logic::quality::QcResult;

/// Heatmap entries above this raise an energy-anomaly warning.
const ENERGY_WARN_LEVEL: f64 = 0.7;

/// Frequency shifts above this percent raise an alert.
const FREQ_SHIFT_ALERT_PCT: f64 = 5.0;

/// Jitter at or above this raises a warning, in ms.
const JITTER_WARN_MS: f64 = 5.0;

/// Semantic alert identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Jitter,
    Clipping,
    FreqShift,
    Energy,
    Anomaly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warn,
    Alert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct AlertDispatcher {
    ttl: Duration,
    active: HashMap<(AlertKind, Severity), Alert>,
}

impl AlertDispatcher {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            active: HashMap::new(),
        }
    }

    /// Evaluate all rules for one window and return the newly emitted alerts.
    ///
    /// An alert already active with an identical message only has its expiry
    /// refreshed and is not re-emitted; a changed message replaces it.
    pub fn evaluate(
        &mut self,
        now: DateTime<Utc>,
        qc: &QcResult,
        anomaly: &AnomalyResult,
        comparative: Option<&ComparativeResult>,
    ) -> Vec<Alert> {
        self.sweep(now);

        let mut emitted = Vec::new();
        for (kind, severity, message) in self.candidates(qc, anomaly, comparative) {
            let key = (kind, severity);
            match self.active.get_mut(&key) {
                Some(existing) if existing.message == message => {
                    existing.expires_at = now + self.ttl;
                }
                _ => {
                    let alert = Alert {
                        kind,
                        severity,
                        message,
                        created_at: now,
                        expires_at: now + self.ttl,
                    };
                    self.active.insert(key, alert.clone());
                    emitted.push(alert);
                }
            }
        }
        emitted
    }

    /// Alerts that have not yet expired.
    pub fn active_alerts(&self, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .active
            .values()
            .filter(|a| a.expires_at > now)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        alerts
    }

    fn sweep(&mut self, now: DateTime<Utc>) {
        self.active.retain(|_, alert| alert.expires_at > now);
    }

    fn candidates(
        &self,
        qc: &QcResult,
        anomaly: &AnomalyResult,
        comparative: Option<&ComparativeResult>,
    ) -> Vec<(AlertKind, Severity, String)> {
        let mut out = Vec::new();

        if qc.jitter_ms >= JITTER_WARN_MS {
            out.push((
                AlertKind::Jitter,
                Severity::Warn,
                format!("high jitter: {:.1} ms", qc.jitter_ms),
            ));
        }

        if !qc.clipped_sensors.is_empty() {
            let sensors = qc
                .clipped_sensors
                .iter()
                .map(|id| format!("S{}", id))
                .collect::<Vec<_>>()
                .join(", ");
            out.push((
                AlertKind::Clipping,
                Severity::Alert,
                format!("clipping on {}", sensors),
            ));
        }

        if let Some(comp) = comparative {
            if let Some(max_shift) = comp.max_shift_pct() {
                if max_shift.abs() > FREQ_SHIFT_ALERT_PCT {
                    out.push((
                        AlertKind::FreqShift,
                        Severity::Alert,
                        format!("frequency shift {:.1}%", max_shift),
                    ));
                }
            }

            let hot: Vec<String> = comp
                .heatmap
                .iter()
                .filter(|e| e.score > ENERGY_WARN_LEVEL)
                .map(|e| format!("S{}", e.sensor_id))
                .collect();
            if !hot.is_empty() {
                out.push((
                    AlertKind::Energy,
                    Severity::Warn,
                    format!("energy anomaly on {}", hot.join(", ")),
                ));
            }
        }

        if anomaly.is_anomaly {
            out.push((
                AlertKind::Anomaly,
                Severity::Alert,
                format!("anomaly detected (score {:.2})", anomaly.anomaly_score),
            ));
        }

        out
    }
}
