//! Shared helpers for unit and integration tests.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::logic::window::{SensorSample, Window};

/// A window of five sensors riding a 1 g gravity offset, each carrying one
/// sinusoidal vibration component at `base_freq_hz` (same tone on every
/// sensor unless `spread_hz` staggers them).
pub fn synth_window(
    sensor_ids: &[u16],
    n: usize,
    sample_rate: f64,
    base_freq_hz: f64,
    spread_hz: f64,
) -> Window {
    let mut sensors = BTreeMap::new();
    for (k, &id) in sensor_ids.iter().enumerate() {
        let freq = base_freq_hz + k as f64 * spread_hz;
        let samples: Vec<SensorSample> = (0..n)
            .map(|i| {
                let t = i as f64 / sample_rate;
                SensorSample {
                    sensor_id: id,
                    timestamp: t,
                    x: 0.0,
                    y: 0.0,
                    z: 1.0 + 0.05 * (2.0 * PI * freq * t).sin(),
                }
            })
            .collect();
        sensors.insert(id, samples);
    }
    Window {
        start_ts: 0.0,
        end_ts: n as f64 / sample_rate,
        sample_rate_hz: sample_rate,
        sensors,
    }
}
