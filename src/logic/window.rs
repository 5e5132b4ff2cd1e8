//! Window Buffer - accumulates per-sensor samples into fixed-duration windows.
//!
//! One append-only ring per sensor channel. Windows are cut on logical-time
//! boundaries so all sensors contribute samples from the same range; a window
//! is emitted only when every expected sensor has reached the minimum sample
//! count, and partial windows are discarded after a grace timeout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::WindowConfig;
use crate::constants::OUT_OF_ORDER_TOLERANCE_SECS;
use crate::error::{CoreError, CoreResult};

/// Acceleration samples above this are physically implausible and rejected.
const MAX_PLAUSIBLE_G: f64 = 200.0;

/// One timestamped multi-axis reading. Immutable once ingested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SensorSample {
    pub sensor_id: u16,
    /// Epoch seconds.
    pub timestamp: f64,
    /// Acceleration in g.
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl SensorSample {
    /// Magnitude of the acceleration vector.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A fixed-duration batch of multi-sensor samples processed as one unit.
#[derive(Debug, Clone)]
pub struct Window {
    pub start_ts: f64,
    pub end_ts: f64,
    pub sample_rate_hz: f64,
    pub sensors: BTreeMap<u16, Vec<SensorSample>>,
}

impl Window {
    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Total samples across all sensors.
    pub fn sample_count(&self) -> usize {
        self.sensors.values().map(Vec::len).sum()
    }

    pub fn sensor_ids(&self) -> Vec<u16> {
        self.sensors.keys().copied().collect()
    }

    /// Acceleration magnitude series for one sensor, in timestamp order.
    pub fn magnitude_series(&self, sensor_id: u16) -> Vec<f64> {
        self.sensors
            .get(&sensor_id)
            .map(|samples| samples.iter().map(SensorSample::magnitude).collect())
            .unwrap_or_default()
    }

    /// Magnitude series with the window mean removed (for spectral analysis).
    pub fn detrended_series(&self, sensor_id: u16) -> Vec<f64> {
        let series = self.magnitude_series(sensor_id);
        if series.is_empty() {
            return series;
        }
        let mean = series.iter().sum::<f64>() / series.len() as f64;
        series.into_iter().map(|v| v - mean).collect()
    }
}

/// Accumulates samples and cuts windows on time boundaries.
pub struct WindowBuffer {
    cfg: WindowConfig,
    window_start: Option<f64>,
    pending: BTreeMap<u16, Vec<SensorSample>>,
    /// Samples past the current boundary, replayed into the next window.
    carry: Vec<SensorSample>,
    /// Arrival time of the newest accepted sample; drives the wall-clock
    /// stale sweep for streams that stop sending.
    last_ingest: Option<std::time::Instant>,
}

impl WindowBuffer {
    pub fn new(cfg: WindowConfig) -> Self {
        Self {
            cfg,
            window_start: None,
            pending: BTreeMap::new(),
            carry: Vec::new(),
            last_ingest: None,
        }
    }

    /// Feed one sample; returns a completed window when a boundary is crossed
    /// and every expected sensor has enough samples.
    pub fn ingest(&mut self, sample: SensorSample) -> CoreResult<Option<Window>> {
        self.validate(&sample)?;
        self.last_ingest = Some(std::time::Instant::now());

        let start = *self.window_start.get_or_insert(sample.timestamp);
        if sample.timestamp < start - OUT_OF_ORDER_TOLERANCE_SECS {
            return Err(CoreError::TransientInput(format!(
                "sample for S{} is {:.2}s behind the current window",
                sample.sensor_id,
                start - sample.timestamp
            )));
        }

        let end = start + self.cfg.window_secs;
        if sample.timestamp < end {
            self.pending.entry(sample.sensor_id).or_default().push(sample);
            return Ok(None);
        }

        // Boundary crossed; the sample belongs to a later window.
        self.carry.push(sample);

        if self.is_complete() {
            let next_start = if self.cfg.overlap_fraction > 0.0 {
                start + self.cfg.window_secs * (1.0 - self.cfg.overlap_fraction)
            } else {
                end
            };
            let window = self.cut_window(start, end, next_start);
            self.window_start = Some(next_start);
            self.replay_carry(next_start);
            return Ok(Some(window));
        }

        if sample.timestamp - start > self.cfg.stale_timeout_secs {
            self.discard_stale(start);
        }
        Ok(None)
    }

    /// Timer-driven stale check; discards a partial window whose stream went
    /// quiet. Uses arrival time, not sample timestamps, so a gateway with a
    /// skewed data clock is not penalized.
    pub fn sweep(&mut self) {
        let elapsed = self
            .last_ingest
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.sweep_elapsed(elapsed);
    }

    fn sweep_elapsed(&mut self, elapsed_secs: f64) {
        if elapsed_secs <= self.cfg.stale_timeout_secs {
            return;
        }
        if let Some(start) = self.window_start {
            if !self.pending.is_empty() {
                self.discard_stale(start);
            }
        }
    }

    /// Drop all buffered state (session cancellation).
    pub fn release(&mut self) {
        self.pending.clear();
        self.carry.clear();
        self.window_start = None;
    }

    /// Per-sensor counts for the in-progress window.
    pub fn pending_counts(&self) -> BTreeMap<u16, usize> {
        self.pending.iter().map(|(&id, v)| (id, v.len())).collect()
    }

    fn validate(&self, sample: &SensorSample) -> CoreResult<()> {
        if !sample.timestamp.is_finite() {
            return Err(CoreError::TransientInput("non-finite timestamp".into()));
        }
        for (axis, v) in [("x", sample.x), ("y", sample.y), ("z", sample.z)] {
            if !v.is_finite() || v.abs() > MAX_PLAUSIBLE_G {
                return Err(CoreError::TransientInput(format!(
                    "S{} {} axis out of range: {}",
                    sample.sensor_id, axis, v
                )));
            }
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.cfg.expected_sensors.iter().all(|id| {
            self.pending
                .get(id)
                .map(|v| v.len() >= self.cfg.min_samples)
                .unwrap_or(false)
        })
    }

    fn cut_window(&mut self, start: f64, end: f64, next_start: f64) -> Window {
        let mut sensors = std::mem::take(&mut self.pending);
        for samples in sensors.values_mut() {
            samples.sort_by(|a, b| {
                a.timestamp
                    .partial_cmp(&b.timestamp)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        // Overlap region stays buffered for the next window
        if next_start < end {
            for (id, samples) in &sensors {
                let retained: Vec<SensorSample> = samples
                    .iter()
                    .filter(|s| s.timestamp >= next_start)
                    .copied()
                    .collect();
                if !retained.is_empty() {
                    self.pending.insert(*id, retained);
                }
            }
        }
        Window {
            start_ts: start,
            end_ts: end,
            sample_rate_hz: self.cfg.sample_rate_hz,
            sensors,
        }
    }

    fn discard_stale(&mut self, start: f64) {
        let (worst_id, worst_have) = self
            .cfg
            .expected_sensors
            .iter()
            .map(|&id| (id, self.pending.get(&id).map(Vec::len).unwrap_or(0)))
            .min_by_key(|&(_, have)| have)
            .unwrap_or((0, 0));
        warn!(
            sensor_id = worst_id,
            have = worst_have,
            need = self.cfg.min_samples,
            window_start = start,
            "discarding stale partial window"
        );
        self.pending.clear();

        let next_start = self
            .carry
            .iter()
            .map(|s| s.timestamp)
            .fold(f64::INFINITY, f64::min);
        if next_start.is_finite() {
            self.window_start = Some(next_start);
            self.replay_carry(next_start);
        } else {
            self.window_start = None;
        }
    }

    fn replay_carry(&mut self, window_start: f64) {
        let end = window_start + self.cfg.window_secs;
        let carried = std::mem::take(&mut self.carry);
        for sample in carried {
            if sample.timestamp < window_start {
                continue;
            }
            if sample.timestamp < end {
                self.pending.entry(sample.sensor_id).or_default().push(sample);
            } else {
                self.carry.push(sample);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cfg() -> WindowConfig {
        WindowConfig {
            window_secs: 2.0,
            overlap_fraction: 0.0,
            sample_rate_hz: 100.0,
            min_samples: 10,
            stale_timeout_secs: 4.0,
            expected_sensors: vec![1, 2],
        }
    }

    fn sample(sensor_id: u16, timestamp: f64) -> SensorSample {
        SensorSample {
            sensor_id,
            timestamp,
            x: 0.01,
            y: 0.0,
            z: 1.0,
        }
    }

    fn fill(buf: &mut WindowBuffer, t0: f64, t1: f64, dt: f64) -> Option<Window> {
        let mut out = None;
        let mut t = t0;
        while t < t1 {
            for id in [1u16, 2] {
                if let Some(w) = buf.ingest(sample(id, t)).unwrap() {
                    out = Some(w);
                }
            }
            t += dt;
        }
        out
    }

    #[test]
    fn test_window_emitted_when_all_sensors_complete() {
        let mut buf = WindowBuffer::new(test_cfg());
        assert!(fill(&mut buf, 0.0, 2.0, 0.05).is_none());

        // First sample past the boundary triggers the cut
        let w = buf.ingest(sample(1, 2.01)).unwrap().unwrap();
        assert_eq!(w.start_ts, 0.0);
        assert_eq!(w.end_ts, 2.0);
        assert_eq!(w.sensor_count(), 2);
        assert!(w.sensors[&1].len() >= 10);
    }

    #[test]
    fn test_partial_window_is_retained_not_emitted() {
        let mut buf = WindowBuffer::new(test_cfg());
        // Only sensor 1 reports
        for i in 0..40 {
            buf.ingest(sample(1, i as f64 * 0.05)).unwrap();
        }
        // Boundary crossed but sensor 2 never contributed
        assert!(buf.ingest(sample(1, 2.1)).unwrap().is_none());
        assert!(!buf.pending_counts().contains_key(&2));
    }

    #[test]
    fn test_stale_partial_window_discarded() {
        let mut buf = WindowBuffer::new(test_cfg());
        for i in 0..40 {
            buf.ingest(sample(1, i as f64 * 0.05)).unwrap();
        }
        // Far past the stale timeout; partial data is dropped
        assert!(buf.ingest(sample(1, 10.0)).unwrap().is_none());
        let counts = buf.pending_counts();
        assert!(counts.get(&1).copied().unwrap_or(0) <= 1);
    }

    #[test]
    fn test_sweep_discards_stale_window() {
        let mut buf = WindowBuffer::new(test_cfg());
        buf.ingest(sample(1, 0.0)).unwrap();
        buf.sweep_elapsed(100.0);
        assert!(buf.pending_counts().is_empty());
    }

    #[test]
    fn test_sweep_keeps_fresh_window() {
        let mut buf = WindowBuffer::new(test_cfg());
        buf.ingest(sample(1, 0.0)).unwrap();
        buf.sweep();
        assert_eq!(buf.pending_counts().get(&1), Some(&1));
    }

    #[test]
    fn test_out_of_order_sample_rejected() {
        let mut buf = WindowBuffer::new(test_cfg());
        buf.ingest(sample(1, 100.0)).unwrap();
        let err = buf.ingest(sample(1, 50.0)).unwrap_err();
        assert!(matches!(err, CoreError::TransientInput(_)));
    }

    #[test]
    fn test_non_finite_sample_rejected() {
        let mut buf = WindowBuffer::new(test_cfg());
        let mut s = sample(1, 0.0);
        s.z = f64::NAN;
        assert!(buf.ingest(s).is_err());
        s.z = 1.0;
        s.timestamp = f64::INFINITY;
        assert!(buf.ingest(s).is_err());
    }

    #[test]
    fn test_consecutive_windows_do_not_overlap_by_default() {
        let mut buf = WindowBuffer::new(test_cfg());
        let w1 = {
            let _ = fill(&mut buf, 0.0, 2.0, 0.05);
            buf.ingest(sample(1, 2.0)).unwrap().unwrap()
        };
        let w2 = {
            let _ = fill(&mut buf, 2.05, 4.0, 0.05);
            buf.ingest(sample(1, 4.0)).unwrap().unwrap()
        };
        assert_eq!(w1.end_ts, w2.start_ts);
    }

    #[test]
    fn test_overlap_fraction_shifts_next_start() {
        let mut cfg = test_cfg();
        cfg.overlap_fraction = 0.5;
        let mut buf = WindowBuffer::new(cfg);
        let _ = fill(&mut buf, 0.0, 2.0, 0.05);
        let w = buf.ingest(sample(1, 2.0)).unwrap().unwrap();
        assert_eq!(w.start_ts, 0.0);
        // Next window starts half a window back from the boundary
        assert_eq!(buf.window_start, Some(1.0));
    }

    #[test]
    fn test_release_clears_state() {
        let mut buf = WindowBuffer::new(test_cfg());
        let _ = fill(&mut buf, 0.0, 1.0, 0.05);
        buf.release();
        assert!(buf.pending_counts().is_empty());
        assert!(buf.window_start.is_none());
    }

    #[test]
    fn test_magnitude() {
        let s = SensorSample {
            sensor_id: 1,
            timestamp: 0.0,
            x: 3.0,
            y: 4.0,
            z: 0.0,
        };
        assert!((s.magnitude() - 5.0).abs() < 1e-12);
    }
}
