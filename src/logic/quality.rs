//! Quality Evaluator - per-window QC metrics from raw samples.
//!
//! Jitter, clipping and SNR are computed on every completed window before
//! feature extraction. Band classification is total: every value maps to
//! exactly one band.

use serde::{Deserialize, Serialize};

use crate::constants::CLIPPING_RUN_LENGTH;
use crate::logic::features::spectral::{detect_peaks, power_spectral_density, hann_window};
use crate::logic::window::Window;

/// SNR values are capped here when the noise estimate vanishes.
const SNR_CAP_DB: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterBand {
    Excellent,
    Good,
    Warn,
    Critical,
}

impl JitterBand {
    /// <1 excellent, <3 good, <5 warn, >=5 critical.
    pub fn classify(jitter_ms: f64) -> Self {
        if jitter_ms < 1.0 {
            JitterBand::Excellent
        } else if jitter_ms < 3.0 {
            JitterBand::Good
        } else if jitter_ms < 5.0 {
            JitterBand::Warn
        } else {
            JitterBand::Critical
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnrBand {
    Excellent,
    Good,
    Poor,
}

impl SnrBand {
    /// >30 excellent, >20 good, else poor.
    pub fn classify(snr_db: f64) -> Self {
        if snr_db > 30.0 {
            SnrBand::Excellent
        } else if snr_db > 20.0 {
            SnrBand::Good
        } else {
            SnrBand::Poor
        }
    }
}

/// Per-window QC result. Derived from one window, not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcResult {
    pub jitter_ms: f64,
    pub jitter_band: JitterBand,
    pub clipped_sensors: Vec<u16>,
    pub snr_db: f64,
    pub snr_band: SnrBand,
}

pub struct QualityEvaluator {
    full_scale_g: f64,
}

impl QualityEvaluator {
    pub fn new(full_scale_g: f64) -> Self {
        Self { full_scale_g }
    }

    pub fn evaluate(&self, window: &Window) -> QcResult {
        let jitter_ms = self.worst_jitter_ms(window);
        let clipped_sensors = self.clipped_sensors(window);
        let snr_db = self.mean_snr_db(window);

        QcResult {
            jitter_ms,
            jitter_band: JitterBand::classify(jitter_ms),
            clipped_sensors,
            snr_db,
            snr_band: SnrBand::classify(snr_db),
        }
    }

    /// Worst per-sensor standard deviation of inter-sample deltas, in ms.
    fn worst_jitter_ms(&self, window: &Window) -> f64 {
        window
            .sensors
            .values()
            .filter_map(|samples| {
                if samples.len() < 3 {
                    return None;
                }
                let deltas: Vec<f64> = samples
                    .windows(2)
                    .map(|pair| (pair[1].timestamp - pair[0].timestamp) * 1000.0)
                    .collect();
                let n = deltas.len() as f64;
                let mean = deltas.iter().sum::<f64>() / n;
                let var = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
                Some(var.sqrt())
            })
            .fold(0.0_f64, f64::max)
    }

    /// Sensors with a run of consecutive samples saturated at full scale.
    fn clipped_sensors(&self, window: &Window) -> Vec<u16> {
        let limit = self.full_scale_g * 0.995;
        window
            .sensors
            .iter()
            .filter_map(|(&id, samples)| {
                let mut run = 0usize;
                for s in samples {
                    let saturated =
                        s.x.abs() >= limit || s.y.abs() >= limit || s.z.abs() >= limit;
                    if saturated {
                        run += 1;
                        if run >= CLIPPING_RUN_LENGTH {
                            return Some(id);
                        }
                    } else {
                        run = 0;
                    }
                }
                None
            })
            .collect()
    }

    /// In-band power around detected peaks vs. the residual floor, in dB,
    /// averaged across sensors.
    fn mean_snr_db(&self, window: &Window) -> f64 {
        let mut snrs = Vec::new();
        for &id in window.sensor_ids().iter() {
            let detrended = window.detrended_series(id);
            if detrended.len() < 8 {
                continue;
            }
            let psd = power_spectral_density(&hann_window(&detrended));
            let peaks = detect_peaks(&psd, window.sample_rate_hz, 3);
            if peaks.is_empty() {
                snrs.push(0.0);
                continue;
            }

            let mut in_band = vec![false; psd.len()];
            for peak in &peaks {
                let lo = peak.bin.saturating_sub(2);
                let hi = (peak.bin + 2).min(psd.len() - 1);
                for flag in &mut in_band[lo..=hi] {
                    *flag = true;
                }
            }

            let mut signal = 0.0;
            let mut noise = 0.0;
            for (k, &p) in psd.iter().enumerate() {
                if in_band[k] {
                    signal += p;
                } else if k > 0 {
                    noise += p;
                }
            }

            let snr = if noise > 1e-18 {
                (10.0 * (signal / noise).log10()).min(SNR_CAP_DB)
            } else {
                SNR_CAP_DB
            };
            snrs.push(snr);
        }

        if snrs.is_empty() {
            0.0
        } else {
            snrs.iter().sum::<f64>() / snrs.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::window::SensorSample;
    use std::collections::BTreeMap;
    use std::f64::consts::PI;

    fn window_from(samples_per_sensor: Vec<(u16, Vec<SensorSample>)>) -> Window {
        let mut sensors = BTreeMap::new();
        for (id, samples) in samples_per_sensor {
            sensors.insert(id, samples);
        }
        Window {
            start_ts: 0.0,
            end_ts: 8.0,
            sample_rate_hz: 100.0,
            sensors,
        }
    }

    fn clean_series(id: u16, n: usize, jitter_s: f64) -> Vec<SensorSample> {
        (0..n)
            .map(|i| {
                let jitter = if i % 2 == 0 { jitter_s } else { -jitter_s };
                let t = i as f64 / 100.0 + jitter;
                // 12.5 Hz sits on an exact FFT bin at 100 Hz / 1024 points,
                // keeping spectral leakage out of the SNR assertions
                SensorSample {
                    sensor_id: id,
                    timestamp: t,
                    x: 0.0,
                    y: 0.0,
                    z: 1.0 + 0.05 * (2.0 * PI * 12.5 * t).sin(),
                }
            })
            .collect()
    }

    #[test]
    fn test_jitter_bands_are_total_and_exclusive() {
        for (value, band) in [
            (0.0, JitterBand::Excellent),
            (0.4, JitterBand::Excellent),
            (0.999, JitterBand::Excellent),
            (1.0, JitterBand::Good),
            (2.9, JitterBand::Good),
            (3.0, JitterBand::Warn),
            (4.99, JitterBand::Warn),
            (5.0, JitterBand::Critical),
            (50.0, JitterBand::Critical),
        ] {
            assert_eq!(JitterBand::classify(value), band, "value {}", value);
        }
    }

    #[test]
    fn test_snr_bands_are_total_and_exclusive() {
        for (value, band) in [
            (45.0, SnrBand::Excellent),
            (30.1, SnrBand::Excellent),
            (30.0, SnrBand::Good),
            (20.1, SnrBand::Good),
            (20.0, SnrBand::Poor),
            (-3.0, SnrBand::Poor),
        ] {
            assert_eq!(SnrBand::classify(value), band, "value {}", value);
        }
    }

    #[test]
    fn test_low_jitter_window_is_excellent() {
        // ~0.4 ms timing wobble
        let w = window_from(vec![
            (1, clean_series(1, 512, 0.0002)),
            (2, clean_series(2, 512, 0.0002)),
        ]);
        let qc = QualityEvaluator::new(16.0).evaluate(&w);
        assert!(qc.jitter_ms < 1.0, "jitter {}", qc.jitter_ms);
        assert_eq!(qc.jitter_band, JitterBand::Excellent);
    }

    #[test]
    fn test_high_jitter_window_is_critical() {
        let w = window_from(vec![(1, clean_series(1, 512, 0.004))]);
        let qc = QualityEvaluator::new(16.0).evaluate(&w);
        assert!(qc.jitter_ms >= 5.0, "jitter {}", qc.jitter_ms);
        assert_eq!(qc.jitter_band, JitterBand::Critical);
    }

    #[test]
    fn test_clipping_detected_on_saturated_run() {
        let mut clipped = clean_series(3, 512, 0.0);
        for s in clipped.iter_mut().skip(100).take(5) {
            s.z = 16.0;
        }
        let w = window_from(vec![
            (1, clean_series(1, 512, 0.0)),
            (3, clipped),
        ]);
        let qc = QualityEvaluator::new(16.0).evaluate(&w);
        assert_eq!(qc.clipped_sensors, vec![3]);
    }

    #[test]
    fn test_isolated_saturated_sample_is_not_clipping() {
        let mut series = clean_series(1, 512, 0.0);
        series[100].z = 16.0;
        series[200].z = -16.0;
        let w = window_from(vec![(1, series)]);
        let qc = QualityEvaluator::new(16.0).evaluate(&w);
        assert!(qc.clipped_sensors.is_empty());
    }

    #[test]
    fn test_clean_tone_has_good_snr() {
        let w = window_from(vec![(1, clean_series(1, 1024, 0.0))]);
        let qc = QualityEvaluator::new(16.0).evaluate(&w);
        assert!(qc.snr_db > 20.0, "snr {}", qc.snr_db);
        assert_ne!(qc.snr_band, SnrBand::Poor);
    }
}
