//! Feature extraction: one window in, one 156-slot vector out.
//!
//! Extraction is deterministic and pure. The per-sensor blocks are filled in
//! sensor-id order; the cross-sensor aggregates and zeroed reserved slots
//! follow. Output order is the layout contract checked against the loaded
//! model at startup.

pub mod layout;
pub mod spectral;
pub mod time_domain;
pub mod vector;
pub mod wavelet;

pub use layout::{FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
pub use vector::FeatureVector;

use crate::error::{CoreError, CoreResult};
use crate::logic::window::Window;
use layout::{sensor_feature_index, CROSS_SENSOR_OFFSET, SENSOR_SLOTS};
use spectral::SpectralFeatures;
use time_domain::TimeDomainFeatures;
use wavelet::WaveletEnergies;

/// Shortest series the feature formulas accept (3-level wavelet floor).
const MIN_SERIES_LEN: usize = 16;

/// Extract the full feature vector from a completed window.
///
/// Fails with a schema mismatch when the window shape deviates from the
/// layout's assumptions; that error class halts the session.
pub fn extract(window: &Window) -> CoreResult<FeatureVector> {
    if window.sensor_count() != SENSOR_SLOTS {
        return Err(CoreError::FeatureSchemaMismatch {
            detail: format!(
                "layout assumes {} sensors, window has {}",
                SENSOR_SLOTS,
                window.sensor_count()
            ),
        });
    }

    let mut fv = FeatureVector::new();
    let mut rms_values = Vec::with_capacity(SENSOR_SLOTS);
    let mut peak_freqs = Vec::with_capacity(SENSOR_SLOTS);

    for (slot, sensor_id) in window.sensor_ids().into_iter().enumerate() {
        let series = window.magnitude_series(sensor_id);
        if series.len() < MIN_SERIES_LEN {
            return Err(CoreError::FeatureSchemaMismatch {
                detail: format!(
                    "sensor S{} has {} samples, formulas need at least {}",
                    sensor_id,
                    series.len(),
                    MIN_SERIES_LEN
                ),
            });
        }
        let detrended = window.detrended_series(sensor_id);

        let td = TimeDomainFeatures::compute(&series);
        let sp = SpectralFeatures::compute(&detrended, window.sample_rate_hz);
        let wv = WaveletEnergies::compute(&detrended);

        let base = |offset| sensor_feature_index(slot, offset);
        fv.set(base(0), td.rms as f32);
        fv.set(base(1), td.peak_to_peak as f32);
        fv.set(base(2), td.kurtosis as f32);
        fv.set(base(3), td.skewness as f32);
        fv.set(base(4), td.crest_factor as f32);
        fv.set(base(5), td.shape_factor as f32);
        fv.set(base(6), td.impulse_factor as f32);

        fv.set(base(7), sp.centroid_hz as f32);
        fv.set(base(8), sp.entropy as f32);
        fv.set(base(9), sp.total_energy as f32);
        fv.set(base(10), sp.band_energies[0] as f32);
        fv.set(base(11), sp.band_energies[1] as f32);
        fv.set(base(12), sp.band_energies[2] as f32);
        fv.set(base(13), sp.band_energies[3] as f32);
        fv.set(base(14), sp.peak_frequency_hz as f32);
        fv.set(base(15), sp.peak_power as f32);

        fv.set(base(16), wv.d1 as f32);
        fv.set(base(17), wv.d2 as f32);
        fv.set(base(18), wv.d3 as f32);
        fv.set(base(19), wv.a3 as f32);

        rms_values.push(td.rms);
        peak_freqs.push(sp.peak_frequency_hz);
    }

    let (rms_mean, rms_std) = mean_std(&rms_values);
    let (pf_mean, pf_std) = mean_std(&peak_freqs);
    fv.set(CROSS_SENSOR_OFFSET, rms_mean as f32);
    fv.set(CROSS_SENSOR_OFFSET + 1, rms_std as f32);
    fv.set(CROSS_SENSOR_OFFSET + 2, pf_mean as f32);
    fv.set(CROSS_SENSOR_OFFSET + 3, pf_std as f32);

    // Reserved slots stay zero at inference time.
    Ok(fv)
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::window::SensorSample;
    use std::collections::BTreeMap;
    use std::f64::consts::PI;

    pub(crate) fn synth_window(sensor_ids: &[u16], n: usize, sample_rate: f64) -> Window {
        let mut sensors = BTreeMap::new();
        for (k, &id) in sensor_ids.iter().enumerate() {
            let freq = 8.0 + k as f64 * 2.0;
            let samples: Vec<SensorSample> = (0..n)
                .map(|i| {
                    let t = i as f64 / sample_rate;
                    // 1 g gravity offset plus a small vibration component
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

    #[test]
    fn test_extract_length_and_layout() {
        let window = synth_window(&[1, 2, 3, 4, 5], 512, 100.0);
        let fv = extract(&window).unwrap();
        assert_eq!(fv.values.len(), FEATURE_COUNT);
        assert!(fv.validate().is_ok());
    }

    #[test]
    fn test_extract_is_deterministic() {
        let window = synth_window(&[1, 2, 3, 4, 5], 512, 100.0);
        let a = extract(&window).unwrap();
        let b = extract(&window).unwrap();
        assert_eq!(a.values, b.values);
    }

    #[test]
    fn test_extract_wrong_sensor_count_is_fatal() {
        let window = synth_window(&[1, 2, 3], 512, 100.0);
        let err = extract(&window).unwrap_err();
        assert!(err.is_fatal_for_session());
    }

    #[test]
    fn test_extract_short_series_is_fatal() {
        let window = synth_window(&[1, 2, 3, 4, 5], 8, 100.0);
        let err = extract(&window).unwrap_err();
        assert!(matches!(err, CoreError::FeatureSchemaMismatch { .. }));
    }

    #[test]
    fn test_per_sensor_peak_frequency_lands_in_its_slot() {
        let window = synth_window(&[1, 2, 3, 4, 5], 1024, 100.0);
        let fv = extract(&window).unwrap();
        // Sensor slot 0 was synthesized at 8 Hz, slot 4 at 16 Hz
        let pf0 = fv.get_by_name("s1_peak_frequency").unwrap() as f64;
        let pf4 = fv.get_by_name("s5_peak_frequency").unwrap() as f64;
        assert!((pf0 - 8.0).abs() < 0.5, "got {}", pf0);
        assert!((pf4 - 16.0).abs() < 0.5, "got {}", pf4);
    }

    #[test]
    fn test_cross_sensor_aggregates() {
        let window = synth_window(&[1, 2, 3, 4, 5], 1024, 100.0);
        let fv = extract(&window).unwrap();
        let pf_mean = fv.get_by_name("peak_freq_mean").unwrap() as f64;
        // Sensors at 8, 10, 12, 14, 16 Hz -> mean 12
        assert!((pf_mean - 12.0).abs() < 0.5, "got {}", pf_mean);
        assert!(fv.get_by_name("peak_freq_std").unwrap() > 0.0);
        assert!(fv.get_by_name("rms_mean").unwrap() > 0.0);
    }

    #[test]
    fn test_reserved_slots_are_zero() {
        let window = synth_window(&[1, 2, 3, 4, 5], 512, 100.0);
        let fv = extract(&window).unwrap();
        for i in layout::RESERVED_OFFSET..FEATURE_COUNT {
            assert_eq!(fv.values[i], 0.0);
        }
    }
}
