//! Spectral fingerprinting and baseline comparison.
//!
//! `mark` and `compare` share one estimator: the sensor-averaged Hann PSD,
//! peak-picked and damping-estimated by half-power bandwidth. Matching
//! between baseline and live peaks is nearest-neighbor by frequency.

use crate::logic::features::spectral::{
    damping_half_power, detect_peaks, freq_resolution, hann_window, power_spectral_density,
};
use crate::logic::features::time_domain::rms;
use crate::logic::window::Window;

use super::types::{Baseline, ComparativeResult, SensorAnomaly};

/// Heatmap saturates when live energy deviates this many times the reference.
const HEATMAP_SATURATION_RATIO: f64 = 3.0;

/// Quality weighting between frequency and damping agreement.
const QUALITY_WEIGHT_FREQ: f64 = 0.7;
const QUALITY_WEIGHT_DAMPING: f64 = 0.3;

/// Mean |shift| (percent) at which frequency agreement reaches zero.
const FREQ_AGREEMENT_SPAN_PCT: f64 = 10.0;

/// Mean |damping delta| at which damping agreement reaches zero.
const DAMPING_AGREEMENT_SPAN: f64 = 0.05;

/// A window's stable spectral fingerprint.
#[derive(Debug, Clone)]
pub struct SpectralEstimate {
    /// Modal peak frequencies in Hz, ascending.
    pub peak_frequencies: Vec<f64>,
    /// Damping ratio per peak, same order.
    pub damping_ratios: Vec<f64>,
    /// Per-sensor vibration RMS (mean-removed series).
    pub sensor_rms: Vec<(u16, f64)>,
}

/// Estimate up to `max_modes` modal peaks from the sensor-averaged PSD.
pub fn spectral_estimate(window: &Window, max_modes: usize) -> SpectralEstimate {
    let sensor_ids = window.sensor_ids();
    let mut avg_psd: Vec<f64> = Vec::new();
    let mut sensor_rms = Vec::with_capacity(sensor_ids.len());

    for &id in &sensor_ids {
        let detrended = window.detrended_series(id);
        sensor_rms.push((id, rms(&detrended)));

        let psd = power_spectral_density(&hann_window(&detrended));
        if avg_psd.is_empty() {
            avg_psd = psd;
        } else {
            let len = avg_psd.len().min(psd.len());
            for k in 0..len {
                avg_psd[k] += psd[k];
            }
            avg_psd.truncate(len);
        }
    }
    if !sensor_ids.is_empty() {
        let n = sensor_ids.len() as f64;
        for v in &mut avg_psd {
            *v /= n;
        }
    }

    let mut peaks = detect_peaks(&avg_psd, window.sample_rate_hz, max_modes.max(1));
    peaks.sort_by(|a, b| {
        a.frequency_hz
            .partial_cmp(&b.frequency_hz)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let freq_res = freq_resolution(avg_psd.len(), window.sample_rate_hz);
    let damping_ratios: Vec<f64> = peaks
        .iter()
        .map(|p| damping_half_power(&avg_psd, p.bin, freq_res))
        .collect();

    SpectralEstimate {
        peak_frequencies: peaks.into_iter().map(|p| p.frequency_hz).collect(),
        damping_ratios,
        sensor_rms,
    }
}

/// Nearest-neighbor match of each baseline peak to a live peak; returns the
/// matched live index and the shift percent, per baseline peak.
pub fn match_peaks(baseline_peaks: &[f64], live_peaks: &[f64]) -> Vec<Option<(usize, f64)>> {
    baseline_peaks
        .iter()
        .map(|&base| {
            if base <= 0.0 {
                return None;
            }
            live_peaks
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    (*a - base)
                        .abs()
                        .partial_cmp(&(*b - base).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(j, &live)| (j, (live - base) / base * 100.0))
        })
        .collect()
}

/// Compare a live window against a baseline snapshot.
pub fn compare(window: &Window, baseline: &Baseline) -> ComparativeResult {
    let live = spectral_estimate(window, baseline.peak_frequencies.len().max(1));

    let matches = match_peaks(&baseline.peak_frequencies, &live.peak_frequencies);

    let mut delta_f_pct = Vec::with_capacity(matches.len());
    let mut damping_delta = Vec::with_capacity(matches.len());
    for (i, matched) in matches.iter().enumerate() {
        let Some((j, shift)) = matched else { continue };
        delta_f_pct.push(*shift);
        let base_zeta = baseline.damping_ratios.get(i).copied().unwrap_or(0.0);
        let live_zeta = live.damping_ratios.get(*j).copied().unwrap_or(0.0);
        damping_delta.push(live_zeta - base_zeta);
    }

    let heatmap = energy_heatmap(&baseline.sensor_rms, &live.sensor_rms);
    let quality = quality_score(&delta_f_pct, &damping_delta);

    ComparativeResult {
        delta_f_pct,
        damping_delta,
        heatmap,
        quality,
    }
}

/// Per-sensor energy deviation from the baseline reference, in [0, 1].
fn energy_heatmap(reference: &[(u16, f64)], live: &[(u16, f64)]) -> Vec<SensorAnomaly> {
    reference
        .iter()
        .map(|&(id, ref_rms)| {
            let live_rms = live
                .iter()
                .find(|(lid, _)| *lid == id)
                .map(|(_, v)| *v)
                .unwrap_or(0.0);
            let score = if ref_rms > 1e-9 {
                ((live_rms - ref_rms).abs() / (ref_rms * HEATMAP_SATURATION_RATIO)).clamp(0.0, 1.0)
            } else if live_rms > 1e-9 {
                1.0
            } else {
                0.0
            };
            SensorAnomaly {
                sensor_id: id,
                score,
            }
        })
        .collect()
}

/// Weighted combination of frequency and damping agreement, in [0, 1].
fn quality_score(delta_f_pct: &[f64], damping_delta: &[f64]) -> f64 {
    if delta_f_pct.is_empty() {
        return 0.0;
    }
    let mean_shift =
        delta_f_pct.iter().map(|d| d.abs()).sum::<f64>() / delta_f_pct.len() as f64;
    let freq_agreement = (1.0 - mean_shift / FREQ_AGREEMENT_SPAN_PCT).clamp(0.0, 1.0);

    let damping_agreement = if damping_delta.is_empty() {
        1.0
    } else {
        let mean_delta =
            damping_delta.iter().map(|d| d.abs()).sum::<f64>() / damping_delta.len() as f64;
        (1.0 - mean_delta / DAMPING_AGREEMENT_SPAN).clamp(0.0, 1.0)
    };

    QUALITY_WEIGHT_FREQ * freq_agreement + QUALITY_WEIGHT_DAMPING * damping_agreement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::testutil::synth_window;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_match_peaks_exact_shift() {
        // Baseline 10.0 Hz, live 10.6 Hz -> +6.0%
        let matches = match_peaks(&[10.0], &[10.6]);
        let (j, shift) = matches[0].unwrap();
        assert_eq!(j, 0);
        assert!((shift - 6.0).abs() < 1e-9);
        assert_eq!(
            super::super::types::ShiftSeverity::classify(shift),
            super::super::types::ShiftSeverity::Alert
        );
    }

    #[test]
    fn test_match_peaks_nearest_neighbor() {
        let matches = match_peaks(&[10.0, 25.0], &[24.0, 10.4]);
        assert_eq!(matches[0].unwrap().0, 1);
        assert_eq!(matches[1].unwrap().0, 0);
        assert!((matches[0].unwrap().1 - 4.0).abs() < 1e-9);
        assert!((matches[1].unwrap().1 - -4.0).abs() < 1e-9);
    }

    #[test]
    fn test_match_peaks_empty_live() {
        let matches = match_peaks(&[10.0], &[]);
        assert!(matches[0].is_none());
    }

    #[test]
    fn test_spectral_estimate_finds_tone() {
        let window = synth_window(&[1, 2, 3, 4, 5], 2048, 100.0, 10.0, 0.0);
        let est = spectral_estimate(&window, 4);
        assert!(!est.peak_frequencies.is_empty());
        assert!(
            (est.peak_frequencies[0] - 10.0).abs() < 0.2,
            "got {:?}",
            est.peak_frequencies
        );
        assert_eq!(est.sensor_rms.len(), 5);
        assert!(est.sensor_rms.iter().all(|(_, r)| *r > 0.0));
    }

    #[test]
    fn test_compare_detects_frequency_shift() {
        let baseline_window = synth_window(&[1, 2, 3, 4, 5], 2048, 100.0, 10.0, 0.0);
        let est = spectral_estimate(&baseline_window, 1);
        let baseline = Baseline {
            id: Uuid::new_v4(),
            name: "healthy".into(),
            created_at: Utc::now(),
            peak_frequencies: est.peak_frequencies,
            damping_ratios: est.damping_ratios,
            sensor_rms: est.sensor_rms,
            description: String::new(),
        };

        // Live structure vibrating ~6% higher
        let live_window = synth_window(&[1, 2, 3, 4, 5], 2048, 100.0, 10.6, 0.0);
        let result = compare(&live_window, &baseline);

        let max_shift = result.max_shift_pct().unwrap();
        assert!(max_shift > 5.0, "shift {}", max_shift);
        assert!(result.quality < 0.7);
        assert_eq!(result.heatmap.len(), 5);
    }

    #[test]
    fn test_compare_identical_window_is_clean() {
        let window = synth_window(&[1, 2, 3, 4, 5], 2048, 100.0, 10.0, 0.0);
        let est = spectral_estimate(&window, 2);
        let baseline = Baseline {
            id: Uuid::new_v4(),
            name: "healthy".into(),
            created_at: Utc::now(),
            peak_frequencies: est.peak_frequencies,
            damping_ratios: est.damping_ratios,
            sensor_rms: est.sensor_rms,
            description: String::new(),
        };

        let result = compare(&window, &baseline);
        for shift in &result.delta_f_pct {
            assert!(shift.abs() < 0.5, "shift {}", shift);
        }
        assert!(result.quality > 0.9, "quality {}", result.quality);
        for entry in &result.heatmap {
            assert!(entry.score < 0.05, "S{} score {}", entry.sensor_id, entry.score);
        }
    }

    #[test]
    fn test_quality_score_bounds() {
        assert_eq!(quality_score(&[], &[]), 0.0);
        let perfect = quality_score(&[0.0, 0.0], &[0.0]);
        assert!((perfect - 1.0).abs() < 1e-12);
        let awful = quality_score(&[50.0], &[0.5]);
        assert_eq!(awful, 0.0);
    }

    #[test]
    fn test_heatmap_saturation() {
        let reference = vec![(1u16, 0.1)];
        // 4x the reference deviation saturates at 1.0
        let live = vec![(1u16, 0.5)];
        let map = energy_heatmap(&reference, &live);
        assert_eq!(map[0].score, 1.0);
    }
}
