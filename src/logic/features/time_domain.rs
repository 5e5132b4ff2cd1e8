//! Time-domain statistics over one sensor's window.
//!
//! All functions are pure and operate on the acceleration magnitude series.

/// The seven time-domain features for one sensor channel, in layout order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeDomainFeatures {
    pub rms: f64,
    pub peak_to_peak: f64,
    pub kurtosis: f64,
    pub skewness: f64,
    pub crest_factor: f64,
    pub shape_factor: f64,
    pub impulse_factor: f64,
}

impl TimeDomainFeatures {
    pub fn compute(signal: &[f64]) -> Self {
        if signal.is_empty() {
            return Self::default();
        }

        let n = signal.len() as f64;
        let mean = signal.iter().sum::<f64>() / n;
        let rms = rms(signal);
        let peak = signal.iter().map(|x| x.abs()).fold(0.0_f64, f64::max);
        let abs_mean = signal.iter().map(|x| x.abs()).sum::<f64>() / n;

        let min = signal.iter().copied().fold(f64::INFINITY, f64::min);
        let max = signal.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        // Central moments for skewness/kurtosis
        let variance = signal.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let (skewness, kurtosis) = if std > 1e-12 {
            let m3 = signal.iter().map(|x| ((x - mean) / std).powi(3)).sum::<f64>() / n;
            let m4 = signal.iter().map(|x| ((x - mean) / std).powi(4)).sum::<f64>() / n;
            (m3, m4)
        } else {
            (0.0, 0.0)
        };

        Self {
            rms,
            peak_to_peak: max - min,
            kurtosis,
            skewness,
            crest_factor: safe_div(peak, rms),
            shape_factor: safe_div(rms, abs_mean),
            impulse_factor: safe_div(peak, abs_mean),
        }
    }
}

/// Root-mean-square amplitude of a signal segment.
pub fn rms(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = signal.iter().map(|&x| x * x).sum();
    (sum_sq / signal.len() as f64).sqrt()
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den.abs() < 1e-12 {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine_signal(freq_hz: f64, sample_rate: f64, duration_s: f64) -> Vec<f64> {
        let n = (sample_rate * duration_s) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_rms_of_sine() {
        // RMS of a unit sine is 1/sqrt(2)
        let signal = sine_signal(10.0, 1000.0, 1.0);
        let expected = 1.0 / 2.0_f64.sqrt();
        assert!((rms(&signal) - expected).abs() < 0.01);
    }

    #[test]
    fn test_rms_empty() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_sine_features() {
        let signal = sine_signal(10.0, 1000.0, 2.0);
        let f = TimeDomainFeatures::compute(&signal);

        assert!((f.peak_to_peak - 2.0).abs() < 0.01);
        // Crest factor of a sine is sqrt(2)
        assert!((f.crest_factor - 2.0_f64.sqrt()).abs() < 0.02);
        // Sine kurtosis is 1.5, skewness 0
        assert!((f.kurtosis - 1.5).abs() < 0.05);
        assert!(f.skewness.abs() < 0.05);
    }

    #[test]
    fn test_constant_signal_degenerate_moments() {
        let f = TimeDomainFeatures::compute(&[3.0; 100]);
        assert_eq!(f.skewness, 0.0);
        assert_eq!(f.kurtosis, 0.0);
        assert!((f.rms - 3.0).abs() < 1e-12);
        assert_eq!(f.peak_to_peak, 0.0);
    }

    #[test]
    fn test_impulse_raises_crest_and_kurtosis() {
        let mut signal = sine_signal(10.0, 1000.0, 1.0);
        signal[500] = 10.0;
        let spiky = TimeDomainFeatures::compute(&signal);
        let clean = TimeDomainFeatures::compute(&sine_signal(10.0, 1000.0, 1.0));

        assert!(spiky.crest_factor > clean.crest_factor * 2.0);
        assert!(spiky.kurtosis > clean.kurtosis);
        assert!(spiky.impulse_factor > clean.impulse_factor);
    }
}
