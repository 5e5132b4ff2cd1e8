//! Fixed-depth Haar wavelet decomposition.
//!
//! Three detail levels plus the final approximation; the energies of the four
//! sub-bands are the per-sensor wavelet features. Depth and basis are part of
//! the training contract and must not change.

/// Decomposition depth.
pub const WAVELET_LEVELS: usize = 3;

/// Sub-band energies from a 3-level Haar pyramid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaveletEnergies {
    pub d1: f64,
    pub d2: f64,
    pub d3: f64,
    pub a3: f64,
}

impl WaveletEnergies {
    pub fn compute(signal: &[f64]) -> Self {
        let mut approx = signal.to_vec();
        let mut detail_energy = [0.0_f64; WAVELET_LEVELS];

        for energy in detail_energy.iter_mut() {
            if approx.len() < 2 {
                break;
            }
            let (next, detail) = haar_step(&approx);
            *energy = detail.iter().map(|d| d * d).sum();
            approx = next;
        }

        Self {
            d1: detail_energy[0],
            d2: detail_energy[1],
            d3: detail_energy[2],
            a3: approx.iter().map(|a| a * a).sum(),
        }
    }
}

/// One Haar analysis step: pairwise normalized sums and differences.
/// An odd trailing sample is dropped.
fn haar_step(signal: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let pairs = signal.len() / 2;
    let mut approx = Vec::with_capacity(pairs);
    let mut detail = Vec::with_capacity(pairs);
    let inv_sqrt2 = std::f64::consts::FRAC_1_SQRT_2;

    for i in 0..pairs {
        let a = signal[2 * i];
        let b = signal[2 * i + 1];
        approx.push((a + b) * inv_sqrt2);
        detail.push((a - b) * inv_sqrt2);
    }
    (approx, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_haar_step_preserves_energy() {
        let signal = vec![1.0, 3.0, -2.0, 0.5, 4.0, -1.0];
        let (approx, detail) = haar_step(&signal);

        let in_energy: f64 = signal.iter().map(|x| x * x).sum();
        let out_energy: f64 =
            approx.iter().chain(detail.iter()).map(|x| x * x).sum();
        assert!((in_energy - out_energy).abs() < 1e-10);
    }

    #[test]
    fn test_pyramid_energy_conservation() {
        let signal: Vec<f64> = (0..256)
            .map(|i| (2.0 * PI * 7.0 * i as f64 / 128.0).sin())
            .collect();
        let w = WaveletEnergies::compute(&signal);

        let total: f64 = signal.iter().map(|x| x * x).sum();
        let decomposed = w.d1 + w.d2 + w.d3 + w.a3;
        assert!((total - decomposed).abs() / total < 1e-10);
    }

    #[test]
    fn test_constant_signal_has_no_detail() {
        let w = WaveletEnergies::compute(&[2.0; 64]);
        assert!(w.d1.abs() < 1e-20);
        assert!(w.d2.abs() < 1e-20);
        assert!(w.d3.abs() < 1e-20);
        assert!(w.a3 > 0.0);
    }

    #[test]
    fn test_high_frequency_lands_in_d1() {
        // Nyquist-rate alternation is pure first-level detail
        let signal: Vec<f64> = (0..128).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let w = WaveletEnergies::compute(&signal);
        assert!(w.d1 > 100.0);
        assert!(w.d2.abs() < 1e-10);
        assert!(w.a3.abs() < 1e-10);
    }

    #[test]
    fn test_short_signal() {
        let w = WaveletEnergies::compute(&[1.0]);
        assert_eq!(w.d1, 0.0);
        assert!((w.a3 - 1.0).abs() < 1e-12);
    }
}
