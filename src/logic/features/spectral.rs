//! Frequency-domain analysis for one sensor channel.
//!
//! A Hann taper is applied before the transform to control spectral leakage;
//! the same taper is used at training time, so it must not change. The FFT is
//! an in-place radix-2 with zero padding to the next power of two.

use std::f64::consts::PI;

/// Frequency band edges in Hz for the four fixed band energies.
pub const BAND_EDGES_HZ: [f64; 3] = [5.0, 15.0, 30.0];

/// The nine frequency-domain features for one sensor channel, in layout order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectralFeatures {
    pub centroid_hz: f64,
    pub entropy: f64,
    pub total_energy: f64,
    pub band_energies: [f64; 4],
    pub peak_frequency_hz: f64,
    pub peak_power: f64,
}

impl SpectralFeatures {
    /// Compute from a mean-removed signal at the given sample rate.
    pub fn compute(signal: &[f64], sample_rate_hz: f64) -> Self {
        let windowed = hann_window(signal);
        let psd = power_spectral_density(&windowed);
        if psd.len() < 2 {
            return Self::default();
        }

        let freq_res = freq_resolution(psd.len(), sample_rate_hz);
        let total_energy: f64 = psd.iter().skip(1).sum();

        // Dominant peak, DC excluded
        let (peak_bin, peak_power) = psd
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(k, &p)| (k, p))
            .unwrap_or((0, 0.0));

        let mut band_energies = [0.0; 4];
        for (k, &p) in psd.iter().enumerate().skip(1) {
            let f = k as f64 * freq_res;
            let band = if f < BAND_EDGES_HZ[0] {
                0
            } else if f < BAND_EDGES_HZ[1] {
                1
            } else if f < BAND_EDGES_HZ[2] {
                2
            } else {
                3
            };
            band_energies[band] += p;
        }

        Self {
            centroid_hz: spectral_centroid(&psd, sample_rate_hz),
            entropy: spectral_entropy(&psd),
            total_energy,
            band_energies,
            peak_frequency_hz: peak_bin as f64 * freq_res,
            peak_power,
        }
    }
}

/// Apply a Hann window to reduce spectral leakage.
pub fn hann_window(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n <= 1 {
        return signal.to_vec();
    }
    let denom = (n - 1) as f64;
    signal
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let w = 0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos());
            x * w
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
    fn mag_sq(self) -> f64 {
        self.re * self.re + self.im * self.im
    }
}

/// In-place radix-2 Cooley-Tukey. Length must be a power of two.
fn fft_in_place(data: &mut [Complex]) {
    let n = data.len();
    if n <= 1 {
        return;
    }
    debug_assert!(n.is_power_of_two());

    // Bit-reversal permutation
    let mut j = 0usize;
    for i in 0..n {
        if i < j {
            data.swap(i, j);
        }
        let mut m = n >> 1;
        while m >= 1 && j >= m {
            j -= m;
            m >>= 1;
        }
        j += m;
    }

    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let angle = -2.0 * PI / len as f64;
        for start in (0..n).step_by(len) {
            for k in 0..half {
                let tw = Complex::new((angle * k as f64).cos(), (angle * k as f64).sin());
                let u = data[start + k];
                let v = Complex::new(
                    data[start + k + half].re * tw.re - data[start + k + half].im * tw.im,
                    data[start + k + half].re * tw.im + data[start + k + half].im * tw.re,
                );
                data[start + k] = Complex::new(u.re + v.re, u.im + v.im);
                data[start + k + half] = Complex::new(u.re - v.re, u.im - v.im);
            }
        }
        len <<= 1;
    }
}

/// One-sided power spectral density of a real-valued signal.
/// Returns `fft_n / 2 + 1` values; the input is zero-padded to a power of two.
pub fn power_spectral_density(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return vec![];
    }
    let fft_n = n.next_power_of_two();
    let mut data: Vec<Complex> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    data.resize(fft_n, Complex::new(0.0, 0.0));
    fft_in_place(&mut data);
    let n_f64 = fft_n as f64;
    (0..=fft_n / 2).map(|k| data[k].mag_sq() / n_f64).collect()
}

/// Hz per PSD bin, given the one-sided PSD length.
pub fn freq_resolution(psd_len: usize, sample_rate_hz: f64) -> f64 {
    let fft_n = psd_len.saturating_sub(1) * 2;
    if fft_n == 0 {
        return 0.0;
    }
    sample_rate_hz / fft_n as f64
}

/// Spectral centroid in Hz.
pub fn spectral_centroid(psd: &[f64], sample_rate_hz: f64) -> f64 {
    let total_power: f64 = psd.iter().sum();
    if total_power <= 0.0 {
        return 0.0;
    }
    let freq_res = freq_resolution(psd.len(), sample_rate_hz);
    let weighted: f64 = psd
        .iter()
        .enumerate()
        .map(|(k, &s)| k as f64 * freq_res * s)
        .sum();
    weighted / total_power
}

/// Normalized spectral (Shannon) entropy in [0, 1].
pub fn spectral_entropy(psd: &[f64]) -> f64 {
    let total: f64 = psd.iter().sum();
    if total <= 0.0 || psd.len() < 2 {
        return 0.0;
    }
    let h: f64 = psd
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| {
            let q = p / total;
            -q * q.ln()
        })
        .sum();
    (h / (psd.len() as f64).ln()).clamp(0.0, 1.0)
}

/// One detected spectral peak.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralPeak {
    pub bin: usize,
    pub frequency_hz: f64,
    pub power: f64,
}

/// Local maxima above the median noise floor, strongest first, with nearby
/// side lobes clustered away (Hann main lobe spans ~4 bins).
pub fn detect_peaks(psd: &[f64], sample_rate_hz: f64, max_peaks: usize) -> Vec<SpectralPeak> {
    if psd.len() < 3 || max_peaks == 0 {
        return vec![];
    }
    let noise_floor = median_of(psd);
    let strongest = psd.iter().copied().fold(0.0_f64, f64::max);
    // Relative floor keeps -90 dB numerical dust out of the peak list
    let threshold = (noise_floor * 3.0).max(strongest * 1e-9).max(1e-15);
    let freq_res = freq_resolution(psd.len(), sample_rate_hz);

    let mut peaks = Vec::new();
    for i in 1..psd.len() - 1 {
        if psd[i] > threshold && psd[i] >= psd[i - 1] && psd[i] >= psd[i + 1] {
            peaks.push(SpectralPeak {
                bin: i,
                frequency_hz: i as f64 * freq_res,
                power: psd[i],
            });
        }
    }
    peaks.sort_by(|a, b| b.power.partial_cmp(&a.power).unwrap_or(std::cmp::Ordering::Equal));

    let mut clustered: Vec<SpectralPeak> = Vec::new();
    for peak in peaks {
        let near_stronger = clustered
            .iter()
            .any(|p| p.bin.abs_diff(peak.bin) <= 8);
        if !near_stronger {
            clustered.push(peak);
            if clustered.len() == max_peaks {
                break;
            }
        }
    }
    clustered
}

/// Estimate damping ratio via the half-power bandwidth around a peak bin.
pub fn damping_half_power(psd: &[f64], peak_bin: usize, freq_res: f64) -> f64 {
    if psd.is_empty() || peak_bin >= psd.len() || freq_res <= 0.0 {
        return 0.0;
    }
    let peak_mag = psd[peak_bin];
    if peak_mag <= 0.0 {
        return 0.0;
    }
    let half_power = peak_mag / 2.0;

    let mut left = peak_bin;
    while left > 0 && psd[left] > half_power {
        left -= 1;
    }
    let mut right = peak_bin;
    while right < psd.len() - 1 && psd[right] > half_power {
        right += 1;
    }

    let bandwidth_hz = (right - left).max(1) as f64 * freq_res;
    let center_hz = peak_bin as f64 * freq_res;
    if center_hz > 0.0 {
        bandwidth_hz / (2.0 * center_hz)
    } else {
        0.0
    }
}

fn median_of(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
