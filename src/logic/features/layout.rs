//! Feature Layout - Centralized Feature Definition
//!
//! **CRITICAL: This file controls the feature schema**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! The trained model declares its own ordered feature-name list; scoring is
//! only valid when that list matches this layout verbatim. A mismatch is a
//! configuration error, not a runtime condition.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
/// MUST be incremented when layout changes
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Number of sensor channels the layout assumes.
pub const SENSOR_SLOTS: usize = 5;

/// Features per sensor: 7 time-domain + 9 frequency-domain + 4 wavelet.
pub const PER_SENSOR_FEATURES: usize = 20;

/// Feature names in exact order they appear in the vector.
/// This is the SINGLE SOURCE OF TRUTH for feature layout.
///
/// Per-sensor block layout (20 slots each):
///   +0  rms                 +7  spectral_centroid   +16 wavelet_d1
///   +1  peak_to_peak        +8  spectral_entropy    +17 wavelet_d2
///   +2  kurtosis            +9  spectral_energy     +18 wavelet_d3
///   +3  skewness            +10 band_low            +19 wavelet_a3
///   +4  crest_factor        +11 band_mid
///   +5  shape_factor        +12 band_high
///   +6  impulse_factor      +13 band_vhigh
///                           +14 peak_frequency
///                           +15 peak_power
pub const FEATURE_LAYOUT: &[&str] = &[
    // === Sensor 1 (0-19) ===
    "s1_rms", "s1_peak_to_peak", "s1_kurtosis", "s1_skewness",
    "s1_crest_factor", "s1_shape_factor", "s1_impulse_factor",
    "s1_spectral_centroid", "s1_spectral_entropy", "s1_spectral_energy",
    "s1_band_low", "s1_band_mid", "s1_band_high", "s1_band_vhigh",
    "s1_peak_frequency", "s1_peak_power",
    "s1_wavelet_d1", "s1_wavelet_d2", "s1_wavelet_d3", "s1_wavelet_a3",

    // === Sensor 2 (20-39) ===
    "s2_rms", "s2_peak_to_peak", "s2_kurtosis", "s2_skewness",
    "s2_crest_factor", "s2_shape_factor", "s2_impulse_factor",
    "s2_spectral_centroid", "s2_spectral_entropy", "s2_spectral_energy",
    "s2_band_low", "s2_band_mid", "s2_band_high", "s2_band_vhigh",
    "s2_peak_frequency", "s2_peak_power",
    "s2_wavelet_d1", "s2_wavelet_d2", "s2_wavelet_d3", "s2_wavelet_a3",

    // === Sensor 3 (40-59) ===
    "s3_rms", "s3_peak_to_peak", "s3_kurtosis", "s3_skewness",
    "s3_crest_factor", "s3_shape_factor", "s3_impulse_factor",
    "s3_spectral_centroid", "s3_spectral_entropy", "s3_spectral_energy",
    "s3_band_low", "s3_band_mid", "s3_band_high", "s3_band_vhigh",
    "s3_peak_frequency", "s3_peak_power",
    "s3_wavelet_d1", "s3_wavelet_d2", "s3_wavelet_d3", "s3_wavelet_a3",

    // === Sensor 4 (60-79) ===
    "s4_rms", "s4_peak_to_peak", "s4_kurtosis", "s4_skewness",
    "s4_crest_factor", "s4_shape_factor", "s4_impulse_factor",
    "s4_spectral_centroid", "s4_spectral_entropy", "s4_spectral_energy",
    "s4_band_low", "s4_band_mid", "s4_band_high", "s4_band_vhigh",
    "s4_peak_frequency", "s4_peak_power",
    "s4_wavelet_d1", "s4_wavelet_d2", "s4_wavelet_d3", "s4_wavelet_a3",

    // === Sensor 5 (80-99) ===
    "s5_rms", "s5_peak_to_peak", "s5_kurtosis", "s5_skewness",
    "s5_crest_factor", "s5_shape_factor", "s5_impulse_factor",
    "s5_spectral_centroid", "s5_spectral_entropy", "s5_spectral_energy",
    "s5_band_low", "s5_band_mid", "s5_band_high", "s5_band_vhigh",
    "s5_peak_frequency", "s5_peak_power",
    "s5_wavelet_d1", "s5_wavelet_d2", "s5_wavelet_d3", "s5_wavelet_a3",

    // === Cross-sensor aggregates (100-103) ===
    "rms_mean",          // 100: mean RMS across sensors
    "rms_std",           // 101: std of RMS across sensors
    "peak_freq_mean",    // 102: mean dominant frequency across sensors
    "peak_freq_std",     // 103: std of dominant frequency across sensors

    // === Reserved / model-derived (104-155) ===
    // Slots the training side may populate; inference writes zeros.
    "reserved_00", "reserved_01", "reserved_02", "reserved_03",
    "reserved_04", "reserved_05", "reserved_06", "reserved_07",
    "reserved_08", "reserved_09", "reserved_10", "reserved_11",
    "reserved_12", "reserved_13", "reserved_14", "reserved_15",
    "reserved_16", "reserved_17", "reserved_18", "reserved_19",
    "reserved_20", "reserved_21", "reserved_22", "reserved_23",
    "reserved_24", "reserved_25", "reserved_26", "reserved_27",
    "reserved_28", "reserved_29", "reserved_30", "reserved_31",
    "reserved_32", "reserved_33", "reserved_34", "reserved_35",
    "reserved_36", "reserved_37", "reserved_38", "reserved_39",
    "reserved_40", "reserved_41", "reserved_42", "reserved_43",
    "reserved_44", "reserved_45", "reserved_46", "reserved_47",
    "reserved_48", "reserved_49", "reserved_50", "reserved_51",
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 156;

/// Start of the cross-sensor aggregate block.
pub const CROSS_SENSOR_OFFSET: usize = SENSOR_SLOTS * PER_SENSOR_FEATURES;

/// Start of the reserved block.
pub const RESERVED_OFFSET: usize = CROSS_SENSOR_OFFSET + 4;

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the feature layout.
/// Used to detect layout mismatches at runtime.
pub fn compute_layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&[FEATURE_VERSION]);

    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

/// Get layout hash (inputs are const, result is stable per build)
pub fn layout_hash() -> u32 {
    static HASH: once_cell::sync::Lazy<u32> = once_cell::sync::Lazy::new(compute_layout_hash);
    *HASH
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Error when feature layout doesn't match expected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

impl std::fmt::Display for LayoutMismatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "feature layout mismatch: expected v{} (hash: {:08x}), got v{} (hash: {:08x})",
            self.expected_version, self.expected_hash, self.actual_version, self.actual_hash
        )
    }
}

impl std::error::Error for LayoutMismatchError {}

/// Validate that incoming data matches current layout
pub fn validate_layout(incoming_version: u8, incoming_hash: u32) -> Result<(), LayoutMismatchError> {
    let current_hash = layout_hash();

    if incoming_version != FEATURE_VERSION || incoming_hash != current_hash {
        return Err(LayoutMismatchError {
            expected_version: FEATURE_VERSION,
            expected_hash: current_hash,
            actual_version: incoming_version,
            actual_hash: incoming_hash,
        });
    }

    Ok(())
}

/// Compare a model manifest's declared feature names against this layout.
/// Returns the first divergence as a human-readable detail string.
pub fn check_feature_names(declared: &[String]) -> Result<(), String> {
    if declared.len() != FEATURE_COUNT {
        return Err(format!(
            "model declares {} features, layout has {}",
            declared.len(),
            FEATURE_COUNT
        ));
    }
    for (i, (got, want)) in declared.iter().zip(FEATURE_LAYOUT.iter()).enumerate() {
        if got != want {
            return Err(format!(
                "feature {} is '{}' in the model but '{}' in the layout",
                i, got, want
            ));
        }
    }
    Ok(())
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

/// Get feature index by name (O(n) but called off the hot path)
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

/// Get feature name by index
pub fn feature_name(index: usize) -> Option<&'static str> {
    FEATURE_LAYOUT.get(index).copied()
}

/// Index of a per-sensor feature: `sensor_slot` in 0..SENSOR_SLOTS,
/// `offset` in 0..PER_SENSOR_FEATURES.
pub fn sensor_feature_index(sensor_slot: usize, offset: usize) -> usize {
    debug_assert!(sensor_slot < SENSOR_SLOTS && offset < PER_SENSOR_FEATURES);
    sensor_slot * PER_SENSOR_FEATURES + offset
}

// ============================================================================
// TESTS
// ============================================================================
