//! Hybrid Anomaly Detector - ensemble scoring over the feature vector.
//!
//! Two independent scorers: the isolation forest (always present) and the
//! autoencoder (optional). Their scores fuse into one anomaly score with a
//! confidence that models detector agreement.

pub mod autoencoder;
pub mod isolation;

pub use autoencoder::Autoencoder;
pub use isolation::IsolationForest;

use serde::{Deserialize, Serialize};

/// Confidence reported when only one detector is available.
pub const SINGLE_DETECTOR_CONFIDENCE: f32 = 0.5;

/// Default fusion weights (detector agreement assumed symmetric).
pub const DEFAULT_WEIGHT_IF: f32 = 0.5;
pub const DEFAULT_WEIGHT_AE: f32 = 0.5;

/// Default decision threshold; per deployment, not per call.
pub const DEFAULT_THRESHOLD: f32 = 0.60;

/// Presentation-only risk banding over the raw score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn classify(score: f32) -> Self {
        if score < 0.30 {
            RiskBand::Low
        } else if score < 0.60 {
            RiskBand::Medium
        } else {
            RiskBand::High
        }
    }
}

/// One window's anomaly assessment. Ephemeral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub if_score: f32,
    pub ae_score: Option<f32>,
    pub anomaly_score: f32,
    pub confidence: f32,
    pub is_anomaly: bool,
    pub threshold: f32,
    pub has_autoencoder: bool,
}

impl AnomalyResult {
    pub fn risk_band(&self) -> RiskBand {
        RiskBand::classify(self.anomaly_score)
    }
}

/// Fuse the two detector outputs into one result.
///
/// `anomaly_score = w_if * if + w_ae * ae` when both are present, else the
/// isolation-forest score alone. Confidence is `1 - |if - ae|` (detector
/// agreement) with both present, else a fixed single-detector floor.
pub fn fuse(
    if_score: f32,
    ae_score: Option<f32>,
    threshold: f32,
    weight_if: f32,
    weight_ae: f32,
) -> AnomalyResult {
    let if_score = if_score.clamp(0.0, 1.0);
    let ae_score = ae_score.map(|s| s.clamp(0.0, 1.0));

    let (anomaly_score, confidence) = match ae_score {
        Some(ae) => {
            let fused = (weight_if * if_score + weight_ae * ae).clamp(0.0, 1.0);
            let agreement = (1.0 - (if_score - ae).abs()).clamp(0.0, 1.0);
            (fused, agreement)
        }
        None => (if_score, SINGLE_DETECTOR_CONFIDENCE),
    };

    AnomalyResult {
        if_score,
        ae_score,
        anomaly_score,
        confidence,
        is_anomaly: anomaly_score > threshold,
        threshold,
        has_autoencoder: ae_score.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fuse_default(if_score: f32, ae_score: Option<f32>) -> AnomalyResult {
        fuse(
            if_score,
            ae_score,
            DEFAULT_THRESHOLD,
            DEFAULT_WEIGHT_IF,
            DEFAULT_WEIGHT_AE,
        )
    }

    #[test]
    fn test_equal_weight_fusion() {
        // if 0.2, ae 0.8 -> score 0.5, confidence 1 - 0.6 = 0.4
        let r = fuse_default(0.2, Some(0.8));
        assert!((r.anomaly_score - 0.5).abs() < 1e-6);
        assert!((r.confidence - 0.4).abs() < 1e-6);
        assert!(!r.is_anomaly);
        assert!(r.has_autoencoder);
    }

    #[test]
    fn test_missing_autoencoder_falls_back_to_if() {
        let r = fuse_default(0.7, None);
        assert_eq!(r.anomaly_score, r.if_score);
        assert_eq!(r.confidence, SINGLE_DETECTOR_CONFIDENCE);
        assert!(!r.has_autoencoder);
        assert!(r.is_anomaly);
    }

    #[test]
    fn test_agreeing_detectors_have_high_confidence() {
        let r = fuse_default(0.75, Some(0.75));
        assert!((r.confidence - 1.0).abs() < 1e-6);
        assert!(r.is_anomaly);
    }

    #[test]
    fn test_score_monotonic_in_both_inputs() {
        let base = fuse_default(0.3, Some(0.4)).anomaly_score;
        for step in 1..=6 {
            let bumped_if = fuse_default(0.3 + step as f32 * 0.1, Some(0.4)).anomaly_score;
            let bumped_ae = fuse_default(0.3, Some(0.4 + step as f32 * 0.1)).anomaly_score;
            assert!(bumped_if >= base);
            assert!(bumped_ae >= base);
        }
    }

    #[test]
    fn test_scores_and_confidence_bounded() {
        for (a, b) in [(-0.5, 1.5), (2.0, 2.0), (0.0, 0.0), (1.0, 0.0)] {
            let r = fuse_default(a, Some(b));
            assert!((0.0..=1.0).contains(&r.anomaly_score));
            assert!((0.0..=1.0).contains(&r.confidence));
        }
    }

    #[test]
    fn test_threshold_decision_boundary() {
        assert!(!fuse_default(0.60, None).is_anomaly);
        assert!(fuse_default(0.601, None).is_anomaly);
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(RiskBand::classify(0.1), RiskBand::Low);
        assert_eq!(RiskBand::classify(0.299), RiskBand::Low);
        assert_eq!(RiskBand::classify(0.3), RiskBand::Medium);
        assert_eq!(RiskBand::classify(0.599), RiskBand::Medium);
        assert_eq!(RiskBand::classify(0.6), RiskBand::High);
        assert_eq!(RiskBand::classify(1.0), RiskBand::High);
    }
}
