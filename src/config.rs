//! Configuration module
//!
//! Everything tunable is read from the environment with defaults from
//! `constants.rs`. One `Config` is built at startup and handed down by value.

use std::env;
use std::path::PathBuf;

use crate::constants;

/// One monitored structure and the sensor gateway serving its samples.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Stable identifier for the structure (used in logs and the API).
    pub structure_id: String,
    /// host:port of the gateway's streaming endpoint.
    pub addr: String,
}

/// Windowing parameters shared by every session.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Window duration in seconds.
    pub window_secs: f64,
    /// Overlap fraction between consecutive windows, in [0, 1).
    pub overlap_fraction: f64,
    /// Nominal sampling rate in Hz.
    pub sample_rate_hz: f64,
    /// Minimum per-sensor samples for a valid window.
    pub min_samples: usize,
    /// Partial windows older than this are discarded.
    pub stale_timeout_secs: f64,
    /// Sensor ids expected to contribute to every window.
    pub expected_sensors: Vec<u16>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_secs: constants::DEFAULT_WINDOW_SECS,
            overlap_fraction: constants::DEFAULT_OVERLAP_FRACTION,
            sample_rate_hz: constants::DEFAULT_SAMPLE_RATE_HZ,
            min_samples: constants::MIN_WINDOW_SAMPLES,
            stale_timeout_secs: constants::DEFAULT_STALE_TIMEOUT_SECS,
            expected_sensors: vec![1, 2, 3, 4, 5],
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Monitored structures, one session each.
    pub gateways: Vec<GatewayConfig>,

    /// HTTP port for the operator control surface.
    pub http_port: u16,

    /// Directory holding the trained model artifacts.
    pub model_dir: PathBuf,

    /// Windowing parameters.
    pub window: WindowConfig,

    /// Sensor full-scale value in g.
    pub full_scale_g: f64,

    /// Alert time-to-live in seconds.
    pub alert_ttl_secs: i64,

    /// Optional override of the model manifest's anomaly threshold.
    pub anomaly_threshold_override: Option<f32>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let gateways = env::var("SHM_GATEWAYS")
            .unwrap_or_else(|_| "structure-1=127.0.0.1:9400".to_string());

        let mut window = WindowConfig::default();
        if let Some(v) = env_f64("SHM_WINDOW_SECS") {
            window.window_secs = v;
        }
        if let Some(v) = env_f64("SHM_OVERLAP_FRACTION") {
            window.overlap_fraction = v.clamp(0.0, 0.9);
        }
        if let Some(v) = env_f64("SHM_SAMPLE_RATE_HZ") {
            window.sample_rate_hz = v;
        }
        if let Some(v) = env_f64("SHM_STALE_TIMEOUT_SECS") {
            window.stale_timeout_secs = v;
        }
        if let Ok(list) = env::var("SHM_EXPECTED_SENSORS") {
            let sensors: Vec<u16> = list
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if !sensors.is_empty() {
                window.expected_sensors = sensors;
            }
        }

        Self {
            gateways: parse_gateways(&gateways),

            http_port: env::var("SHM_HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(constants::DEFAULT_HTTP_PORT),

            model_dir: env::var("SHM_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(constants::DEFAULT_MODEL_DIR)),

            window,

            full_scale_g: env_f64("SHM_FULL_SCALE_G")
                .unwrap_or(constants::DEFAULT_FULL_SCALE_G),

            alert_ttl_secs: env::var("SHM_ALERT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(constants::DEFAULT_ALERT_TTL_SECS),

            anomaly_threshold_override: env::var("SHM_ANOMALY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Parse "id=host:port,id=host:port" into gateway configs.
/// Entries without an id get a positional "structure-N" id.
fn parse_gateways(raw: &str) -> Vec<GatewayConfig> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, entry)| match entry.split_once('=') {
            Some((id, addr)) => GatewayConfig {
                structure_id: id.trim().to_string(),
                addr: addr.trim().to_string(),
            },
            None => GatewayConfig {
                structure_id: format!("structure-{}", i + 1),
                addr: entry.to_string(),
            },
        })
        .collect()
}
