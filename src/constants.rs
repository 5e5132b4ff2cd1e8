//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! `Config::from_env` reads the environment with these as fallbacks.

/// Default HTTP port for the operator control surface
pub const DEFAULT_HTTP_PORT: u16 = 8090;

/// Default model artifact directory
pub const DEFAULT_MODEL_DIR: &str = "models";

/// Window duration in seconds
pub const DEFAULT_WINDOW_SECS: f64 = 8.0;

/// Overlap fraction between consecutive windows (0.0 = non-overlapping)
pub const DEFAULT_OVERLAP_FRACTION: f64 = 0.0;

/// Nominal sensor sampling rate in Hz
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 100.0;

/// Minimum per-sensor samples for a window to be usable for spectral analysis
pub const MIN_WINDOW_SAMPLES: usize = 256;

/// Partial windows older than this are discarded
pub const DEFAULT_STALE_TIMEOUT_SECS: f64 = 16.0;

/// Samples this far behind the current window start are dropped
pub const OUT_OF_ORDER_TOLERANCE_SECS: f64 = 1.0;

/// Sensor full-scale acceleration in g (clipping detection)
pub const DEFAULT_FULL_SCALE_G: f64 = 16.0;

/// Consecutive saturated samples that count as clipping
pub const CLIPPING_RUN_LENGTH: usize = 3;

/// Alert time-to-live in seconds
pub const DEFAULT_ALERT_TTL_SECS: i64 = 5;

/// Reconnect: initial backoff delay in seconds
pub const RECONNECT_INITIAL_SECS: u64 = 1;

/// Reconnect: backoff cap in seconds
pub const RECONNECT_MAX_SECS: u64 = 10;

/// Reconnect: attempts before parking
pub const RECONNECT_MAX_ATTEMPTS: u32 = 5;

/// Reconnect: retry interval while parked, in seconds
pub const RECONNECT_PARK_SECS: u64 = 30;

/// Modes captured in a baseline fingerprint
pub const BASELINE_MODE_COUNT: usize = 4;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "shm-core";
