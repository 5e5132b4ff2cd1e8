//! shm-core - structural vibration monitoring, inference-time runtime.
//!
//! Ingests multi-sensor accelerometer telemetry, evaluates signal quality,
//! extracts a fixed-dimension feature vector per window, scores windows
//! against a trained baseline with a two-detector ensemble, compares the
//! live spectral profile against a selectable reference, and emits
//! de-duplicated alerts. Training lives elsewhere; this crate only loads
//! and calls model artifacts.

pub mod config;
pub mod constants;
pub mod error;
pub mod logic;
pub mod server;
pub mod transport;

pub use config::Config;
pub use error::{CoreError, CoreResult};
