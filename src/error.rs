//! Core error taxonomy.
//!
//! Each variant maps to one recovery policy: transient input errors drop the
//! sample, discarded windows produce no downstream event, schema mismatches
//! halt the session, a missing autoencoder backend degrades to single-detector
//! scoring, and transport errors drive the reconnect policy.

use uuid::Uuid;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed or out-of-range sample. Dropped, window continues.
    #[error("transient input rejected: {0}")]
    TransientInput(String),

    /// Partial window aged out before all sensors reported enough samples.
    #[error("window discarded: sensor S{sensor_id} had {have} of {need} samples")]
    WindowDiscarded {
        sensor_id: u16,
        have: usize,
        need: usize,
    },

    /// Window shape or feature order does not match the loaded model.
    /// Configuration bug class; fatal for the session until corrected.
    #[error("feature schema mismatch: {detail}")]
    FeatureSchemaMismatch { detail: String },

    /// The autoencoder backend is absent or failed to run. Recoverable.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// `select` was called with an id no `mark` ever produced.
    #[error("baseline not found: {0}")]
    BaselineNotFound(Uuid),

    /// Connection-level failure. Triggers reconnect/backoff.
    #[error("transport error: {0}")]
    Transport(String),

    /// Model artifact could not be read or parsed.
    #[error("model artifact error: {0}")]
    Artifact(String),
}

impl CoreError {
    /// Whether this error halts the session (vs. being absorbed in place).
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(self, CoreError::FeatureSchemaMismatch { .. })
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Transport(err.to_string())
    }
}
