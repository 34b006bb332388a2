//! Error types for the session binary.
//!
//! [`EngineError`] wraps every failure mode of startup, so `main` can
//! propagate with `?`. Once the session loop runs nothing is fatal; the
//! loop reports how it ended instead.

/// Top-level error for the session binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: sotf_core::ConfigError,
    },

    /// Session assembly failed (trait catalog).
    #[error("session error: {source}")]
    Session {
        /// The underlying session error.
        #[from]
        source: sotf_core::SessionError,
    },

    /// NATS connection or subscription failed.
    #[error("NATS error: {message}")]
    Nats {
        /// Description of the NATS failure.
        message: String,
    },
}
