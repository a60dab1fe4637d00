//! Error types for the settle stabilization runtime.
//!
//! Only [`DigestError`] escapes the engine's public operations. Failures raised by
//! caller code (read functions, reactions, deferred tasks) are never returned; they
//! are handed to the tree's [`ErrorReporter`](crate::report::ErrorReporter).

use crate::digest::Phase;
use thiserror::Error;

/// Fatal engine errors
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("{ttl} digest iterations reached without stabilizing")]
    StabilizationExceeded { ttl: u32 },

    #[error("cannot begin {requested} while {active} is already in progress")]
    PhaseConflict { active: Phase, requested: Phase },

    #[error("digest parent belongs to a different scope tree")]
    ForeignScope,
}

/// Configuration and logging setup errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
