//! # Errors
//!
//! Failures that can surface from the emission core.

use thiserror::Error;

/// Emission core error
#[derive(Debug, Error)]
pub enum EmissionError {
    /// JSON config or effect parameters could not be parsed
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// Saved scheduler state could not be encoded or decoded
    #[error("state codec error: {0}")]
    StateCodec(#[from] bincode::Error),

    /// The source this sub-emitter spawns from is gone or dead.
    /// The owner must deactivate the sub-emitter.
    #[error("particle source expired")]
    SourceExpired,

    /// Non-uniform forces were sampled from a snapshot that an area
    /// change has invalidated
    #[error("physics environment snapshot is stale")]
    StaleEnvironment,
}

pub type EmissionResult<T> = Result<T, EmissionError>;
