//! # Streaming Error Types
//!
//! All errors that can occur in the terrain streaming subsystem.
//!
//! None of these reach the renderer: the session converts them into
//! missing cache state and retries on the next pass.

use terravox_shared::{GenerationError, ParseKeyError};
use thiserror::Error;

/// Errors that can occur in the streaming subsystem.
///
/// `Clone` so that one pending result can be shared by every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerrainError {
    /// The terrain generator rejected a request.
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// The worker pool is shut down or dropped the request.
    #[error("worker pool unavailable")]
    WorkerUnavailable,

    /// A worker panicked while serving a request.
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    /// A reply did not match its request.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A compressed chunk column could not be decoded.
    #[error("failed to decompress column {key}: {reason}")]
    Decompression {
        /// Chunk column key (`x:z`).
        key: String,
        /// Decoder message.
        reason: String,
    },

    /// A column message carried an unparsable key.
    #[error(transparent)]
    InvalidKey(#[from] ParseKeyError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The session was aborted before the result arrived.
    #[error("session aborted")]
    Aborted,

    /// No tokio runtime is available to drive completions.
    #[error("no tokio runtime available")]
    NoRuntime,
}

/// Result type for streaming operations.
pub type TerrainResult<T> = Result<T, TerrainError>;
