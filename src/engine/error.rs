//! Engine-specific error types.

use thiserror::Error;

/// Result type for remote engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the remote engine collaborator.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to open a query session.
    #[error("failed to start session: {0}")]
    SessionStart(String),

    /// Failed to advance a session to its next page.
    #[error("failed to advance session: {0}")]
    Advance(String),

    /// A caller-supplied projection function failed.
    #[error("projection failed: {0}")]
    Projection(String),

    /// Remote engine returned an error response.
    #[error("engine error: {message} (code: {code})")]
    Remote {
        /// Error code from the engine.
        code: String,
        /// Human-readable error message.
        message: String,
    },
}

impl EngineError {
    /// Create a remote error from an engine error response.
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }
}
