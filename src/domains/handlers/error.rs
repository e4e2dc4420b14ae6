//! Handler-specific error types.

use thiserror::Error;

/// A handler ran but did not produce a result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerFailure {
    /// The program could not be started.
    #[error("failed to start '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// The program exited unsuccessfully.
    #[error("exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },

    /// Output was required to be JSON but was not.
    #[error("invalid output: {0}")]
    InvalidOutput(String),

    /// The body template could not be rendered.
    #[error("template error: {0}")]
    Render(String),

    /// Any other failure raised by the handler.
    #[error("{0}")]
    Failed(String),
}

impl HandlerFailure {
    /// Create a new "spawn" error.
    pub fn spawn(program: impl Into<String>, reason: impl ToString) -> Self {
        Self::Spawn {
            program: program.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a new "invalid output" error.
    pub fn invalid_output(msg: impl Into<String>) -> Self {
        Self::InvalidOutput(msg.into())
    }

    /// Create a new "render" error.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Create a new generic failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
