//! Dispatch-specific error types.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::domains::descriptors::ParamType;
use crate::domains::handlers::HandlerFailure;

/// Stable classification of a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnknownSelector,
    MissingArgument,
    TypeMismatch,
    UnexpectedArgument,
    HandlerError,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownSelector => "UnknownSelector",
            Self::MissingArgument => "MissingArgument",
            Self::TypeMismatch => "TypeMismatch",
            Self::UnexpectedArgument => "UnexpectedArgument",
            Self::HandlerError => "HandlerError",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an invocation stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller withdrew the request.
    Caller,

    /// The call ran past its time limit.
    Timeout(Duration),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Caller => f.write_str("cancelled by the caller"),
            Self::Timeout(limit) => write!(f, "timed out after {}s", limit.as_secs_f64()),
        }
    }
}

/// A failed invocation. Never fatal to the server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("unknown {selector}")]
    UnknownSelector { selector: String },

    #[error("missing required argument '{name}'")]
    MissingArgument { name: String },

    #[error("argument '{name}' must be {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: ParamType,
        found: String,
    },

    #[error("unexpected argument '{name}'")]
    UnexpectedArgument { name: String },

    #[error("handler failed: {message}")]
    HandlerError { message: String },

    #[error("{reason}")]
    Cancelled { reason: CancelReason },
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownSelector { .. } => ErrorKind::UnknownSelector,
            Self::MissingArgument { .. } => ErrorKind::MissingArgument,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::UnexpectedArgument { .. } => ErrorKind::UnexpectedArgument,
            Self::HandlerError { .. } => ErrorKind::HandlerError,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Create a new "handler error" error.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::HandlerError {
            message: message.into(),
        }
    }
}

impl From<HandlerFailure> for DispatchError {
    fn from(failure: HandlerFailure) -> Self {
        Self::handler(failure.to_string())
    }
}
