//! Error types and handling for the MCP server.
//!
//! Domain errors stay in their domains; this module wraps the ones that can
//! stop the server (startup, reload, transport) into a single type.

use thiserror::Error;

use super::transport::TransportError;
use crate::domains::registry::RegistrationError;

/// A specialized Result type for MCP server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// Two functions claim the same identifier under the `fail` policy.
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport settings or the transport itself failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
