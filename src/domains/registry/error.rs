//! Registry-specific error types.

use thiserror::Error;

use crate::domains::discovery::SourceLocation;

/// Errors raised while building a registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// A binding with the same key is already registered.
    #[error("duplicate identifier '{key}': declared at {existing} and again at {incoming}")]
    DuplicateIdentifier {
        key: String,
        existing: SourceLocation,
        incoming: SourceLocation,
    },
}
