//! Descriptor-specific error types.

use thiserror::Error;

use crate::domains::discovery::SourceLocation;

/// A malformed URI template.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unbalanced braces at byte {0}")]
    UnbalancedBraces(usize),

    #[error("invalid placeholder name '{0}'")]
    InvalidPlaceholder(String),

    #[error("placeholder '{0}' appears more than once")]
    DuplicatePlaceholder(String),

    #[error("template is empty")]
    Empty,
}

/// Why a candidate could not be turned into a descriptor or a handler.
///
/// Extraction errors skip the offending candidate only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("{location}: identifier is empty")]
    EmptyIdentifier { location: SourceLocation },

    #[error("{location}: identifier '{name}' must be 1-64 characters of [A-Za-z0-9_.-]")]
    InvalidIdentifier { name: String, location: SourceLocation },

    #[error("{location}: identifier '{name}' is reserved by the protocol")]
    ReservedIdentifier { name: String, location: SourceLocation },

    #[error("{location}: function is not marked as a tool or a resource")]
    Unmarked { location: SourceLocation },

    #[error("{location}: function is marked both as a tool and as a resource")]
    ConflictingMarks { location: SourceLocation },

    #[error("{location}: parameter #{index} has an empty name")]
    EmptyParamName { index: usize, location: SourceLocation },

    #[error("{location}: parameter '{param}' is declared more than once")]
    DuplicateParam { param: String, location: SourceLocation },

    #[error("{location}: parameter '{param}': {reason}")]
    UnknownType {
        param: String,
        reason: String,
        location: SourceLocation,
    },

    #[error("{location}: default of parameter '{param}' is not a valid {expected}")]
    InvalidDefault {
        param: String,
        expected: String,
        location: SourceLocation,
    },

    #[error("{location}: URI template '{template}': {source}")]
    InvalidTemplate {
        template: String,
        #[source]
        source: TemplateError,
        location: SourceLocation,
    },

    #[error("{location}: placeholder '{placeholder}' has no matching parameter")]
    PlaceholderWithoutParam {
        placeholder: String,
        location: SourceLocation,
    },

    #[error("{location}: parameter '{param}' does not appear in the URI template")]
    ParamWithoutPlaceholder { param: String, location: SourceLocation },

    #[error("{location}: function has no body (command, text or builtin)")]
    MissingBody { location: SourceLocation },

    #[error("{location}: function declares more than one body")]
    ConflictingBodies { location: SourceLocation },

    #[error("{location}: command is empty")]
    EmptyCommand { location: SourceLocation },

    #[error("{location}: unknown builtin '{name}'")]
    UnknownBuiltin { name: String, location: SourceLocation },
}

impl ExtractionError {
    /// Where the offending candidate was declared.
    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::EmptyIdentifier { location }
            | Self::InvalidIdentifier { location, .. }
            | Self::ReservedIdentifier { location, .. }
            | Self::Unmarked { location }
            | Self::ConflictingMarks { location }
            | Self::EmptyParamName { location, .. }
            | Self::DuplicateParam { location, .. }
            | Self::UnknownType { location, .. }
            | Self::InvalidDefault { location, .. }
            | Self::InvalidTemplate { location, .. }
            | Self::PlaceholderWithoutParam { location, .. }
            | Self::ParamWithoutPlaceholder { location, .. }
            | Self::MissingBody { location }
            | Self::ConflictingBodies { location }
            | Self::EmptyCommand { location }
            | Self::UnknownBuiltin { location, .. } => location,
        }
    }
}
