//! Discovery-specific error types.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Why a module unit (or a whole root) could not be loaded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The configured root does not exist.
    #[error("root does not exist")]
    MissingRoot,

    /// A root that is a file but not a function module.
    #[error("not a function module (expected a .toml file)")]
    NotAModule,

    /// Directory traversal failed.
    #[error("cannot walk directory: {0}")]
    Walk(String),

    /// The module file could not be read.
    #[error("cannot read module: {0}")]
    Read(String),

    /// The module is not valid TOML or does not follow the manifest schema.
    #[error("invalid module: {0}")]
    Parse(String),

    /// A program listed in `requires` is not available.
    #[error("missing dependency: '{0}' not found")]
    MissingDependency(String),

    /// The `init` command is empty.
    #[error("init command is empty")]
    EmptyInit,

    /// The `init` command could not be started.
    #[error("init command '{program}' could not start: {reason}")]
    InitSpawn { program: String, reason: String },

    /// The `init` command exited unsuccessfully.
    #[error("init command failed ({status}): {stderr}")]
    InitFailed { status: String, stderr: String },

    /// A blocking lookup on the worker pool did not complete.
    #[error("background task failed: {0}")]
    Background(String),

    /// Loading took longer than the per-unit timeout.
    #[error("loading timed out after {0:?}")]
    Timeout(Duration),
}

/// A non-fatal scan failure: one unit was skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}: {error}", .location.display())]
pub struct ScanWarning {
    /// The unit or root that failed.
    pub location: PathBuf,

    /// What went wrong.
    pub error: LoadError,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(location: impl AsRef<Path>, error: LoadError) -> Self {
        Self {
            location: location.as_ref().to_path_buf(),
            error,
        }
    }
}
