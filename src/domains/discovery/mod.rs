//! Discovery domain module.
//!
//! Finds function modules on disk and turns their marked functions into
//! candidates for registration.
//!
//! ## Architecture
//!
//! - `manifest.rs` - Function module schema (TOML) and candidate types
//! - `scanner.rs` - Recursive, failure-isolated module scanner
//! - `error.rs` - Load failures and scan warnings
//!
//! ## Adding a New Tool
//!
//! 1. Write a `.toml` module under one of the configured roots
//! 2. Declare a `[[function]]` with a body (`command`, `text` or `builtin`)
//! 3. Mark it with `tool = {}` (or `resource = { uri = "..." }`)
//! 4. Reload the server (SIGHUP, `POST /reload`, or restart)
//!
//! **No server code changes are needed.**

mod error;
pub mod manifest;
mod scanner;

pub use error::{LoadError, ScanWarning};
pub use manifest::{
    Candidate, FunctionDecl, ModuleContext, ModuleHeader, ModuleManifest, OutputFormat, ParamDecl,
    SourceLocation,
};
pub use scanner::{ModuleScanner, ScanEvent, ScanOptions, enumerate_units, load_unit};
