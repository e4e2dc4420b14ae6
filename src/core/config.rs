//! Configuration management for the MCP server.
//!
//! Settings come from defaults, then a `.env` file, then `MCP_*`
//! environment variables. Command-line flags are applied on top by
//! `main.rs`.

use super::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::error::{Error, Result};
use crate::domains::dispatch::ExtraArguments;

/// Main configuration structure for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Function discovery and invocation.
    pub functions: FunctionsConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// What to do when two functions claim the same identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnDuplicate {
    /// Abort startup, or reject the reload and keep the previous registry.
    #[default]
    Fail,

    /// Keep the first registration and log the second.
    Skip,

    /// Let the later registration overwrite the earlier one.
    Replace,
}

impl FromStr for OnDuplicate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            "replace" => Ok(Self::Replace),
            other => Err(format!(
                "unknown duplicate policy '{}' (expected fail, skip or replace)",
                other
            )),
        }
    }
}

impl fmt::Display for OnDuplicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => f.write_str("fail"),
            Self::Skip => f.write_str("skip"),
            Self::Replace => f.write_str("replace"),
        }
    }
}

/// Function discovery and invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionsConfig {
    /// Roots scanned for function modules, in order.
    pub dirs: Vec<PathBuf>,

    /// Upper bound on loading one module, in seconds.
    pub load_timeout_secs: u64,

    /// Default upper bound on one call, in seconds.
    pub call_timeout_secs: u64,

    /// Treatment of undeclared arguments.
    pub extra_arguments: ExtraArguments,

    /// Duplicate identifier policy.
    pub on_duplicate: OnDuplicate,
}

impl FunctionsConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self {
            dirs: vec![PathBuf::from("functions")],
            load_timeout_secs: 10,
            call_timeout_secs: 60,
            extra_arguments: ExtraArguments::default(),
            on_duplicate: OnDuplicate::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Forces debug level regardless of `level`.
    pub debug: bool,
}

impl LoggingConfig {
    /// Level actually used by the subscriber.
    pub fn effective_level(&self) -> &str {
        if self.debug { "debug" } else { &self.level }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            debug: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "functions-mcp-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            functions: FunctionsConfig::default(),
            logging: LoggingConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables are expected to be prefixed with `MCP_`.
    /// For example: `MCP_FUNCTION_DIRS`, `MCP_LOG_LEVEL`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Some(debug) = parse_var::<String>("MCP_DEBUG")? {
            config.logging.debug = parse_flag(&debug);
        }

        if let Some(dirs) = std::env::var_os("MCP_FUNCTION_DIRS") {
            config.functions.dirs = std::env::split_paths(&dirs)
                .filter(|dir| !dir.as_os_str().is_empty())
                .collect();
        }

        if let Some(secs) = parse_var("MCP_LOAD_TIMEOUT_SECS")? {
            config.functions.load_timeout_secs = secs;
        }

        if let Some(secs) = parse_var("MCP_CALL_TIMEOUT_SECS")? {
            config.functions.call_timeout_secs = secs;
        }

        if let Some(mode) = parse_var("MCP_EXTRA_ARGUMENTS")? {
            config.functions.extra_arguments = mode;
        }

        if let Some(policy) = parse_var("MCP_ON_DUPLICATE")? {
            config.functions.on_duplicate = policy;
        }

        config.transport = TransportConfig::from_env()?;

        Ok(config)
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::config(format!("{name}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
