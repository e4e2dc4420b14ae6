//! Native handlers compiled into the host.
//!
//! A module refers to one by name (`builtin = "echo"`). The catalog is
//! populated by explicit registration calls before the first scan; a
//! function naming a builtin the catalog does not know is skipped.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::error::HandlerFailure;
use super::handler::{FunctionHandler, Output};

/// A native function.
#[async_trait]
pub trait Builtin: Send + Sync {
    /// Name used by modules to refer to this builtin.
    fn name(&self) -> &'static str;

    /// Execute the builtin.
    async fn call(&self, arguments: Map<String, Value>) -> Result<Output, HandlerFailure>;
}

/// Registered builtins, by name.
#[derive(Clone, Default)]
pub struct BuiltinCatalog {
    builtins: BTreeMap<&'static str, Arc<dyn Builtin>>,
}

impl BuiltinCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the builtins shipped with the server.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.register(EchoBuiltin);
        catalog.register(NowBuiltin);
        catalog.register(SleepBuiltin);
        catalog
    }

    /// Register a builtin, replacing any previous one of the same name.
    pub fn register(&mut self, builtin: impl Builtin + 'static) {
        self.builtins.insert(builtin.name(), Arc::new(builtin));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Builtin>> {
        self.builtins.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.builtins.keys().copied().collect()
    }
}

impl std::fmt::Debug for BuiltinCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinCatalog").field("builtins", &self.names()).finish()
    }
}

/// Adapts a catalog entry to the handler interface.
#[derive(Clone)]
pub struct BuiltinHandler {
    builtin: Arc<dyn Builtin>,
}

impl BuiltinHandler {
    pub fn new(builtin: Arc<dyn Builtin>) -> Self {
        Self { builtin }
    }
}

#[async_trait]
impl FunctionHandler for BuiltinHandler {
    fn kind(&self) -> &'static str {
        "builtin"
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<Output, HandlerFailure> {
        self.builtin.call(arguments).await
    }
}

/// Returns its arguments.
pub struct EchoBuiltin;

#[async_trait]
impl Builtin for EchoBuiltin {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<Output, HandlerFailure> {
        Ok(Output::Json(Value::Object(arguments)))
    }
}

/// Current UTC time, RFC 3339 or a `format` in strftime syntax.
pub struct NowBuiltin;

#[async_trait]
impl Builtin for NowBuiltin {
    fn name(&self) -> &'static str {
        "now"
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<Output, HandlerFailure> {
        let now = Utc::now();
        let text = match arguments.get("format").and_then(Value::as_str) {
            Some(format) => {
                use std::fmt::Write;
                let mut text = String::new();
                write!(text, "{}", now.format(format)).map_err(|_| {
                    HandlerFailure::failed(format!("invalid time format '{format}'"))
                })?;
                text
            }
            None => now.to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        Ok(Output::Text(text))
    }
}

/// Waits `seconds` (default 1) before answering.
pub struct SleepBuiltin;

#[async_trait]
impl Builtin for SleepBuiltin {
    fn name(&self) -> &'static str {
        "sleep"
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<Output, HandlerFailure> {
        let seconds = match arguments.get("seconds") {
            None | Some(Value::Null) => 1.0,
            Some(value) => value
                .as_f64()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| HandlerFailure::failed("seconds must be a non-negative number"))?,
        };
        let duration = Duration::try_from_secs_f64(seconds)
            .map_err(|e| HandlerFailure::failed(format!("seconds out of range: {e}")))?;
        tokio::time::sleep(duration).await;
        Ok(Output::Json(json!({ "slept": seconds })))
    }
}
