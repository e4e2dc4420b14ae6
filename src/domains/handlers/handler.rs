//! The invocable side of a registered function.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::HandlerFailure;
use crate::domains::discovery::OutputFormat;

/// Value produced by a successful handler call.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Text(String),
    Json(Value),
}

impl Output {
    /// Interpret raw handler output according to the declared format.
    pub fn decode(raw: String, format: OutputFormat) -> Result<Self, HandlerFailure> {
        match format {
            OutputFormat::Text => Ok(Self::Text(raw)),
            OutputFormat::Json => serde_json::from_str(raw.trim())
                .map(Self::Json)
                .map_err(|e| HandlerFailure::invalid_output(format!("expected JSON: {e}"))),
            OutputFormat::Auto => match serde_json::from_str::<Value>(raw.trim()) {
                Ok(Value::Null | Value::String(_)) | Err(_) => Ok(Self::Text(raw)),
                Ok(value) => Ok(Self::Json(value)),
            },
        }
    }

    /// Text representation sent over the wire.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

/// A callable bound to a descriptor.
///
/// Arguments have already been validated and coerced against the
/// descriptor's parameter schema when `call` runs.
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    /// Short name of the handler kind, used in logs.
    fn kind(&self) -> &'static str;

    /// Execute the handler.
    async fn call(&self, arguments: Map<String, Value>) -> Result<Output, HandlerFailure>;
}
