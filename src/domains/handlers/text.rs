//! Inline text template handler.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::HandlerFailure;
use super::handler::{FunctionHandler, Output};
use super::render::render;
use crate::domains::discovery::OutputFormat;

/// Renders a template with the call arguments.
#[derive(Debug, Clone)]
pub struct TextHandler {
    template: String,
    output: OutputFormat,
}

impl TextHandler {
    pub fn new(template: impl Into<String>, output: OutputFormat) -> Self {
        Self {
            template: template.into(),
            output,
        }
    }
}

#[async_trait]
impl FunctionHandler for TextHandler {
    fn kind(&self) -> &'static str {
        "text"
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<Output, HandlerFailure> {
        let rendered = render(&self.template, &arguments)?;
        Output::decode(rendered, self.output)
    }
}
