//! Invocation routing.
//!
//! Every call goes through the same stages:
//! `Received -> Resolved -> Validated -> Executing -> Completed`, or `Failed`
//! at any point. Failures are returned to the caller as [`DispatchError`]s
//! and never take the server down.

use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::coerce::{ExtraArguments, validate};
use super::error::{CancelReason, DispatchError};
use crate::domains::descriptors::ParamSpec;
use crate::domains::handlers::{FunctionHandler, HandlerFailure, Output};
use crate::domains::registry::Registry;

/// What an invocation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// A tool, by name.
    Tool(String),

    /// A resource, by concrete URI.
    Resource(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool(name) => write!(f, "tool '{}'", name),
            Self::Resource(uri) => write!(f, "resource '{}'", uri),
        }
    }
}

/// A single call from the protocol layer.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub selector: Selector,
    pub arguments: Map<String, Value>,
}

impl InvocationRequest {
    pub fn tool(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            selector: Selector::Tool(name.into()),
            arguments,
        }
    }

    /// Read a resource. Arguments come from the URI.
    pub fn resource(uri: impl Into<String>) -> Self {
        Self {
            selector: Selector::Resource(uri.into()),
            arguments: Map::new(),
        }
    }
}

/// A successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub output: Output,

    /// Declared MIME type, for resources.
    pub mime_type: Option<String>,
}

pub type InvocationResult = Result<Completion, DispatchError>;

/// Lifecycle stage of an invocation, as logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Resolved,
    Validated,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Resolved => "resolved",
            Self::Validated => "validated",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Default time limit of a call.
    pub call_timeout: Duration,

    pub extra_arguments: ExtraArguments,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(60),
            extra_arguments: ExtraArguments::default(),
        }
    }
}

/// A resolved call, ready for validation.
struct Target<'a> {
    handler: Arc<dyn FunctionHandler>,
    params: &'a [ParamSpec],
    arguments: Map<String, Value>,
    timeout: Option<Duration>,
    mime_type: Option<String>,
}

/// Routes invocations to their handlers.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(options: DispatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Run one invocation against a registry snapshot.
    #[instrument(skip_all, fields(selector = %request.selector))]
    pub async fn invoke(
        &self,
        registry: &Registry,
        request: InvocationRequest,
        cancel: CancellationToken,
    ) -> InvocationResult {
        debug!(stage = %Stage::Received, "Invocation received");

        let result = self.run(registry, request, &cancel).await;
        match &result {
            Ok(_) => debug!(stage = %Stage::Completed, "Invocation completed"),
            Err(err) => warn!(
                stage = %Stage::Failed,
                kind = %err.kind(),
                error = %err,
                "Invocation failed"
            ),
        }
        result
    }

    async fn run(
        &self,
        registry: &Registry,
        request: InvocationRequest,
        cancel: &CancellationToken,
    ) -> InvocationResult {
        let target = resolve(registry, request)?;
        debug!(stage = %Stage::Resolved, handler = target.handler.kind(), "Selector resolved");

        let arguments = validate(target.params, target.arguments, self.options.extra_arguments)?;
        debug!(stage = %Stage::Validated, arguments = arguments.len(), "Arguments validated");

        let limit = target.timeout.unwrap_or(self.options.call_timeout);
        debug!(stage = %Stage::Executing, timeout_secs = limit.as_secs_f64(), "Executing handler");
        let output = execute(target.handler, arguments, limit, cancel).await?;

        Ok(Completion {
            output,
            mime_type: target.mime_type,
        })
    }
}

fn resolve(registry: &Registry, request: InvocationRequest) -> Result<Target<'_>, DispatchError> {
    let unknown = || DispatchError::UnknownSelector {
        selector: request.selector.to_string(),
    };

    match &request.selector {
        Selector::Tool(name) => {
            let binding = registry.resolve_tool(name).ok_or_else(unknown)?;
            Ok(Target {
                handler: binding.handler.clone(),
                params: &binding.descriptor.params,
                arguments: request.arguments,
                timeout: binding.timeout,
                mime_type: None,
            })
        }
        Selector::Resource(uri) => {
            let (binding, bound) = registry.resolve_resource(uri).ok_or_else(unknown)?;
            Ok(Target {
                handler: binding.handler.clone(),
                params: &binding.descriptor.params,
                arguments: bound,
                timeout: binding.timeout,
                mime_type: binding.descriptor.mime_type.clone(),
            })
        }
    }
}

/// Aborts the handler task when the call is abandoned.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn execute(
    handler: Arc<dyn FunctionHandler>,
    arguments: Map<String, Value>,
    limit: Duration,
    cancel: &CancellationToken,
) -> Result<Output, DispatchError> {
    if cancel.is_cancelled() {
        return Err(DispatchError::Cancelled {
            reason: CancelReason::Caller,
        });
    }

    let mut task = AbortOnDrop(tokio::spawn(async move { handler.call(arguments).await }));

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DispatchError::Cancelled { reason: CancelReason::Caller }),
        joined = &mut task.0 => match joined {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(failure)) => Err(failure.into()),
            Err(err) if err.is_panic() => {
                let message = panic_message(err.into_panic());
                Err(HandlerFailure::failed(format!("handler panicked: {message}")).into())
            }
            Err(_) => Err(DispatchError::Cancelled { reason: CancelReason::Caller }),
        },
        _ = tokio::time::sleep(limit) => Err(DispatchError::Cancelled {
            reason: CancelReason::Timeout(limit),
        }),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
