//! MCP Server implementation and lifecycle management.
//!
//! This module contains the protocol handler. It knows nothing about how
//! functions are found or run: it asks the [`FunctionHost`] for the current
//! capabilities and forwards every call to [`FunctionHost::invoke`].

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::*,
    service::RequestContext,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::config::Config;
use super::error::Result;
use super::host::{FunctionHost, ScanReport};
use crate::domains::descriptors::{ResourceDescriptor, ToolDescriptor};
use crate::domains::dispatch::{Completion, DispatchError, ErrorKind, InvocationRequest};
use crate::domains::handlers::Output;

const INSTRUCTIONS: &str = "Tools and resources of this server are loaded from function modules \
     on disk. The listings change when the server reloads its modules.";

/// The main MCP server handler.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Registered functions.
    host: Arc<FunctionHost>,
}

impl McpServer {
    /// Create a new MCP server around a function host.
    pub fn new(config: Config, host: Arc<FunctionHost>) -> Self {
        Self {
            config: Arc::new(config),
            host,
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn host(&self) -> &Arc<FunctionHost> {
        &self.host
    }

    /// Usage notes sent to clients on initialization.
    pub fn instructions(&self) -> &'static str {
        INSTRUCTIONS
    }

    /// Rescan the function roots and publish the result.
    pub async fn reload(&self) -> Result<ScanReport> {
        self.host.reload().await
    }

    /// Every registered tool, in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.host.capabilities().tools.iter().map(to_tool).collect()
    }

    /// Resources addressed by a single URI.
    pub fn resources(&self) -> Vec<Resource> {
        self.host
            .capabilities()
            .resources
            .iter()
            .filter(|r| r.template.is_concrete())
            .map(to_resource)
            .collect()
    }

    /// Resources addressed by a URI template with placeholders.
    pub fn resource_templates(&self) -> Vec<ResourceTemplate> {
        self.host
            .capabilities()
            .resources
            .iter()
            .filter(|r| !r.template.is_concrete())
            .map(to_resource_template)
            .collect()
    }

    /// Invoke a tool.
    ///
    /// Handler failures are reported inside the result with `is_error` set;
    /// selector and argument problems are protocol errors.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
        cancel: CancellationToken,
    ) -> std::result::Result<CallToolResult, McpError> {
        let request = InvocationRequest::tool(name, arguments.unwrap_or_default());
        match self.host.invoke(request, cancel).await {
            Ok(completion) => Ok(to_call_result(completion)),
            Err(err @ DispatchError::HandlerError { .. }) => Ok(CallToolResult {
                content: vec![Content::text(err.to_string())],
                structured_content: Some(error_data(&err)),
                is_error: Some(true),
                meta: None,
            }),
            Err(err) => Err(to_mcp_error(err)),
        }
    }

    /// Read a resource by concrete URI.
    pub async fn read(
        &self,
        uri: &str,
        cancel: CancellationToken,
    ) -> std::result::Result<ReadResourceResult, McpError> {
        let completion = self
            .host
            .invoke(InvocationRequest::resource(uri), cancel)
            .await
            .map_err(to_mcp_error)?;
        Ok(to_read_result(uri, completion))
    }
}

/// Convert a tool descriptor to its protocol form.
pub fn to_tool(descriptor: &ToolDescriptor) -> Tool {
    Tool {
        name: descriptor.name.clone().into(),
        description: (!descriptor.description.is_empty())
            .then(|| descriptor.description.clone().into()),
        input_schema: Arc::new(descriptor.input_schema()),
        annotations: None,
        output_schema: None,
        icons: None,
        meta: None,
        title: None,
    }
}

/// Convert a concrete resource descriptor to its protocol form.
pub fn to_resource(descriptor: &ResourceDescriptor) -> Resource {
    let mut raw = RawResource::new(descriptor.uri_template(), descriptor.name.clone());
    raw.description = (!descriptor.description.is_empty()).then(|| descriptor.description.clone());
    raw.mime_type = descriptor.mime_type.clone();
    raw.no_annotation()
}

/// Convert a templated resource descriptor to its protocol form.
pub fn to_resource_template(descriptor: &ResourceDescriptor) -> ResourceTemplate {
    RawResourceTemplate {
        uri_template: descriptor.uri_template().to_string(),
        name: descriptor.name.clone(),
        title: None,
        description: (!descriptor.description.is_empty()).then(|| descriptor.description.clone()),
        mime_type: descriptor.mime_type.clone(),
    }
    .no_annotation()
}

fn to_call_result(completion: Completion) -> CallToolResult {
    let text = completion.output.to_text();
    match completion.output {
        Output::Json(value @ Value::Object(_)) => CallToolResult {
            content: vec![Content::text(text)],
            structured_content: Some(value),
            is_error: Some(false),
            meta: None,
        },
        _ => CallToolResult::success(vec![Content::text(text)]),
    }
}

fn to_read_result(uri: &str, completion: Completion) -> ReadResourceResult {
    let mime_type = completion.mime_type.or_else(|| {
        completion
            .output
            .is_json()
            .then(|| "application/json".to_string())
    });
    ReadResourceResult {
        contents: vec![ResourceContents::TextResourceContents {
            uri: uri.to_string(),
            mime_type,
            text: completion.output.to_text(),
            meta: None,
        }],
    }
}

fn error_data(err: &DispatchError) -> Value {
    json!({ "kind": err.kind().as_str(), "message": err.to_string() })
}

/// Map a dispatch failure to a protocol error carrying its kind.
pub fn to_mcp_error(err: DispatchError) -> McpError {
    let data = Some(error_data(&err));
    let message = err.to_string();
    match err.kind() {
        ErrorKind::UnknownSelector => match err {
            DispatchError::UnknownSelector { ref selector } if selector.starts_with("resource") => {
                McpError::resource_not_found(message, data)
            }
            _ => McpError::invalid_params(message, data),
        },
        ErrorKind::MissingArgument | ErrorKind::TypeMismatch | ErrorKind::UnexpectedArgument => {
            McpError::invalid_params(message, data)
        }
        ErrorKind::HandlerError | ErrorKind::Cancelled => McpError::internal_error(message, data),
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    #[instrument(skip(self, _context))]
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        info!("Listing tools");
        Ok(ListToolsResult {
            tools: self.tools(),
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, request, context), fields(tool = %request.name))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!("Calling tool");
        self.call(&request.name, request.arguments, context.ct).await
    }

    #[instrument(skip(self, _context))]
    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListResourcesResult, McpError> {
        info!("Listing resources");
        Ok(ListResourcesResult {
            resources: self.resources(),
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, _context))]
    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListResourceTemplatesResult, McpError> {
        info!("Listing resource templates");
        Ok(ListResourceTemplatesResult {
            resource_templates: self.resource_templates(),
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, context))]
    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<ReadResourceResult, McpError> {
        info!("Reading resource: {}", request.uri);
        self.read(&request.uri, context.ct).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FunctionsConfig;
    use crate::domains::dispatch::CancelReason;
    use crate::domains::handlers::BuiltinCatalog;
    use std::fs;
    use tempfile::TempDir;

    const MODULE: &str = r#"
        [[function]]
        name = "echo_args"
        description = "Return the arguments."
        params = [
            { name = "text", type = "string" },
            { name = "count", type = "integer", default = 1 },
        ]
        builtin = "echo"
        tool = {}

        [[function]]
        name = "shout"
        params = [{ name = "text", type = "string" }]
        text = "{{text}}!"
        output = "text"
        tool = {}

        [[function]]
        name = "nap"
        params = [{ name = "seconds", type = "float" }]
        builtin = "sleep"
        tool = {}

        [[function]]
        name = "about"
        text = "{\"server\": \"functions\"}"
        resource = { uri = "info://about" }

        [[function]]
        name = "record"
        params = [{ name = "id", type = "integer" }]
        text = "record {{id}}"
        output = "text"
        resource = { uri = "file://data/{id}", mime_type = "text/plain" }
    "#;

    async fn server() -> (TempDir, McpServer) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("demo.toml"), MODULE).unwrap();
        let functions = FunctionsConfig {
            dirs: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        let host = Arc::new(FunctionHost::new(&functions, BuiltinCatalog::with_defaults()));
        host.reload().await.unwrap();
        (dir, McpServer::new(Config::default(), host))
    }

    #[tokio::test]
    async fn test_tool_listing() {
        let (_dir, server) = server().await;
        let tools = server.tools();
        let names: Vec<_> = tools.iter().map(|t| t.name.to_string()).collect();
        assert_eq!(names, vec!["echo_args", "shout", "nap"]);

        let schema = &tools[0].input_schema;
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["required"], json!(["text"]));
        assert_eq!(tools[0].description.as_deref(), Some("Return the arguments."));
        assert_eq!(tools[1].description, None);
    }

    #[tokio::test]
    async fn test_resource_listings_split_by_template() {
        let (_dir, server) = server().await;

        let resources = server.resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].raw.uri, "info://about");

        let templates = server.resource_templates();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].raw.uri_template, "file://data/{id}");
        assert_eq!(templates[0].raw.mime_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_call_returns_structured_content() {
        let (_dir, server) = server().await;
        let arguments = json!({"text": "hi", "count": "3"}).as_object().cloned();
        let result = server.call("echo_args", arguments, CancellationToken::new()).await.unwrap();
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.structured_content, Some(json!({"text": "hi", "count": 3})));
    }

    #[tokio::test]
    async fn test_call_errors() {
        let (_dir, server) = server().await;

        let err = server.call("nope", None, CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(
            err.data,
            Some(json!({"kind": "UnknownSelector", "message": "unknown tool 'nope'"}))
        );

        let err = server.call("shout", None, CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.data.unwrap()["kind"], "MissingArgument");
    }

    #[tokio::test]
    async fn test_call_stops_when_cancelled() {
        let (_dir, server) = server().await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let arguments = json!({"seconds": 30}).as_object().cloned();
        let started = std::time::Instant::now();
        let err = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            server.call("nap", arguments, cancel),
        )
        .await
        .expect("cancellation did not stop the call")
        .unwrap_err();

        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(err.data.unwrap()["kind"], "Cancelled");
    }

    #[tokio::test]
    async fn test_read_resource() {
        let (_dir, server) = server().await;

        let result = server.read("file://data/7", CancellationToken::new()).await.unwrap();
        match &result.contents[0] {
            ResourceContents::TextResourceContents { uri, mime_type, text, .. } => {
                assert_eq!(uri, "file://data/7");
                assert_eq!(mime_type.as_deref(), Some("text/plain"));
                assert_eq!(text, "record 7");
            }
            other => panic!("unexpected contents: {other:?}"),
        }

        let result = server.read("info://about", CancellationToken::new()).await.unwrap();
        match &result.contents[0] {
            ResourceContents::TextResourceContents { mime_type, .. } => {
                assert_eq!(mime_type.as_deref(), Some("application/json"));
            }
            other => panic!("unexpected contents: {other:?}"),
        }

        let err = server.read("file://nothing", CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);
    }

    #[test]
    fn test_error_mapping() {
        let err = to_mcp_error(DispatchError::Cancelled {
            reason: CancelReason::Caller,
        });
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(err.data.unwrap()["kind"], "Cancelled");
    }
}
