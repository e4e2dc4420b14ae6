//! HTTP transport implementation.
//!
//! HTTP server with JSON-RPC over POST requests.
//! This allows standard HTTP clients (curl, browsers, etc.) to communicate with the MCP server.
//! Requests are stateless: every call runs against the registry published
//! at the moment it arrives.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rmcp::ErrorData as McpError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, instrument, warn};

use super::{TransportError, TransportResult, config::HttpConfig};
use crate::core::McpServer;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// HTTP transport handler.
pub struct HttpTransport {
    config: HttpConfig,
}

/// JSON-RPC request structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Carry a protocol error over unchanged, including its data.
    pub fn from_mcp(id: Option<Value>, err: McpError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: err.code.0,
                message: err.message.into_owned(),
                data: err.data,
            }),
        }
    }

    /// Method not found error.
    pub fn method_not_found(id: Option<Value>) -> Self {
        Self::error(id, -32601, "Method not found")
    }

    /// Invalid request error.
    pub fn invalid_request(id: Option<Value>) -> Self {
        Self::error(id, -32600, "Invalid Request")
    }

    /// Invalid params error.
    pub fn invalid_params(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, -32602, msg)
    }

    /// Internal error.
    pub fn internal_error(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, -32603, msg)
    }
}

/// Application state shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The MCP server instance.
    server: McpServer,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given config.
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Build the router without binding a socket.
    pub fn router(&self, server: McpServer) -> Router {
        let mut app = Router::new()
            .route(&self.config.rpc_path, post(handle_rpc))
            .route("/health", get(health_check))
            .route("/", get(root_handler));

        if let Some(path) = &self.config.reload_path {
            app = app.route(path, post(handle_reload));
        }

        let mut app = app.with_state(AppState { server });

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            app = app.layer(cors);
        }

        app
    }

    /// Run the HTTP transport.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        let addr = self.address();
        let app = self.router(server);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        let cors_status = if self.config.enable_cors {
            "enabled"
        } else {
            "disabled"
        };
        info!(
            "Ready - listening on {} (JSON-RPC over HTTP, CORS {})",
            addr, cors_status
        );
        info!("  → JSON-RPC: POST {}", self.config.rpc_path);
        info!("  → Health:   GET /health");
        if let Some(path) = &self.config.reload_path {
            info!("  → Reload:   POST {}", path);
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| TransportError::http(e.to_string()))?;

        Ok(())
    }
}

/// Root handler - provides API info.
async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": state.server.name(),
        "version": state.server.version(),
        "transport": "HTTP",
        "protocol": "JSON-RPC 2.0",
        "generation": state.server.host().generation(),
    }))
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.server.host().registry();
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "tools": registry.tool_count(),
        "resources": registry.resource_count(),
    }))
}

/// Rescan the function roots.
///
/// A rejected reload answers 409 and leaves the published registry alone.
#[instrument(skip_all)]
async fn handle_reload(State(state): State<AppState>) -> impl IntoResponse {
    info!("Reload requested over HTTP");
    match state.server.reload().await {
        Ok(report) => {
            let mut body = report.summary();
            body["generation"] = json!(state.server.host().generation());
            (StatusCode::OK, Json(body))
        }
        Err(e) => (StatusCode::CONFLICT, Json(json!({ "error": e.to_string() }))),
    }
}

/// Handle JSON-RPC requests.
#[instrument(skip_all, fields(method))]
async fn handle_rpc(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    tracing::Span::current().record("method", &request.method);
    info!("Received JSON-RPC request: {}", request.method);

    let response = process_request(&state, request).await;

    (StatusCode::OK, Json(response))
}

/// Process a JSON-RPC request and return the response.
async fn process_request(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::invalid_request(request.id);
    }

    match request.method.as_str() {
        "initialize" => handle_initialize(state, request),
        "ping" => JsonRpcResponse::success(request.id, json!({})),
        "tools/list" => {
            JsonRpcResponse::success(request.id, json!({ "tools": state.server.tools() }))
        }
        "tools/call" => handle_tools_call(state, request).await,
        "resources/list" => {
            JsonRpcResponse::success(request.id, json!({ "resources": state.server.resources() }))
        }
        "resources/templates/list" => JsonRpcResponse::success(
            request.id,
            json!({ "resourceTemplates": state.server.resource_templates() }),
        ),
        "resources/read" => handle_resources_read(state, request).await,

        // Stateless transport: nothing to acknowledge
        method if method.starts_with("notifications/") => {
            info!("Received notification: {}", method);
            JsonRpcResponse::success(request.id, Value::Null)
        }

        _ => {
            warn!("Unknown method: {}", request.method);
            JsonRpcResponse::method_not_found(request.id)
        }
    }
}

fn handle_initialize(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    info!("Processing initialize request");

    let result = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {},
            "resources": {}
        },
        "serverInfo": {
            "name": state.server.name(),
            "version": state.server.version()
        },
        "instructions": state.server.instructions()
    });

    JsonRpcResponse::success(request.id, result)
}

/// Handle tools/call request.
async fn handle_tools_call(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let Some(params) = request.params else {
        return JsonRpcResponse::invalid_params(request.id, "Missing params");
    };

    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::invalid_params(request.id, "Missing tool name");
    };

    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => {
            return JsonRpcResponse::invalid_params(request.id, "Tool arguments must be an object");
        }
    };

    // Dropping this future (client gone) aborts the handler as well.
    match state.server.call(name, arguments, CancellationToken::new()).await {
        Ok(result) => to_response(request.id, &result),
        Err(e) => JsonRpcResponse::from_mcp(request.id, e),
    }
}

/// Handle resources/read request.
async fn handle_resources_read(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let Some(params) = request.params else {
        return JsonRpcResponse::invalid_params(request.id, "Missing params");
    };

    let Some(uri) = params.get("uri").and_then(Value::as_str) else {
        return JsonRpcResponse::invalid_params(request.id, "Missing resource URI");
    };

    match state.server.read(uri, CancellationToken::new()).await {
        Ok(result) => to_response(request.id, &result),
        Err(e) => JsonRpcResponse::from_mcp(request.id, e),
    }
}

fn to_response<T: Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::internal_error(id, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Config, FunctionsConfig};
    use crate::core::host::FunctionHost;
    use crate::domains::handlers::BuiltinCatalog;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn state() -> (TempDir, AppState) {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("greet.toml"),
            r#"
                [[function]]
                name = "greet"
                params = [{ name = "who", type = "string" }]
                text = "hello {{who}}"
                output = "text"
                tool = {}
            "#,
        )
        .unwrap();
        let functions = FunctionsConfig {
            dirs: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        let host = Arc::new(FunctionHost::new(&functions, BuiltinCatalog::with_defaults()));
        host.reload().await.unwrap();
        let server = McpServer::new(Config::default(), host);
        (dir, AppState { server })
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    #[tokio::test]
    async fn test_tools_call_over_rpc() {
        let (_dir, state) = state().await;
        let response = process_request(
            &state,
            request("tools/call", json!({"name": "greet", "arguments": {"who": "world"}})),
        )
        .await;

        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["text"], "hello world");
        assert_eq!(result["isError"], false);
    }

    #[tokio::test]
    async fn test_errors_keep_their_kind() {
        let (_dir, state) = state().await;
        let call = request("tools/call", json!({"name": "greet"}));
        let response = process_request(&state, call).await;

        let error = response.error.unwrap();
        assert_eq!(error.code, -32602);
        assert_eq!(error.data.unwrap()["kind"], "MissingArgument");
    }

    #[tokio::test]
    async fn test_unknown_method_and_version() {
        let (_dir, state) = state().await;

        let response = process_request(&state, request("prompts/list", json!({}))).await;
        assert_eq!(response.error.unwrap().code, -32601);

        let mut bad = request("tools/list", json!({}));
        bad.jsonrpc = "1.0".to_string();
        let response = process_request(&state, bad).await;
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_tools_list_over_rpc() {
        let (_dir, state) = state().await;
        let response = process_request(&state, request("tools/list", json!({}))).await;
        let tools = &response.result.unwrap()["tools"];
        assert_eq!(tools[0]["name"], "greet");
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["who"]));
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        use axum::body::{Body, to_bytes};
        use axum::http::Request;
        use tower::ServiceExt;

        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_reload_route_publishes_new_modules() {
        let (dir, state) = state().await;
        let transport = HttpTransport::new(HttpConfig::default());
        let app = transport.router(state.server.clone());

        std::fs::write(
            dir.path().join("extra.toml"),
            "[[function]]\nname = \"shout\"\ntext = \"HEY\"\ntool = {}\n",
        )
        .unwrap();

        let (status, body) = send(app.clone(), "POST", "/reload").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tools"], 2);
        assert_eq!(body["generation"], 2);

        let (status, body) = send(app, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tools"], 2);
    }

    #[tokio::test]
    async fn test_rejected_reload_is_a_conflict() {
        let (dir, state) = state().await;
        let app = HttpTransport::new(HttpConfig::default()).router(state.server.clone());

        std::fs::write(
            dir.path().join("clash.toml"),
            "[[function]]\nname = \"greet\"\ntext = \"again\"\ntool = {}\n",
        )
        .unwrap();

        let (status, body) = send(app, "POST", "/reload").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("greet"));
        assert_eq!(state.server.host().generation(), 1);
        let arguments = json!({"who": "x"}).as_object().cloned();
        tokio_test::assert_ok!(
            state.server.call("greet", arguments, CancellationToken::new()).await
        );
    }

    #[tokio::test]
    async fn test_reload_route_can_be_disabled() {
        let (_dir, state) = state().await;
        let config = HttpConfig {
            reload_path: None,
            ..Default::default()
        };
        let app = HttpTransport::new(config).router(state.server);

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/reload")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
