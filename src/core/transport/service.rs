//! Selects and runs the configured transport.

use tracing::info;

use super::{TransportConfig, TransportResult};
use crate::core::McpServer;

#[cfg(feature = "stdio")]
use super::stdio::StdioTransport;

#[cfg(feature = "tcp")]
use super::tcp::TcpTransport;

#[cfg(feature = "http")]
use super::http::HttpTransport;

/// Runs an [`McpServer`] over one transport.
pub struct TransportService {
    config: TransportConfig,
}

impl TransportService {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Build from `MCP_TRANSPORT` and the matching `MCP_TCP_*`/`MCP_HTTP_*` variables.
    pub fn from_env() -> TransportResult<Self> {
        TransportConfig::from_env().map(Self::new)
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Serve until the transport shuts down.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        info!(
            generation = server.host().generation(),
            "Starting transport: {}",
            self.config.description()
        );

        match self.config {
            #[cfg(feature = "stdio")]
            TransportConfig::Stdio => StdioTransport::run(server).await,
            #[cfg(feature = "tcp")]
            TransportConfig::Tcp(cfg) => TcpTransport::new(cfg).run(server).await,
            #[cfg(feature = "http")]
            TransportConfig::Http(cfg) => HttpTransport::new(cfg).run(server).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "tcp")]
    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        use crate::core::config::{Config, FunctionsConfig};
        use crate::core::host::FunctionHost;
        use crate::domains::handlers::BuiltinCatalog;
        use std::sync::Arc;

        // Hold the port so the service cannot bind it.
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let host = Arc::new(FunctionHost::new(
            &FunctionsConfig::default(),
            BuiltinCatalog::with_defaults(),
        ));
        let server = McpServer::new(Config::default(), host);
        let service = TransportService::new(TransportConfig::tcp(port, "127.0.0.1"));
        assert_eq!(service.config().description(), format!("TCP on 127.0.0.1:{port}"));

        let err = service.run(server).await.unwrap_err();
        assert!(matches!(err, super::super::TransportError::BindError { .. }));
    }
}
