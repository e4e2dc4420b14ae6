//! TCP transport implementation.
//!
//! Line-delimited JSON-RPC over raw TCP sockets. Every connection is an
//! independent MCP session over the same [`FunctionHost`], so a reload is
//! visible to connected clients on their next listing.
//!
//! [`FunctionHost`]: crate::core::FunctionHost

use rmcp::ServiceExt;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{Instrument, info, info_span, warn};

use super::{TransportError, TransportResult, config::TcpConfig};
use crate::core::McpServer;

/// TCP transport handler.
pub struct TcpTransport {
    config: TcpConfig,
}

impl TcpTransport {
    /// Create a new TCP transport with the given config.
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Bind the configured address and serve until the process stops.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        let addr = self.address();

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        info!("Ready - listening on {} (JSON-RPC over TCP)", addr);
        Self::serve(listener, server).await
    }

    /// Accept connections on an already bound listener.
    pub async fn serve(listener: TcpListener, server: McpServer) -> TransportResult<()> {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    // Persistent accept errors (fd exhaustion) would spin otherwise
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY for {}: {}", peer, e);
            }

            let session = Self::session(server.clone(), stream, peer);
            tokio::spawn(session.instrument(info_span!("tcp_session", %peer)));
        }
    }

    /// Run one MCP session to completion.
    async fn session(server: McpServer, stream: TcpStream, peer: SocketAddr) {
        info!(generation = server.host().generation(), "Accepted connection");

        let service = match server.serve(stream).await {
            Ok(service) => service,
            Err(e) => {
                warn!("Handshake with {} failed: {}", peer, e);
                return;
            }
        };

        match service.waiting().await {
            Ok(reason) => info!(?reason, "Client disconnected"),
            Err(e) => warn!("Session with {} ended with an error: {}", peer, e),
        }
    }
}
