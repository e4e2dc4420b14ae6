//! Transports that carry MCP sessions to a [`McpServer`].
//!
//! | Feature | Transport | Sessions |
//! |---|---|---|
//! | `stdio` (default) | stdin/stdout, logs on stderr | one per process |
//! | `tcp` | line-delimited JSON-RPC on a socket | one per connection |
//! | `http` | JSON-RPC over `POST /mcp`, plus `/health` and `/reload` | stateless |
//!
//! All sessions share one [`FunctionHost`], so a reload takes effect for
//! every transport on the next request.
//!
//! [`McpServer`]: crate::core::McpServer
//! [`FunctionHost`]: crate::core::FunctionHost

mod config;
mod error;
mod service;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use service::TransportService;

#[cfg(feature = "tcp")]
pub use config::TcpConfig;

#[cfg(feature = "http")]
pub use config::HttpConfig;
