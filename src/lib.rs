//! Functions MCP Server Library
//!
//! An MCP server whose tools and resources are not compiled in: they are
//! discovered at startup (and on reload) from function modules on disk.
//!
//! # Architecture
//!
//! - **core**: configuration, error handling, the function host, the
//!   protocol handler and transports
//! - **domains**: the pipeline from files to invocations
//!   - **discovery**: walks the roots and loads each module in isolation
//!   - **descriptors**: turns declared functions into tool and resource descriptors
//!   - **handlers**: command, text template and builtin function bodies
//!   - **registry**: immutable snapshots and the store that swaps them
//!   - **dispatch**: argument validation, coercion, timeouts and cancellation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use functions_mcp_server::core::{Config, FunctionHost, McpServer, TransportService};
//! use functions_mcp_server::domains::handlers::BuiltinCatalog;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let host = Arc::new(FunctionHost::new(&config.functions, BuiltinCatalog::with_defaults()));
//!     host.reload().await?;
//!     let transport = TransportService::new(config.transport.clone());
//!     transport.run(McpServer::new(config, host)).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, FunctionHost, McpServer, Result};
