//! Minimal Model Context Protocol server.
//!
//! Speaks JSON-RPC 2.0 over newline-delimited stdio or over HTTP with
//! optional Server-Sent Events streaming.
//!
//! # Architecture
//!
//! 1. **MCP Layer** (`mcp`) - Message model, dispatcher, stdio transport
//! 2. **HTTP Layer** (`http`) - HTTP/SSE transport and session registry
//! 3. **Service Layer** (`service`) - Application handlers (the tea catalog)
//! 4. **Configuration** (`config`) - CLI and environment settings
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp_serve::mcp::{McpServer, StdioTransport, Transport};
//! use mcp_serve::service::TeaHandler;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> mcp_serve::Result<()> {
//! let server = Arc::new(McpServer::from_handler(
//!     "MCP Server",
//!     "1.0.0",
//!     Arc::new(TeaHandler::new()),
//! ));
//! StdioTransport::stdio()
//!     .start(server, CancellationToken::new())
//!     .await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod mcp;
pub mod service;

pub use error::{Error, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
