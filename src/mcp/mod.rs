//! Model Context Protocol (MCP) implementation.
//!
//! # Architecture
//!
//! - `protocol` - JSON-RPC envelope and MCP payload types
//! - `params` - Per-method parameter extraction
//! - `resources` / `prompts` - Resource and prompt payloads
//! - `handler` - Capability traits implemented by the application
//! - `sender` - Response delivery seam implemented by each transport
//! - `server` - Request dispatcher
//! - `transport` - Transport trait and the stdio transport

pub mod handler;
pub mod params;
pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod sender;
pub mod server;
pub mod transport;

pub use handler::{PromptHandler, ResourceHandler, ToolHandler};
pub use params::{Params, ParamsError, PromptParams, ResourceParams, ToolCallParams};
pub use protocol::*;
pub use sender::ResponseSender;
pub use server::McpServer;
pub use transport::{StdioTransport, Transport};
