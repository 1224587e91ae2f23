//! Error types for the MCP server.

use thiserror::Error;

use crate::mcp::params::ParamsError;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the server.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Handler Errors =====
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Invalid prompt arguments: {0}")]
    InvalidPromptArguments(String),

    // ===== Protocol Errors =====
    #[error("Invalid params: {0}")]
    InvalidParams(#[from] ParamsError),

    // ===== Delivery Errors =====
    #[error("response already sent")]
    ResponseAlreadySent,

    #[error("session closed: {0}")]
    SessionClosed(String),

    // ===== I/O Errors =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP server error: {0}")]
    HttpServer(String),

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout: operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Cancelled: operation was cancelled")]
    Cancelled,
}

impl Error {
    /// Check if this error describes a condition the client can correct.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound(_)
                | Self::InvalidToolArguments(_)
                | Self::ResourceNotFound(_)
                | Self::PromptNotFound(_)
                | Self::InvalidPromptArguments(_)
                | Self::InvalidParams(_)
        )
    }

    /// Check if this error came from writing to a stream that is gone.
    pub fn is_delivery_error(&self) -> bool {
        matches!(self, Self::ResponseAlreadySent | Self::SessionClosed(_))
    }
}
