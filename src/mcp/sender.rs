//! Response delivery seam between the dispatcher and a transport.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse, RequestId};

/// Delivers responses for one request back to its client.
///
/// Each transport supplies its own implementation: a line writer for stdio,
/// a one-shot slot for plain HTTP, or an SSE session for streaming HTTP.
#[async_trait]
pub trait ResponseSender: Send + Sync {
    /// Deliver a complete response.
    async fn send_response(&self, response: JsonRpcResponse) -> Result<()>;

    /// Deliver an error response built from its parts.
    async fn send_error(
        &self,
        id: RequestId,
        code: i32,
        message: String,
        data: Option<Value>,
    ) -> Result<()> {
        self.send_response(JsonRpcResponse::error(
            Some(id),
            JsonRpcError::new(code, message, data),
        ))
        .await
    }
}
