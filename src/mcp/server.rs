//! MCP request dispatcher.
//!
//! Routes decoded requests to the capability handlers and emits exactly one
//! response per request through the caller-supplied [`ResponseSender`].

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::mcp::handler::{PromptHandler, ResourceHandler, ToolHandler};
use crate::mcp::params::{PromptParams, ResourceParams, ToolCallParams};
use crate::mcp::prompts::ListPromptsResult;
use crate::mcp::protocol::*;
use crate::mcp::resources::{ListResourceTemplatesResult, ListResourcesResult};
use crate::mcp::sender::ResponseSender;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// MCP server.
///
/// Stateless between requests; one instance is shared by every transport
/// task behind an `Arc`.
pub struct McpServer {
    tools: Arc<dyn ToolHandler>,
    resources: Arc<dyn ResourceHandler>,
    prompts: Arc<dyn PromptHandler>,
    server_info: ServerInfo,
    request_timeout: Duration,
}

impl McpServer {
    /// Create a new MCP server from separate capability handlers.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        tools: Arc<dyn ToolHandler>,
        resources: Arc<dyn ResourceHandler>,
        prompts: Arc<dyn PromptHandler>,
    ) -> Self {
        Self {
            tools,
            resources,
            prompts,
            server_info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create a new MCP server backed by one handler implementing every capability.
    pub fn from_handler<H>(
        name: impl Into<String>,
        version: impl Into<String>,
        handler: Arc<H>,
    ) -> Self
    where
        H: ToolHandler + ResourceHandler + PromptHandler + 'static,
    {
        Self::new(name, version, handler.clone(), handler.clone(), handler)
    }

    /// Override the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Build the `initialize` result.
    pub fn initialize(&self) -> Result<InitializeResult> {
        Ok(InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: true }),
                resources: Some(ResourcesCapability {
                    list_changed: true,
                    templates: true,
                }),
                prompts: Some(PromptsCapability { list_changed: true }),
                elicitation: Some(ElicitationCapability {}),
            },
            server_info: self.server_info.clone(),
        })
    }

    /// Dispatch one request.
    ///
    /// Notifications are logged and produce no output. Every other request
    /// produces exactly one call on `sender`. The returned error only reports
    /// a failure to deliver that response.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        sender: &dyn ResponseSender,
        session_id: Option<&str>,
    ) -> Result<()> {
        let Some(id) = request.id else {
            debug!(
                "Notification received: {} (session: {:?})",
                request.method, session_id
            );
            return Ok(());
        };

        debug!(
            "Handling request: {} (id: {}, session: {:?})",
            request.method, id, session_id
        );

        match request.method.as_str() {
            "initialize" => {
                info!("Client initializing");
                let outcome = self
                    .initialize()
                    .map_err(|e| failure(error_codes::INTERNAL_ERROR, "Failed to initialize", e));
                respond(sender, id, outcome).await
            }
            "ping" => respond(sender, id, Ok(json!({}))).await,
            // Tools
            "tools/list" => {
                let outcome = self
                    .tools
                    .list_tools()
                    .await
                    .map(|tools| ListToolsResult { tools })
                    .map_err(|e| failure(error_codes::INTERNAL_ERROR, "Failed to list tools", e));
                respond(sender, id, outcome).await
            }
            "tools/call" => {
                let outcome = match ToolCallParams::extract(&request.params) {
                    Err(e) => Err(failure(
                        error_codes::INVALID_PARAMS,
                        "Invalid tool call parameters",
                        e,
                    )),
                    Ok(params) => {
                        let name = params.name.clone();
                        self.tools.call_tool(params).await.map_err(|e| {
                            warn!("Tool {} failed: {}", name, e);
                            business_failure("Tool call failed", e)
                        })
                    }
                };
                respond(sender, id, outcome).await
            }
            // Resources
            "resources/list" => {
                let outcome = self
                    .resources
                    .list_resources()
                    .await
                    .map(|resources| ListResourcesResult { resources })
                    .map_err(|e| {
                        failure(error_codes::INTERNAL_ERROR, "Failed to list resources", e)
                    });
                respond(sender, id, outcome).await
            }
            "resources/read" => {
                let outcome = match ResourceParams::extract(&request.params) {
                    Err(e) => Err(failure(
                        error_codes::INVALID_PARAMS,
                        "Invalid resource read parameters",
                        e,
                    )),
                    Ok(params) => self
                        .resources
                        .read_resource(params)
                        .await
                        .map_err(|e| business_failure("Resource read failed", e)),
                };
                respond(sender, id, outcome).await
            }
            "resources/templates/list" => {
                let outcome = self
                    .resources
                    .list_resource_templates()
                    .await
                    .map(|resource_templates| ListResourceTemplatesResult { resource_templates })
                    .map_err(|e| {
                        failure(
                            error_codes::INTERNAL_ERROR,
                            "Failed to list resource templates",
                            e,
                        )
                    });
                respond(sender, id, outcome).await
            }
            // Prompts
            "prompts/list" => {
                let outcome = self
                    .prompts
                    .list_prompts()
                    .await
                    .map(|prompts| ListPromptsResult { prompts })
                    .map_err(|e| failure(error_codes::INTERNAL_ERROR, "Failed to list prompts", e));
                respond(sender, id, outcome).await
            }
            "prompts/get" => {
                let outcome = match PromptParams::extract(&request.params) {
                    Err(e) => Err(failure(
                        error_codes::INVALID_PARAMS,
                        "Invalid prompt parameters",
                        e,
                    )),
                    Ok(params) => self
                        .prompts
                        .get_prompt(params)
                        .await
                        .map_err(|e| business_failure("Prompt call failed", e)),
                };
                respond(sender, id, outcome).await
            }
            // Unknown
            method => {
                debug!("Unknown method: {}", method);
                let outcome: std::result::Result<Value, _> = Err(JsonRpcError::new(
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method {} not found", method),
                    None,
                ));
                respond(sender, id, outcome).await
            }
        }
    }

    /// Dispatch one request under the per-request deadline.
    ///
    /// Returns [`Error::Cancelled`] when `cancel` fires first and
    /// [`Error::Timeout`] when the deadline elapses. In both cases the
    /// handler future is dropped and may not have produced a response.
    pub async fn handle_request_with_timeout(
        &self,
        request: JsonRpcRequest,
        sender: &dyn ResponseSender,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let seconds = self.request_timeout.as_secs();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(
                self.request_timeout,
                self.handle_request(request, sender, session_id),
            ) => result.unwrap_or_else(|_| Err(Error::Timeout { seconds })),
        }
    }
}

/// An error whose diagnostic data is the underlying failure message.
fn failure(code: i32, message: &str, cause: impl Display) -> JsonRpcError {
    JsonRpcError::new(code, message, Some(Value::String(cause.to_string())))
}

/// Handler failures are reported as invalid params with the cause in the message.
fn business_failure(prefix: &str, cause: Error) -> JsonRpcError {
    JsonRpcError::new(
        error_codes::INVALID_PARAMS,
        format!("{}: {}", prefix, cause),
        None,
    )
}

async fn respond<T: Serialize>(
    sender: &dyn ResponseSender,
    id: RequestId,
    outcome: std::result::Result<T, JsonRpcError>,
) -> Result<()> {
    let encoded = outcome.and_then(|value| {
        serde_json::to_value(value)
            .map_err(|e| failure(error_codes::INTERNAL_ERROR, "Failed to encode result", e))
    });
    let response = match encoded {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(error) => JsonRpcResponse::error(Some(id), error),
    };
    sender.send_response(response).await
}
