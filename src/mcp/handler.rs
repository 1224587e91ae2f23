//! Capability contracts implemented by the embedding application.
//!
//! The dispatcher only ever sees these three traits. A single type may
//! implement all of them; see [`McpServer::from_handler`](crate::mcp::McpServer::from_handler).

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::mcp::params::{PromptParams, ResourceParams, ToolCallParams};
use crate::mcp::prompts::{GetPromptResult, Prompt};
use crate::mcp::protocol::{ContentBlock, Tool, ToolResponse};
use crate::mcp::resources::{ReadResourceResult, Resource, ResourceTemplate};

/// Tools: functions the client can invoke.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// List available tools with their input schemas.
    async fn list_tools(&self) -> Result<Vec<Tool>>;

    /// Execute a tool. An `Err` is a business failure reported back as invalid params.
    async fn call_tool(&self, params: ToolCallParams) -> Result<ToolResponse>;
}

/// Resources: readable content addressed by URI.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn list_resources(&self) -> Result<Vec<Resource>>;

    async fn read_resource(&self, params: ResourceParams) -> Result<ReadResourceResult>;

    async fn list_resource_templates(&self) -> Result<Vec<ResourceTemplate>>;
}

/// Prompts: parameterized message templates.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn list_prompts(&self) -> Result<Vec<Prompt>>;

    async fn get_prompt(&self, params: PromptParams) -> Result<GetPromptResult>;
}

/// Helper to create a text content block.
pub fn text_content(text: impl Into<String>) -> ContentBlock {
    ContentBlock::Text { text: text.into() }
}

/// Helper to create a successful tool result.
pub fn success_result(text: impl Into<String>) -> ToolResponse {
    ToolResponse {
        content: vec![text_content(text)],
        is_error: false,
    }
}

/// Helper to extract a required string argument.
pub fn get_string_arg(args: &Map<String, Value>, name: &str) -> Result<String> {
    match args.get(name) {
        None => Err(Error::InvalidToolArguments(format!(
            "{} parameter is required",
            name
        ))),
        Some(value) => value.as_str().map(String::from).ok_or_else(|| {
            Error::InvalidToolArguments(format!("{} parameter must be a string", name))
        }),
    }
}

/// Helper to extract an optional string argument.
pub fn get_optional_string_arg(args: &Map<String, Value>, name: &str) -> Option<String> {
    args.get(name).and_then(|v| v.as_str()).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::InputSchema;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        async fn list_tools(&self) -> Result<Vec<Tool>> {
            Ok(vec![Tool {
                name: "echo".to_string(),
                description: "Echo the input".to_string(),
                input_schema: InputSchema::object(Map::new(), &[]),
            }])
        }

        async fn call_tool(&self, params: ToolCallParams) -> Result<ToolResponse> {
            let input = get_optional_string_arg(&params.arguments, "input").unwrap_or_default();
            Ok(success_result(format!("Executed {} with: {}", params.name, input)))
        }
    }

    #[tokio::test]
    async fn test_tool_execution_through_trait_object() {
        let handler: Box<dyn ToolHandler> = Box::new(EchoTool);

        let tools = handler.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);

        let mut arguments = Map::new();
        arguments.insert("input".to_string(), json!("hello"));
        let result = handler
            .call_tool(ToolCallParams {
                name: "echo".to_string(),
                arguments,
            })
            .await
            .unwrap();

        assert!(!result.is_error);
        if let ContentBlock::Text { text } = &result.content[0] {
            assert!(text.contains("Executed echo with: hello"));
        } else {
            panic!("Expected text content");
        }
    }

    #[test]
    fn test_get_string_arg() {
        let mut args = Map::new();
        args.insert("name".to_string(), json!("value"));
        args.insert("count".to_string(), json!(3));

        assert_eq!(get_string_arg(&args, "name").unwrap(), "value");

        let missing = get_string_arg(&args, "missing").unwrap_err();
        assert!(missing.to_string().contains("missing parameter is required"));

        let wrong_type = get_string_arg(&args, "count").unwrap_err();
        assert!(wrong_type.to_string().contains("count parameter must be a string"));
    }

    #[test]
    fn test_get_optional_string_arg() {
        let mut args = Map::new();
        args.insert("name".to_string(), json!("value"));

        assert_eq!(
            get_optional_string_arg(&args, "name"),
            Some("value".to_string())
        );
        assert_eq!(get_optional_string_arg(&args, "missing"), None);
    }

    #[test]
    fn test_success_result() {
        let ok = success_result("Success!");
        assert!(!ok.is_error);
        assert_eq!(ok.content.len(), 1);
    }
}
