//! Request parameters and per-method extraction.
//!
//! `params` arrives as arbitrary JSON. It is kept as a [`Params`] variant and
//! only interpreted by the extraction function of the method being called.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The shape of a request's `params` member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Params {
    /// Absent or `null`.
    #[default]
    None,
    Object(Map<String, Value>),
    Array(Vec<Value>),
    /// A string, number or boolean.
    Scalar(Value),
}

impl Params {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Borrow the params as an object, the only shape any method accepts.
    pub fn as_object(&self) -> Result<&Map<String, Value>, ParamsError> {
        match self {
            Self::Object(map) => Ok(map),
            Self::None => Err(ParamsError::Missing),
            Self::Array(_) | Self::Scalar(_) => Err(ParamsError::NotAnObject),
        }
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Object(map) => Self::Object(map),
            Value::Array(items) => Self::Array(items),
            scalar => Self::Scalar(scalar),
        }
    }
}

impl From<Params> for Value {
    fn from(params: Params) -> Self {
        match params {
            Params::None => Value::Null,
            Params::Object(map) => Value::Object(map),
            Params::Array(items) => Value::Array(items),
            Params::Scalar(value) => value,
        }
    }
}

/// Why a method's parameters could not be extracted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("params cannot be null")]
    Missing,

    #[error("params must be an object")]
    NotAnObject,

    #[error("{0} parameter is required and must be a string")]
    RequiredString(&'static str),
}

fn required_string(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ParamsError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or(ParamsError::RequiredString(field))
}

/// Non-object `arguments` are ignored rather than rejected.
fn optional_arguments(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .get("arguments")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Parameters of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallParams {
    pub fn extract(params: &Params) -> Result<Self, ParamsError> {
        let object = params.as_object()?;
        Ok(Self {
            name: required_string(object, "name")?,
            arguments: optional_arguments(object),
        })
    }
}

/// Parameters of `resources/read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceParams {
    pub uri: String,
}

impl ResourceParams {
    pub fn extract(params: &Params) -> Result<Self, ParamsError> {
        let object = params.as_object()?;
        Ok(Self {
            uri: required_string(object, "uri")?,
        })
    }
}

/// Parameters of `prompts/get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub arguments: Map<String, Value>,
}

impl PromptParams {
    pub fn extract(params: &Params) -> Result<Self, ParamsError> {
        let object = params.as_object()?;
        Ok(Self {
            name: required_string(object, "name")?,
            arguments: optional_arguments(object),
        })
    }

    /// String-valued arguments only; other values are dropped.
    pub fn string_arguments(&self) -> std::collections::HashMap<String, String> {
        self.arguments
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        Params::from(value)
    }

    #[test]
    fn test_params_variants() {
        assert_eq!(params(Value::Null), Params::None);
        assert!(matches!(params(json!({"a": 1})), Params::Object(_)));
        assert!(matches!(params(json!([1, 2])), Params::Array(_)));
        assert_eq!(params(json!("text")), Params::Scalar(json!("text")));
        assert_eq!(params(json!(true)), Params::Scalar(json!(true)));
    }

    #[test]
    fn test_params_serialize_back_to_input_shape() {
        let input = json!({"name": "getTeaNames", "arguments": {}});
        let value = serde_json::to_value(params(input.clone())).unwrap();
        assert_eq!(value, input);
    }

    #[test]
    fn test_tool_call_extraction() {
        let extracted = ToolCallParams::extract(&params(json!({
            "name": "getTeaInfo",
            "arguments": {"name": "gyokuro"}
        })))
        .unwrap();

        assert_eq!(extracted.name, "getTeaInfo");
        assert_eq!(extracted.arguments["name"], "gyokuro");
    }

    #[test]
    fn test_tool_call_without_arguments() {
        let extracted = ToolCallParams::extract(&params(json!({"name": "getTeaNames"}))).unwrap();
        assert!(extracted.arguments.is_empty());
    }

    #[test]
    fn test_non_object_arguments_are_ignored() {
        let extracted =
            ToolCallParams::extract(&params(json!({"name": "getTeaNames", "arguments": [1, 2]})))
                .unwrap();
        assert!(extracted.arguments.is_empty());
    }

    #[test]
    fn test_tool_call_missing_name() {
        let err = ToolCallParams::extract(&params(json!({"arguments": {}}))).unwrap_err();
        assert_eq!(err, ParamsError::RequiredString("name"));
        assert_eq!(
            err.to_string(),
            "name parameter is required and must be a string"
        );
    }

    #[test]
    fn test_tool_call_name_wrong_type() {
        let err = ToolCallParams::extract(&params(json!({"name": 42}))).unwrap_err();
        assert_eq!(err, ParamsError::RequiredString("name"));
    }

    #[test]
    fn test_extraction_rejects_missing_and_non_object() {
        assert_eq!(
            ToolCallParams::extract(&Params::None).unwrap_err(),
            ParamsError::Missing
        );
        assert_eq!(
            ResourceParams::extract(&params(json!(["menu://tea"]))).unwrap_err(),
            ParamsError::NotAnObject
        );
        assert_eq!(
            PromptParams::extract(&params(json!("brewing_guide"))).unwrap_err(),
            ParamsError::NotAnObject
        );
    }

    #[test]
    fn test_resource_extraction() {
        let extracted = ResourceParams::extract(&params(json!({"uri": "menu://tea"}))).unwrap();
        assert_eq!(extracted.uri, "menu://tea");

        let err = ResourceParams::extract(&params(json!({"url": "menu://tea"}))).unwrap_err();
        assert_eq!(err, ParamsError::RequiredString("uri"));
    }

    #[test]
    fn test_prompt_extraction_and_string_arguments() {
        let extracted = PromptParams::extract(&params(json!({
            "name": "tea_recommendation",
            "arguments": {"mood": "relaxing", "cups": 2}
        })))
        .unwrap();

        assert_eq!(extracted.name, "tea_recommendation");
        let strings = extracted.string_arguments();
        assert_eq!(strings.get("mood").map(String::as_str), Some("relaxing"));
        assert!(!strings.contains_key("cups"));
    }
}
