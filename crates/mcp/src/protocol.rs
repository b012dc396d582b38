//! MCP message types for the image service's HTTP transport.
//!
//! Requests are plain JSON objects (no JSON-RPC envelope): a method name
//! and, for `tools/call`, the tool name plus a string-to-string argument
//! map. Responses are kept as opaque JSON with typed views on top.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Tool that starts an image generation.
pub const GENERATE_IMAGE: &str = "generate-image";

/// Tool that reports the status of a generated image.
pub const GET_IMAGE_STATUS: &str = "get-image-status";

/// Method named by a [`ToolRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    #[serde(rename = "tools/list")]
    ListTools,
    #[serde(rename = "tools/call")]
    CallTool,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListTools => "tools/list",
            Self::CallTool => "tools/call",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a `POST /mcp/messages` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolRequest {
    method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<CallToolParams>,
}

impl ToolRequest {
    /// `{"method": "tools/list"}`
    pub fn list_tools() -> Self {
        Self {
            method: Method::ListTools,
            params: None,
        }
    }

    /// A `tools/call` request for `name` with the given arguments.
    pub fn call_tool<I, K, V>(name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: Method::CallTool,
            params: Some(CallToolParams {
                name: name.into(),
                arguments: arguments
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            }),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn params(&self) -> Option<&CallToolParams> {
        self.params.as_ref()
    }
}

/// Params for tools/call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: BTreeMap<String, String>,
}

/// Decoded body of a `POST /mcp/messages` response.
///
/// The service does not publish a schema for tool results; the only
/// convention relied on is a `content` array of blocks carrying `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolResponse(Value);

impl ToolResponse {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Text of every content block, in order. Blocks without a string
    /// `text` field yield `""`.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.0
            .get("content")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|block| block.get("text").and_then(Value::as_str).unwrap_or(""))
    }

    /// Text of the first content block, or `""` if there is none.
    pub fn first_text(&self) -> &str {
        self.texts().next().unwrap_or("")
    }

    /// Typed view of a `tools/list` body. A body without `tools` is an
    /// empty catalog.
    pub fn tools(&self) -> Result<Vec<Tool>> {
        match self.0.get("tools") {
            Some(tools) => Ok(Vec::<Tool>::deserialize(tools)?),
            None => Ok(Vec::new()),
        }
    }
}

impl From<Value> for ToolResponse {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Tool definition returned by tools/list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
}
