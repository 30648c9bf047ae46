//! The line-delimited wire shapes.

use serde::{Deserialize, Serialize};

/// One inbound request line.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequest {
    /// Caller-chosen correlation id, echoed back on the response.
    pub id: String,
    /// Tool name, matched against the fixed tool set.
    pub tool: String,
    /// Tool-specific input, validated per-tool.
    #[serde(default)]
    pub input: serde_json::Value,
}

/// One outbound response line.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    /// Echoes the request id, when one could be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Always exactly one text content item carrying the JSON-encoded
    /// result (or an `{"error": ...}` payload).
    pub content: Vec<ContentItem>,
}

/// One content item. Only the `text` type is ever produced.
#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    /// Always `"text"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// The JSON-encoded tool result.
    pub text: String,
}

impl ToolResponse {
    /// Build a success/normal response carrying `value` as its text
    /// payload.
    #[must_use]
    pub fn ok(id: Option<String>, value: serde_json::Value) -> Self {
        Self {
            id,
            content: vec![ContentItem {
                kind: "text",
                text: value.to_string(),
            }],
        }
    }

    /// Build an `{"error": message}` response.
    #[must_use]
    pub fn error(id: Option<String>, message: impl Into<String>) -> Self {
        Self::ok(id, serde_json::json!({ "error": message.into() }))
    }
}
