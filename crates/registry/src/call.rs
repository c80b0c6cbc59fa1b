//! Tool call request and result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ToolError;

/// Opaque identifier tying a call to its result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A request to run one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: CorrelationId,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Create a request with a freshly generated correlation id.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self::with_id(CorrelationId::new(), name, arguments)
    }

    pub fn with_id(id: impl Into<CorrelationId>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of one tool call. Exactly one is produced per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub id: CorrelationId,
    pub success: bool,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolCallResult {
    pub fn ok(id: CorrelationId, content: Value) -> Self {
        Self {
            id,
            success: true,
            content,
            error: None,
        }
    }

    pub fn failed(id: CorrelationId, error: ToolError) -> Self {
        Self {
            id,
            success: false,
            content: Value::Null,
            error: Some(error),
        }
    }

    /// Render the content as text for transports that only carry strings.
    ///
    /// Strings are returned as-is; other values are pretty-printed JSON.
    /// Failed results render their error description.
    pub fn text(&self) -> String {
        if let Some(error) = &self.error {
            return error.to_string();
        }
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}
