//! Registry error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single tool call.
///
/// Carried inside [`ToolCallResult`](crate::ToolCallResult) rather than
/// returned, so it is serializable and cloneable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolError {
    #[error("tool not found: {name}")]
    NotFound { name: String },

    #[error("invalid params: {reason}")]
    InvalidParams {
        /// First missing required field, when that is the cause.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
        reason: String,
    },

    #[error("tool {tool} failed: {message}")]
    Execution { tool: String, message: String },
}

impl ToolError {
    pub(crate) fn missing_field(field: &str) -> Self {
        Self::InvalidParams {
            field: Some(field.to_string()),
            reason: format!("missing required parameter '{field}'"),
        }
    }
}

/// Registry errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A tool with this name is already registered.
    ///
    /// Registration happens once at start-up, so this is a programming error.
    #[error("tool already registered: {0}")]
    AlreadyRegistered(String),
}

pub type Result<T> = std::result::Result<T, Error>;
