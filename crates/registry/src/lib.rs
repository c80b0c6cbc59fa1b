//! Tool registry for deskbridge.
//!
//! The registry is the only addressable surface for host capabilities. It
//! owns every tool definition together with its handler, rejects malformed
//! calls before they reach the host, and turns handler failures into typed
//! results so that a call always produces exactly one [`ToolCallResult`].
//!
//! # Example
//!
//! ```
//! use registry::{HandlerResult, ParamType, ToolCallRequest, ToolDefinition, ToolRegistry};
//! use serde_json::{json, Value};
//!
//! async fn echo(args: Value) -> HandlerResult {
//!     Ok(args["text"].clone())
//! }
//!
//! # async fn example() -> registry::Result<()> {
//! let mut registry = ToolRegistry::new();
//! registry.register(
//!     ToolDefinition::builder("echo", "Echo text back")
//!         .param("text", ParamType::String, true, "Text to echo")
//!         .build(),
//!     echo,
//! )?;
//!
//! let result = registry
//!     .call_tool(ToolCallRequest::new("echo", json!({ "text": "hi" })))
//!     .await;
//! assert!(result.success);
//! assert_eq!(result.content, json!("hi"));
//! # Ok(())
//! # }
//! ```

mod call;
mod definition;
mod error;
mod handler;
mod registry;

pub use call::{CorrelationId, ToolCallRequest, ToolCallResult};
pub use definition::{Category, InputSchema, ParamSpec, ParamType, ToolDefinition, ToolDefinitionBuilder};
pub use error::{Error, Result, ToolError};
pub use handler::{HandlerError, HandlerResult, ToolHandler};
pub use registry::ToolRegistry;
