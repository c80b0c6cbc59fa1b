//! Tool handler trait.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

/// Error returned by a handler. Converted to
/// [`ToolError::Execution`](crate::ToolError::Execution) at the registry
/// boundary.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = std::result::Result<Value, HandlerError>;

/// Something that can execute a tool call.
///
/// This is the boundary between validated arguments and side effects.
/// Handlers receive the full argument object, including fields the schema
/// does not declare.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, args: Value) -> HandlerResult {
        (self)(args).await
    }
}
