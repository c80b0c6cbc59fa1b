//! Tool registration and dispatch.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    Category, Error, Result, ToolCallRequest, ToolCallResult, ToolDefinition, ToolError,
    ToolHandler,
};

/// A tool definition paired with its handler.
#[derive(Clone)]
struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Owns every tool and dispatches calls to them.
///
/// Populated once at start-up, then shared read-only.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the name is taken; the existing
    /// registration is left untouched.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: impl ToolHandler + 'static,
    ) -> Result<()> {
        if self.tools.contains_key(&definition.name) {
            return Err(Error::AlreadyRegistered(definition.name));
        }

        debug!(tool = %definition.name, category = ?definition.category, "registered tool");
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// All definitions, sorted by name.
    pub fn list_tools(&self) -> Vec<&ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| &t.definition).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn list_by_category(&self, category: Category) -> Vec<&ToolDefinition> {
        self.list_tools()
            .into_iter()
            .filter(|d| d.category == category)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool call to completion.
    ///
    /// Never fails and never panics: lookup, validation and handler
    /// failures (including handler panics) all come back as a failed
    /// [`ToolCallResult`] with the request's id.
    pub async fn call_tool(&self, request: ToolCallRequest) -> ToolCallResult {
        let ToolCallRequest {
            id,
            name,
            arguments,
        } = request;
        let started = Instant::now();
        info!(call_id = %id, tool = %name, "dispatching tool call");

        let Some(tool) = self.tools.get(&name) else {
            warn!(call_id = %id, tool = %name, "unknown tool");
            return ToolCallResult::failed(id, ToolError::NotFound { name });
        };

        let arguments = match validate(&tool.definition, arguments) {
            Ok(args) => args,
            Err(error) => {
                warn!(call_id = %id, tool = %name, %error, "rejected tool call");
                return ToolCallResult::failed(id, error);
            }
        };

        let outcome = AssertUnwindSafe(tool.handler.call(arguments))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(content)) => ToolCallResult::ok(id, content),
            Ok(Err(e)) => ToolCallResult::failed(
                id,
                ToolError::Execution {
                    tool: name.clone(),
                    message: e.to_string(),
                },
            ),
            Err(panic) => ToolCallResult::failed(
                id,
                ToolError::Execution {
                    tool: name.clone(),
                    message: panic_message(panic.as_ref()),
                },
            ),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result.error {
            None => info!(call_id = %result.id, tool = %name, duration_ms, "tool call completed"),
            Some(error) => {
                warn!(call_id = %result.id, tool = %name, duration_ms, %error, "tool call failed")
            }
        }
        result
    }
}

/// Check required fields and normalise the argument object.
///
/// A missing or `null` argument value is treated as an empty object.
fn validate(definition: &ToolDefinition, arguments: Value) -> std::result::Result<Value, ToolError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        Value::Object(map) => Value::Object(map),
        other => {
            return Err(ToolError::InvalidParams {
                field: None,
                reason: format!("arguments must be an object, got {}", json_type(&other)),
            });
        }
    };

    for field in definition.input_schema.required() {
        if arguments.get(field).is_none_or(Value::is_null) {
            return Err(ToolError::missing_field(field));
        }
    }

    Ok(arguments)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}
