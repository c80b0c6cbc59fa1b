//! Tools exposed to MCP clients.
//!
//! Most tools forward to a single host action through the [`HostBridge`].
//! `bridge_status` answers in-process.

use std::sync::Arc;

use async_trait::async_trait;
use bridge::HostBridge;
use registry::{
    Category, HandlerResult, ParamType, ToolDefinition, ToolHandler, ToolRegistry,
};
use serde_json::Value;
use tracing::debug;

/// One parameter: name, type, required, description.
type Param = (&'static str, ParamType, bool, &'static str);

/// A tool backed by one host action.
struct HostTool {
    name: &'static str,
    action: &'static str,
    category: Category,
    description: &'static str,
    params: &'static [Param],
}

const HOST_TOOLS: &[HostTool] = &[
    HostTool {
        name: "excel_read_range",
        action: "excel.readRange",
        category: Category::Excel,
        description: "Read cell values from a range in the active workbook",
        params: &[
            ("range", ParamType::String, true, "A1-style range, e.g. \"A1:C10\""),
            ("sheet", ParamType::String, false, "Worksheet name (defaults to the active sheet)"),
        ],
    },
    HostTool {
        name: "excel_write_range",
        action: "excel.writeRange",
        category: Category::Excel,
        description: "Write a 2D array of values into a range",
        params: &[
            ("range", ParamType::String, true, "Top-left cell or full A1-style range"),
            ("values", ParamType::Array, true, "Rows of cell values"),
            ("sheet", ParamType::String, false, "Worksheet name (defaults to the active sheet)"),
        ],
    },
    HostTool {
        name: "excel_format_range",
        action: "excel.formatRange",
        category: Category::Excel,
        description: "Apply formatting (font, fill, number format) to a range",
        params: &[
            ("range", ParamType::String, true, "A1-style range"),
            ("format", ParamType::Object, true, "Formatting properties to apply"),
            ("sheet", ParamType::String, false, "Worksheet name (defaults to the active sheet)"),
        ],
    },
    HostTool {
        name: "word_insert_paragraph",
        action: "word.insertParagraph",
        category: Category::Word,
        description: "Insert a paragraph into the active document",
        params: &[
            ("text", ParamType::String, true, "Paragraph text"),
            ("location", ParamType::String, false, "\"start\" or \"end\" (default \"end\")"),
            ("style", ParamType::String, false, "Built-in paragraph style name"),
        ],
    },
    HostTool {
        name: "word_get_text",
        action: "word.getText",
        category: Category::Word,
        description: "Return the plain text of the active document",
        params: &[],
    },
    HostTool {
        name: "powerpoint_add_slide",
        action: "powerpoint.addSlide",
        category: Category::PowerPoint,
        description: "Append a slide to the active presentation",
        params: &[("layout", ParamType::String, false, "Slide layout name")],
    },
    HostTool {
        name: "powerpoint_add_text_box",
        action: "powerpoint.addTextBox",
        category: Category::PowerPoint,
        description: "Add a text box to a slide",
        params: &[
            ("text", ParamType::String, true, "Text box contents"),
            ("slideIndex", ParamType::Integer, false, "Zero-based slide index (defaults to the last slide)"),
            ("left", ParamType::Number, false, "Left offset in points"),
            ("top", ParamType::Number, false, "Top offset in points"),
            ("width", ParamType::Number, false, "Width in points"),
            ("height", ParamType::Number, false, "Height in points"),
        ],
    },
    HostTool {
        name: "host_ping",
        action: "host.ping",
        category: Category::Host,
        description: "Check that the host add-in is reachable",
        params: &[],
    },
];

impl HostTool {
    fn definition(&self) -> ToolDefinition {
        self.params.iter().fold(
            ToolDefinition::builder(self.name, self.description).category(self.category),
            |builder, (name, kind, required, description)| {
                builder.param(*name, *kind, *required, *description)
            },
        )
        .build()
    }
}

/// Forwards its arguments to one host action.
struct HostAction {
    bridge: Arc<HostBridge>,
    action: &'static str,
}

#[async_trait]
impl ToolHandler for HostAction {
    async fn call(&self, args: Value) -> HandlerResult {
        debug!(action = self.action, "forwarding to host");
        let payload = self.bridge.invoke(self.action, args).await?;
        unwrap_envelope(payload)
    }
}

/// Hosts answer `{success, data?, error?}`. Anything else passes through.
fn unwrap_envelope(payload: Value) -> HandlerResult {
    let Value::Object(mut map) = payload else {
        return Ok(payload);
    };
    match map.get("success").and_then(Value::as_bool) {
        Some(true) => Ok(map.remove("data").unwrap_or(Value::Object(map))),
        Some(false) => {
            let message = match map.remove("error") {
                Some(Value::String(s)) => s,
                Some(Value::Null) | None => "host reported failure".to_string(),
                Some(other) => other.to_string(),
            };
            Err(message.into())
        }
        None => Ok(Value::Object(map)),
    }
}

/// Reports [`bridge::BridgeStatus`].
struct BridgeStatusTool {
    bridge: Arc<HostBridge>,
}

#[async_trait]
impl ToolHandler for BridgeStatusTool {
    async fn call(&self, _args: Value) -> HandlerResult {
        Ok(serde_json::to_value(self.bridge.status().await)?)
    }
}

fn bridge_status_definition() -> ToolDefinition {
    ToolDefinition::builder(
        "bridge_status",
        "Report host connectivity, the active application, and whether a command is pending",
    )
    .category(Category::Host)
    .build()
}

/// Registry holding the whole catalogue, wired to `bridge`.
pub fn build_registry(bridge: Arc<HostBridge>) -> registry::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in HOST_TOOLS {
        registry.register(
            tool.definition(),
            HostAction {
                bridge: Arc::clone(&bridge),
                action: tool.action,
            },
        )?;
    }
    registry.register(bridge_status_definition(), BridgeStatusTool { bridge })?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge::{AppSessionCoordinator, Connectivity, HostTransport, NoopSwitcher};
    use registry::ToolCallRequest;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers every action with a canned payload and records calls.
    struct Canned {
        reply: Value,
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl HostTransport for Canned {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn invoke(&self, action: &str, params: Value, _timeout: Duration) -> bridge::Result<Value> {
            self.calls.lock().unwrap().push((action.to_string(), params));
            Ok(self.reply.clone())
        }

        fn connectivity(&self) -> Connectivity {
            Connectivity::Connected
        }
    }

    fn setup(reply: Value) -> (Arc<Canned>, ToolRegistry) {
        let transport = Arc::new(Canned {
            reply,
            calls: Mutex::new(Vec::new()),
        });
        let coordinator =
            AppSessionCoordinator::new(Arc::new(NoopSwitcher)).with_settle_delay(Duration::ZERO);
        let bridge = HostBridge::new(transport.clone(), Arc::new(coordinator));
        let registry = build_registry(Arc::new(bridge)).unwrap();
        (transport, registry)
    }

    #[test]
    fn catalogue_registers_every_tool_once() {
        let (_, registry) = setup(json!(null));
        assert_eq!(registry.len(), HOST_TOOLS.len() + 1);
        assert_eq!(registry.list_by_category(Category::Excel).len(), 3);
        assert_eq!(registry.list_by_category(Category::Word).len(), 2);
        assert_eq!(registry.list_by_category(Category::PowerPoint).len(), 2);

        let host: Vec<_> = registry
            .list_by_category(Category::Host)
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(host, vec!["bridge_status", "host_ping"]);
    }

    #[test]
    fn host_actions_match_their_category() {
        for tool in HOST_TOOLS {
            let app = bridge::required_app(tool.action);
            match tool.category {
                Category::Excel => assert_eq!(app, Some(bridge::App::Excel), "{}", tool.name),
                Category::Word => assert_eq!(app, Some(bridge::App::Word), "{}", tool.name),
                Category::PowerPoint => {
                    assert_eq!(app, Some(bridge::App::PowerPoint), "{}", tool.name)
                }
                Category::Host => assert_eq!(app, None, "{}", tool.name),
            }
        }
    }

    #[test]
    fn required_params_appear_in_schema() {
        let def = HOST_TOOLS[1].definition();
        assert_eq!(def.name, "excel_write_range");
        assert_eq!(def.input_schema.required().collect::<Vec<_>>(), vec!["range", "values"]);
    }

    #[test]
    fn envelope_success_returns_data() {
        let out = unwrap_envelope(json!({ "success": true, "data": [[1, 2]] })).unwrap();
        assert_eq!(out, json!([[1, 2]]));
    }

    #[test]
    fn envelope_success_without_data_returns_payload() {
        let out = unwrap_envelope(json!({ "success": true, "rows": 3 })).unwrap();
        assert_eq!(out, json!({ "success": true, "rows": 3 }));
    }

    #[test]
    fn envelope_failure_carries_host_error() {
        let err = unwrap_envelope(json!({ "success": false, "error": "Sheet not found" })).unwrap_err();
        assert_eq!(err.to_string(), "Sheet not found");

        let err = unwrap_envelope(json!({ "success": false })).unwrap_err();
        assert_eq!(err.to_string(), "host reported failure");
    }

    #[test]
    fn non_envelope_passes_through() {
        assert_eq!(unwrap_envelope(json!("pong")).unwrap(), json!("pong"));
        assert_eq!(unwrap_envelope(json!({ "a": 1 })).unwrap(), json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn host_tool_forwards_to_its_action() {
        let (transport, registry) = setup(json!({ "success": true, "data": "done" }));
        let result = registry
            .call_tool(ToolCallRequest::new(
                "word_insert_paragraph",
                json!({ "text": "Hello" }),
            ))
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.content, json!("done"));
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "word.insertParagraph");
        assert_eq!(calls[0].1, json!({ "text": "Hello" }));
    }

    #[tokio::test]
    async fn host_failure_becomes_execution_error() {
        let (_, registry) = setup(json!({ "success": false, "error": "No document open" }));
        let result = registry
            .call_tool(ToolCallRequest::new("word_get_text", Value::Null))
            .await;

        assert!(!result.success);
        assert!(result.text().contains("No document open"));
    }

    #[tokio::test]
    async fn bridge_status_reports_transport() {
        let (transport, registry) = setup(json!(null));
        let result = registry
            .call_tool(ToolCallRequest::new("bridge_status", json!({})))
            .await;

        assert!(result.success);
        assert_eq!(result.content["transport"], "canned");
        assert_eq!(result.content["status"], "connected");
        assert_eq!(result.content["hasPendingCommand"], false);
        assert!(transport.calls.lock().unwrap().is_empty());
    }
}
