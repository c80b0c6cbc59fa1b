//! MCP server over newline-delimited JSON-RPC (stdio).

use std::sync::Arc;

use registry::{CorrelationId, ToolCallRequest, ToolRegistry};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, RequestId, Tool,
};

/// Maximum accepted request line (1MB).
pub const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Serves a [`ToolRegistry`] to one MCP client.
pub struct Server {
    registry: Arc<ToolRegistry>,
}

impl Server {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Serve on stdin/stdout until stdin closes.
    pub async fn run_stdio(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.run(stdin, stdout).await
    }

    /// Serve requests read from `reader`, writing responses to `writer`,
    /// until `reader` reaches EOF.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(tools = self.registry.len(), "MCP server starting");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(line).await {
                let json = serde_json::to_string(&response)?;
                debug!(response = %json, "sending");
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!("MCP client disconnected");
        Ok(())
    }

    /// Handle one request line. Notifications yield no response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        debug!(request = %line, "received");

        if line.len() > MAX_REQUEST_SIZE {
            return Some(JsonRpcResponse::error(
                None,
                JsonRpcError::new(
                    JsonRpcError::INVALID_REQUEST,
                    format!("request too large: {} bytes (max {MAX_REQUEST_SIZE})", line.len()),
                ),
            ));
        }

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                return Some(JsonRpcResponse::error(None, Error::Json(e).into()));
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(JsonRpcError::INVALID_REQUEST, "invalid JSON-RPC version")
                    .with_data(serde_json::json!({ "expected": "2.0", "got": request.jsonrpc })),
            ));
        }

        let Some(id) = request.id else {
            self.handle_notification(&request.method);
            return None;
        };

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&id, request.params).await,
            other => Err(Error::MethodNotFound(other.to_string())),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(Some(id), value),
            Err(e) => JsonRpcResponse::error(Some(id), e.into()),
        })
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" | "initialized" => {
                debug!("client finished initialization");
            }
            other => debug!(method = other, "ignoring notification"),
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let params: InitializeParams = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| Error::InvalidParams(e.to_string()))?,
            None => InitializeParams::default(),
        };
        let version = params
            .protocol_version
            .unwrap_or_else(|| PROTOCOL_VERSION.to_string());

        info!(protocol_version = %version, "MCP session initialized");
        Ok(serde_json::to_value(InitializeResult::new(version))?)
    }

    fn handle_tools_list(&self) -> Result<Value> {
        let tools = self.registry.list_tools().into_iter().map(Tool::from).collect();
        Ok(serde_json::to_value(ListToolsResult { tools })?)
    }

    async fn handle_tools_call(&self, id: &RequestId, params: Option<Value>) -> Result<Value> {
        let params: CallToolParams = params
            .ok_or_else(|| Error::InvalidParams("missing params".to_string()))
            .and_then(|p| serde_json::from_value(p).map_err(|e| Error::InvalidParams(e.to_string())))?;

        let request = tool_call_request(id, params);
        let result = self.registry.call_tool(request).await;
        Ok(serde_json::to_value(CallToolResult::from(result))?)
    }
}

/// A registry request with its own correlation id. JSON-RPC ids are chosen
/// by the client and may repeat, so they are only logged alongside.
fn tool_call_request(rpc_id: &RequestId, params: CallToolParams) -> ToolCallRequest {
    let call_id = CorrelationId::new();
    debug!(%rpc_id, %call_id, tool = %params.name, "tool call");
    ToolCallRequest::with_id(call_id, params.name, params.arguments.unwrap_or(Value::Null))
}
