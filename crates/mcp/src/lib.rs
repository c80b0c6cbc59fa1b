//! MCP (Model Context Protocol) server library.
//!
//! This crate exposes a [`registry::ToolRegistry`] to an MCP client over
//! newline-delimited JSON-RPC 2.0 on stdio.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp::Server;
//! use registry::ToolRegistry;
//!
//! # async fn example() -> mcp::Result<()> {
//! let registry = Arc::new(ToolRegistry::new());
//! Server::new(registry).run_stdio().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod server;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, ServerInfo, Tool, ToolContent, ToolsCapability,
};
pub use server::{MAX_REQUEST_SIZE, Server};
