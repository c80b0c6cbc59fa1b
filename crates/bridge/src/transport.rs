//! Host transport trait.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::Result;

/// Whether the host has been heard from recently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Unknown,
    Connected,
    Disconnected,
}

/// A way of carrying one action to the host and its result back.
///
/// Implementations are selected once at start-up; everything above the
/// bridge depends only on this trait.
#[async_trait]
pub trait HostTransport: Send + Sync {
    /// Short name for logs and status output.
    fn name(&self) -> &'static str;

    /// Run `action` with `params` on the host, giving up after `timeout`.
    async fn invoke(&self, action: &str, params: Value, timeout: Duration) -> Result<Value>;

    fn connectivity(&self) -> Connectivity;

    /// Whether the transport carries one call at a time. The bridge then
    /// turns overlapping calls away before the session is touched.
    fn exclusive(&self) -> bool {
        false
    }

    /// Whether a command is currently waiting for the host.
    async fn has_pending(&self) -> bool {
        false
    }

    /// Release any waiting caller. Later invokes may fail.
    async fn shutdown(&self) {}
}
