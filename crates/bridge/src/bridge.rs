//! Host bridge: session coordination in front of a transport.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::poll::PollTransport;
use crate::session::{App, AppSessionCoordinator};
use crate::{Connectivity, Error, HostTransport, Result};

/// Default bound on one host call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Snapshot of the bridge, as reported by `/status` and the status tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    pub status: Connectivity,
    pub current_app: Option<App>,
    pub has_pending_command: bool,
    pub transport: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_poll_at: Option<DateTime<Utc>>,
}

/// Carries actions to the host.
///
/// Every call first lets the [`AppSessionCoordinator`] activate the
/// application the action needs, then hands the action to the transport.
pub struct HostBridge {
    transport: Arc<dyn HostTransport>,
    coordinator: Arc<AppSessionCoordinator>,
    request_timeout: Duration,
    /// Set when the transport is the poll transport, for `last_poll_at`.
    poll: Option<PollTransport>,
    /// Action holding an exclusive transport, from session preparation
    /// until the transport returns.
    in_flight: Mutex<Option<String>>,
}

/// Releases the exclusive claim when the call ends or is dropped.
struct InFlight<'a> {
    slot: &'a Mutex<Option<String>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
    }
}

fn lock(slot: &Mutex<Option<String>>) -> std::sync::MutexGuard<'_, Option<String>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl HostBridge {
    pub fn new(transport: Arc<dyn HostTransport>, coordinator: Arc<AppSessionCoordinator>) -> Self {
        Self {
            transport,
            coordinator,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll: None,
            in_flight: Mutex::new(None),
        }
    }

    /// Bridge over a poll transport. Keep a clone of `poll` to serve the
    /// HTTP endpoints.
    pub fn polling(poll: PollTransport, coordinator: Arc<AppSessionCoordinator>) -> Self {
        let mut bridge = Self::new(Arc::new(poll.clone()), coordinator);
        bridge.poll = Some(poll);
        bridge
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn coordinator(&self) -> &Arc<AppSessionCoordinator> {
        &self.coordinator
    }

    /// Run `action` on the host with the configured timeout.
    pub async fn invoke(&self, action: &str, params: Value) -> Result<Value> {
        self.invoke_with_timeout(action, params, self.request_timeout).await
    }

    pub async fn invoke_with_timeout(
        &self,
        action: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let _claim = self.claim(action)?;
        let outcome = self.coordinator.prepare(action).await;
        debug!(action, ?outcome, transport = self.transport.name(), "dispatching to host");
        self.transport.invoke(action, params, timeout).await
    }

    /// Reject `action` before it can switch applications if an exclusive
    /// transport is already carrying another call.
    fn claim(&self, action: &str) -> Result<Option<InFlight<'_>>> {
        if !self.transport.exclusive() {
            return Ok(None);
        }
        let mut current = lock(&self.in_flight);
        if let Some(pending) = current.as_deref() {
            warn!(action, pending, "rejecting call, transport busy");
            return Err(Error::Busy {
                action: action.to_string(),
                pending: pending.to_string(),
            });
        }
        *current = Some(action.to_string());
        Ok(Some(InFlight {
            slot: &self.in_flight,
        }))
    }

    pub async fn status(&self) -> BridgeStatus {
        BridgeStatus {
            status: self.transport.connectivity(),
            current_app: self.coordinator.current_app().await,
            has_pending_command: self.transport.has_pending().await,
            transport: self.transport.name(),
            last_poll_at: self.poll.as_ref().and_then(PollTransport::last_poll_at),
        }
    }

    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }
}
