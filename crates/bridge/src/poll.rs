//! Asynchronous poll-correlate transport.
//!
//! The host cannot accept connections, so it polls us for work and posts
//! results back. At most one command is in flight: the slot below is either
//! idle or holds exactly one [`PendingCommand`]. A command leaves the slot
//! through exactly one of three doors (matching result, timer, shutdown),
//! each of which takes it out under the lock, so its continuation can only
//! run once.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{Connectivity, Error, HostTransport, Result};

/// How recently the host must have polled to count as connected.
pub const POLL_FRESHNESS: Duration = Duration::from_secs(10);

/// Work handed to the host on poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollCommand {
    pub action: String,
    pub params: Value,
    pub request_id: Uuid,
}

struct PendingCommand {
    action: String,
    params: Value,
    request_id: Uuid,
    issued_at: Instant,
    responder: oneshot::Sender<Result<Value>>,
    timer: JoinHandle<()>,
}

impl PendingCommand {
    fn resolve(self, outcome: Result<Value>) {
        self.timer.abort();
        // The caller may have gone away; the slot is cleared either way.
        let _ = self.responder.send(outcome);
    }
}

enum Slot {
    Idle,
    Pending(PendingCommand),
}

impl Slot {
    fn pending(&self) -> Option<&PendingCommand> {
        match self {
            Slot::Idle => None,
            Slot::Pending(cmd) => Some(cmd),
        }
    }

    fn take(&mut self) -> Option<PendingCommand> {
        match std::mem::replace(self, Slot::Idle) {
            Slot::Idle => None,
            Slot::Pending(cmd) => Some(cmd),
        }
    }

    /// Take the command only if it carries `request_id`.
    fn take_matching(&mut self, request_id: Uuid) -> Option<PendingCommand> {
        let matches = self
            .pending()
            .is_some_and(|cmd| cmd.request_id == request_id);
        if matches { self.take() } else { None }
    }
}

struct Inner {
    slot: Mutex<Slot>,
    closed: AtomicBool,
    /// Unix millis of the last poll, 0 if never polled.
    last_poll_ms: AtomicI64,
}

/// Single-slot transport served by the HTTP poll endpoints.
#[derive(Clone)]
pub struct PollTransport {
    inner: Arc<Inner>,
}

impl Default for PollTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PollTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot::Idle),
                closed: AtomicBool::new(false),
                last_poll_ms: AtomicI64::new(0),
            }),
        }
    }

    /// The live command, if any. Does not change the slot, so a command is
    /// re-served until it is resolved.
    pub async fn poll(&self) -> Option<PollCommand> {
        self.inner
            .last_poll_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);

        let slot = self.inner.slot.lock().await;
        slot.pending().map(|cmd| PollCommand {
            action: cmd.action.clone(),
            params: cmd.params.clone(),
            request_id: cmd.request_id,
        })
    }

    /// Deliver the host's result for `request_id`.
    ///
    /// Returns `false` when the id does not match the live command (stale,
    /// duplicate or unknown); such results are dropped without touching the
    /// slot.
    pub async fn post_result(&self, request_id: &str, result: Value) -> bool {
        let Ok(request_id) = Uuid::parse_str(request_id) else {
            warn!(request_id, "discarding result with unparseable request id");
            return false;
        };

        let mut slot = self.inner.slot.lock().await;
        match slot.take_matching(request_id) {
            Some(cmd) => {
                info!(
                    %request_id,
                    action = %cmd.action,
                    elapsed_ms = cmd.issued_at.elapsed().as_millis() as u64,
                    "host command resolved"
                );
                cmd.resolve(Ok(result));
                true
            }
            None => {
                warn!(
                    %request_id,
                    live = ?slot.pending().map(|c| c.request_id),
                    "discarding stale host result"
                );
                false
            }
        }
    }

    /// Wall-clock time of the last poll.
    pub fn last_poll_at(&self) -> Option<DateTime<Utc>> {
        match self.inner.last_poll_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }
}

async fn expire(inner: Arc<Inner>, request_id: Uuid, timeout: Duration) {
    tokio::time::sleep(timeout).await;

    let mut slot = inner.slot.lock().await;
    if let Some(cmd) = slot.take_matching(request_id) {
        let elapsed = cmd.issued_at.elapsed();
        warn!(%request_id, action = %cmd.action, ?elapsed, "host command timed out");
        let error = Error::Timeout {
            action: cmd.action.clone(),
            elapsed,
        };
        cmd.resolve(Err(error));
    }
}

#[async_trait]
impl HostTransport for PollTransport {
    fn name(&self) -> &'static str {
        "poll"
    }

    async fn invoke(&self, action: &str, params: Value, timeout: Duration) -> Result<Value> {
        let request_id = Uuid::new_v4();

        let response = {
            let mut slot = self.inner.slot.lock().await;
            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(Error::Shutdown);
            }
            if let Some(live) = slot.pending() {
                warn!(action, pending = %live.action, "rejecting command, slot occupied");
                return Err(Error::Busy {
                    action: action.to_string(),
                    pending: live.action.clone(),
                });
            }

            let (responder, response) = oneshot::channel();
            let timer = tokio::spawn(expire(self.inner.clone(), request_id, timeout));
            *slot = Slot::Pending(PendingCommand {
                action: action.to_string(),
                params,
                request_id,
                issued_at: Instant::now(),
                responder,
                timer,
            });
            response
        };
        debug!(%request_id, action, ?timeout, "host command queued");

        response.await.unwrap_or(Err(Error::Shutdown))
    }

    fn connectivity(&self) -> Connectivity {
        match self.inner.last_poll_ms.load(Ordering::Relaxed) {
            0 => Connectivity::Unknown,
            ms => {
                let age = Utc::now().timestamp_millis().saturating_sub(ms);
                if age <= POLL_FRESHNESS.as_millis() as i64 {
                    Connectivity::Connected
                } else {
                    Connectivity::Disconnected
                }
            }
        }
    }

    fn exclusive(&self) -> bool {
        true
    }

    async fn has_pending(&self) -> bool {
        self.inner.slot.lock().await.pending().is_some()
    }

    async fn shutdown(&self) {
        let mut slot = self.inner.slot.lock().await;
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(cmd) = slot.take() {
            info!(request_id = %cmd.request_id, action = %cmd.action, "rejecting pending command on shutdown");
            cmd.resolve(Err(Error::Shutdown));
        }
    }
}
