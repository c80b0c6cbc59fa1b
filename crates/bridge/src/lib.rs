//! Host bridge for deskbridge.
//!
//! Carries named actions to a sandboxed desktop host and brings their
//! results back. Two transports implement [`HostTransport`]:
//!
//! - [`ProcessTransport`] spawns a short-lived helper per call.
//! - [`PollTransport`] keeps a single pending command that the host fetches
//!   over HTTP ([`http`]) and answers with a posted result.
//!
//! [`HostBridge`] puts the [`AppSessionCoordinator`] in front of whichever
//! transport was selected, so the right host application is active before
//! an action is dispatched.

mod bridge;
mod error;
pub mod http;
mod poll;
mod process;
mod session;
mod transport;

pub use bridge::{BridgeStatus, DEFAULT_REQUEST_TIMEOUT, HostBridge};
pub use error::{Error, Result, SwitchError};
pub use poll::{POLL_FRESHNESS, PollCommand, PollTransport};
pub use process::{HelperCommand, ProcessTransport};
pub use session::{
    App, AppSessionCoordinator, CommandSwitcher, DEFAULT_SETTLE_DELAY, DEFAULT_SWITCH_TIMEOUT,
    NoopSwitcher, SwitchOutcome, Switcher, required_app,
};
pub use transport::{Connectivity, HostTransport};
