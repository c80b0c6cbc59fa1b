//! Host bridge error types.

use std::time::Duration;
use thiserror::Error;

/// Errors from a host call.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The helper process exited unsuccessfully. `output` is its diagnostic
    /// output, verbatim except that invalid UTF-8 sequences are replaced
    /// with U+FFFD.
    #[error("host process failed with {status}: {output}")]
    HostProcess { status: String, output: String },

    /// The helper process could not be started.
    #[error("failed to spawn host process: {0}")]
    Spawn(#[from] std::io::Error),

    /// The host answered with something that is not a single JSON value.
    #[error("malformed host response: {reason}")]
    MalformedResponse { reason: String, output: String },

    #[error("host action {action} timed out after {elapsed:?}")]
    Timeout { action: String, elapsed: Duration },

    /// Another command already occupies the single pending slot.
    #[error("host is busy with {pending}, rejected {action}")]
    Busy { action: String, pending: String },

    #[error("host bridge shut down")]
    Shutdown,

    #[error("failed to serialize parameters: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of an application switch. Logged, never propagated to callers.
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("failed to run switch command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("switch command exited with {status}: {output}")]
    Failed { status: String, output: String },

    #[error("switch command timed out after {0:?}")]
    Timeout(Duration),
}
