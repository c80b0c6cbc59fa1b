//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration could not be read or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The tracing subscriber could not be installed.
    #[error("logging error: {0}")]
    Logging(String),

    /// Two catalogue tools share a name.
    #[error(transparent)]
    Registry(#[from] registry::Error),

    /// The MCP server stopped with an error.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    /// Binding or serving the poll endpoints failed.
    #[error("poll server error: {0}")]
    PollServer(#[source] std::io::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
