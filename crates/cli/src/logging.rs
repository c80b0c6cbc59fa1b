//! Logging setup.
//!
//! Stdout carries MCP traffic, so everything goes to stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "DESKBRIDGE_LOG";

/// Pick the filter: `DESKBRIDGE_LOG` if set, otherwise `configured`.
pub fn resolve_filter(env: Option<String>, configured: &str) -> String {
    env.filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

/// Install the global subscriber. Call once.
pub fn init(configured: &str) -> Result<()> {
    let filter = resolve_filter(std::env::var(LOG_ENV).ok(), configured);
    let filter = EnvFilter::try_new(&filter)
        .map_err(|e| Error::Logging(format!("invalid log filter {filter:?}: {e}")))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Logging(format!("failed to init logging: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_configured_level() {
        assert_eq!(resolve_filter(Some("debug".into()), "info"), "debug");
        assert_eq!(resolve_filter(None, "warn"), "warn");
        assert_eq!(resolve_filter(Some("  ".into()), "info"), "info");
    }
}
