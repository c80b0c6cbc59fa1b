//! Configuration loading from deskbridge.toml.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default config file, looked up in the working directory.
pub const CONFIG_FILE: &str = "deskbridge.toml";

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Log filter used when `DESKBRIDGE_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            bridge: BridgeConfig::default(),
        }
    }
}

/// Which transport carries actions to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Process on macOS, poll everywhere else.
    #[default]
    Auto,
    Process,
    Poll,
}

/// A strategy with `auto` settled for this platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Process,
    Poll,
}

impl Strategy {
    pub fn resolve(self) -> Transport {
        match self {
            Strategy::Process => Transport::Process,
            Strategy::Poll => Transport::Poll,
            Strategy::Auto if cfg!(target_os = "macos") => Transport::Process,
            Strategy::Auto => Transport::Poll,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub process: ProcessConfig,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub switch: SwitchConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            request_timeout_ms: default_request_timeout_ms(),
            process: ProcessConfig::default(),
            poll: PollConfig::default(),
            switch: SwitchConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Helper program spawned once per action.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    #[serde(default = "default_helper_program")]
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            program: default_helper_program(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Application switching. Without a `program`, switching is a no-op.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchConfig {
    pub program: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_switch_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            timeout_ms: default_switch_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl SwitchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_ms() -> u64 {
    bridge::DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
}

fn default_helper_program() -> String {
    "deskbridge-helper".to_string()
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8765))
}

fn default_switch_timeout_ms() -> u64 {
    bridge::DEFAULT_SWITCH_TIMEOUT.as_millis() as u64
}

fn default_settle_delay_ms() -> u64 {
    bridge::DEFAULT_SETTLE_DELAY.as_millis() as u64
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if given, otherwise `deskbridge.toml` when it exists,
    /// otherwise defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load(CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "bridge.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.bridge.switch.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "bridge.switch.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.bridge.process.program.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "bridge.process.program must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
