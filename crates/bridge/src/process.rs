//! Synchronous process-invocation transport.
//!
//! Each call spawns one short-lived helper as
//! `<program> [args...] <action> <json-params>`. The helper prints exactly
//! one JSON value on stdout and exits 0, or prints diagnostics on stderr and
//! exits non-zero. Calls share no state besides the connectivity flag, so
//! they may run concurrently in any order.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{Connectivity, Error, HostTransport, Result};

const UNKNOWN: u8 = 0;
const CONNECTED: u8 = 1;
const DISCONNECTED: u8 = 2;

/// Helper command line, without the per-call arguments.
#[derive(Debug, Clone)]
pub struct HelperCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl HelperCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Transport that spawns the helper once per call.
pub struct ProcessTransport {
    helper: HelperCommand,
    connectivity: AtomicU8,
}

impl ProcessTransport {
    pub fn new(helper: HelperCommand) -> Self {
        Self {
            helper,
            connectivity: AtomicU8::new(UNKNOWN),
        }
    }

    fn mark(&self, state: u8) {
        self.connectivity.store(state, Ordering::Relaxed);
    }

    async fn run(&self, action: &str, params: &Value) -> Result<Value> {
        let serialized = serde_json::to_string(params)?;

        let mut cmd = Command::new(&self.helper.program);
        cmd.args(&self.helper.args)
            .arg(action)
            .arg(&serialized)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostics = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).into_owned()
            } else {
                stderr.into_owned()
            };
            return Err(Error::HostProcess {
                status: output.status.to_string(),
                output: diagnostics,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(stdout.trim()).map_err(|e| Error::MalformedResponse {
            reason: e.to_string(),
            output: stdout.into_owned(),
        })
    }
}

#[async_trait]
impl HostTransport for ProcessTransport {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn invoke(&self, action: &str, params: Value, timeout: Duration) -> Result<Value> {
        let started = Instant::now();
        debug!(action, program = %self.helper.program, "spawning host helper");

        // Dropping the future on timeout kills the child, so late output is
        // never observed.
        let outcome = tokio::time::timeout(timeout, self.run(action, &params)).await;

        match outcome {
            Ok(Ok(value)) => {
                self.mark(CONNECTED);
                debug!(action, elapsed_ms = started.elapsed().as_millis() as u64, "host helper finished");
                Ok(value)
            }
            Ok(Err(e)) => {
                if matches!(e, Error::Spawn(_)) {
                    self.mark(DISCONNECTED);
                }
                warn!(action, error = %e, "host helper failed");
                Err(e)
            }
            Err(_) => {
                self.mark(DISCONNECTED);
                warn!(action, ?timeout, "host helper timed out, killed");
                Err(Error::Timeout {
                    action: action.to_string(),
                    elapsed: started.elapsed(),
                })
            }
        }
    }

    fn connectivity(&self) -> Connectivity {
        match self.connectivity.load(Ordering::Relaxed) {
            CONNECTED => Connectivity::Connected,
            DISCONNECTED => Connectivity::Disconnected,
            _ => Connectivity::Unknown,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(10);

    /// Helper whose behaviour is a shell script. `$1` is the action, `$2`
    /// the serialized params.
    fn shell(script: &str) -> ProcessTransport {
        ProcessTransport::new(HelperCommand::new("sh").with_args(["-c", script, "helper"]))
    }

    #[tokio::test]
    async fn passes_action_and_params_and_parses_stdout() {
        let transport = shell(r#"printf '{"action":"%s","params":%s}' "$1" "$2""#);
        assert_eq!(transport.connectivity(), Connectivity::Unknown);

        let result = transport
            .invoke("excel.readRange", json!({ "range": "A1:B2" }), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(result["action"], "excel.readRange");
        assert_eq!(result["params"], json!({ "range": "A1:B2" }));
        assert_eq!(transport.connectivity(), Connectivity::Connected);
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr_verbatim() {
        let transport = shell("echo 'Excel got an error: range is invalid' >&2; exit 3");
        let err = transport
            .invoke("excel.readRange", json!({}), TIMEOUT)
            .await
            .unwrap_err();

        match err {
            Error::HostProcess { output, .. } => {
                assert_eq!(output, "Excel got an error: range is invalid\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_zero_exit_without_stderr_uses_stdout() {
        let transport = shell("echo 'partial'; exit 1");
        let err = transport.invoke("word.getText", json!({}), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::HostProcess { ref output, .. } if output == "partial\n"));
    }

    #[tokio::test]
    async fn invalid_utf8_diagnostics_are_replaced() {
        let transport = shell(r"printf 'bad \377 byte' >&2; exit 2");
        let err = transport.invoke("host.ping", json!({}), TIMEOUT).await.unwrap_err();
        assert!(
            matches!(err, Error::HostProcess { ref output, .. } if output == "bad \u{FFFD} byte"),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn unparseable_stdout_is_malformed() {
        let transport = shell("echo 'true, I guess'");
        let err = transport.invoke("host.ping", json!({}), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { ref output, .. } if output.contains("I guess")));
    }

    #[tokio::test]
    async fn slow_helper_is_killed_on_timeout() {
        let transport = shell("sleep 5; echo '{}'");
        let err = transport
            .invoke("word.getText", json!({}), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { ref action, .. } if action == "word.getText"));
        assert_eq!(transport.connectivity(), Connectivity::Disconnected);
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let transport =
            ProcessTransport::new(HelperCommand::new("/nonexistent/deskbridge-helper"));
        let err = transport.invoke("host.ping", json!({}), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::Spawn(_)));
        assert_eq!(transport.connectivity(), Connectivity::Disconnected);
    }
}
