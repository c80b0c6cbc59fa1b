//! App session coordination.
//!
//! The host keeps a single document application active. Before an action
//! is dispatched, [`AppSessionCoordinator::prepare`] makes sure the
//! application it needs is the active one, switching if necessary. The
//! switch is best effort: whatever it reports, the session state moves to
//! the requested application and dispatch goes ahead. A wrong guess
//! corrects itself on the next action that needs a switch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::SwitchError;

/// Default bound on one switch operation.
pub const DEFAULT_SWITCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Default pause after a switch so the host can reconnect.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Host document application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum App {
    Excel,
    Word,
    PowerPoint,
}

impl App {
    pub const ALL: [App; 3] = [App::Excel, App::Word, App::PowerPoint];

    /// Identifier passed to the switch command.
    pub fn id(self) -> &'static str {
        match self {
            Self::Excel => "excel",
            Self::Word => "word",
            Self::PowerPoint => "powerpoint",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|app| app.id() == id)
    }
}

impl std::fmt::Display for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Action namespace prefix -> application it runs in.
const ACTION_APPS: &[(&str, App)] = &[
    ("excel.", App::Excel),
    ("word.", App::Word),
    ("powerpoint.", App::PowerPoint),
];

/// Application an action needs, or `None` if it runs anywhere.
pub fn required_app(action: &str) -> Option<App> {
    ACTION_APPS
        .iter()
        .find(|(prefix, _)| action.starts_with(prefix))
        .map(|(_, app)| *app)
}

/// Makes a given application the active one in the host.
#[async_trait]
pub trait Switcher: Send + Sync {
    async fn switch(&self, app: App) -> Result<(), SwitchError>;
}

/// Runs `<program> [args...] switch <applicationId>`.
pub struct CommandSwitcher {
    program: String,
    args: Vec<String>,
}

impl CommandSwitcher {
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

#[async_trait]
impl Switcher for CommandSwitcher {
    async fn switch(&self, app: App) -> Result<(), SwitchError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("switch")
            .arg(app.id())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(%app, status = %output.status, stdout = %stdout.trim(), stderr = %stderr.trim(), "switch command finished");

        if output.status.success() {
            Ok(())
        } else {
            Err(SwitchError::Failed {
                status: output.status.to_string(),
                output: format!("{}{}", stdout, stderr),
            })
        }
    }
}

/// Switcher for hosts that cannot be switched from outside.
#[derive(Debug, Default)]
pub struct NoopSwitcher;

#[async_trait]
impl Switcher for NoopSwitcher {
    async fn switch(&self, app: App) -> Result<(), SwitchError> {
        debug!(%app, "no switch command configured");
        Ok(())
    }
}

/// What [`AppSessionCoordinator::prepare`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The action runs in any application.
    NotRequired,
    AlreadyActive(App),
    Switched { from: Option<App>, to: App },
    /// The switch reported failure; state was updated anyway.
    SwitchFailed { from: Option<App>, to: App },
}

/// Owns the current-application state.
pub struct AppSessionCoordinator {
    current: Mutex<Option<App>>,
    switcher: Arc<dyn Switcher>,
    switch_timeout: Duration,
    settle_delay: Duration,
}

impl AppSessionCoordinator {
    pub fn new(switcher: Arc<dyn Switcher>) -> Self {
        Self {
            current: Mutex::new(None),
            switcher,
            switch_timeout: DEFAULT_SWITCH_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_switch_timeout(mut self, timeout: Duration) -> Self {
        self.switch_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub async fn current_app(&self) -> Option<App> {
        *self.current.lock().await
    }

    /// Ensure the application `action` needs is active.
    ///
    /// Never fails. The state lock is held for the whole switch so that
    /// concurrent callers needing different applications take turns.
    pub async fn prepare(&self, action: &str) -> SwitchOutcome {
        let Some(required) = required_app(action) else {
            return SwitchOutcome::NotRequired;
        };

        let mut current = self.current.lock().await;
        if *current == Some(required) {
            return SwitchOutcome::AlreadyActive(required);
        }

        let from = *current;
        info!(action, from = ?from, to = %required, "switching host application");

        let outcome = match tokio::time::timeout(self.switch_timeout, self.switcher.switch(required)).await {
            Ok(Ok(())) => SwitchOutcome::Switched { from, to: required },
            Ok(Err(e)) => {
                warn!(to = %required, error = %e, "application switch failed, continuing");
                SwitchOutcome::SwitchFailed { from, to: required }
            }
            Err(_) => {
                let e = SwitchError::Timeout(self.switch_timeout);
                warn!(to = %required, error = %e, "application switch failed, continuing");
                SwitchOutcome::SwitchFailed { from, to: required }
            }
        };

        // The right application may already be open even if the switch
        // failed.
        *current = Some(required);
        tokio::time::sleep(self.settle_delay).await;

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio::time::Instant;

    /// Records every switch request.
    #[derive(Default)]
    struct RecordingSwitcher {
        calls: StdMutex<Vec<App>>,
        fail: bool,
        hang: bool,
    }

    impl RecordingSwitcher {
        fn calls(&self) -> Vec<App> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Switcher for RecordingSwitcher {
        async fn switch(&self, app: App) -> Result<(), SwitchError> {
            self.calls.lock().unwrap().push(app);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail {
                return Err(SwitchError::Failed {
                    status: "exit status: 1".to_string(),
                    output: "application not installed".to_string(),
                });
            }
            Ok(())
        }
    }

    fn coordinator(switcher: Arc<RecordingSwitcher>) -> AppSessionCoordinator {
        AppSessionCoordinator::new(switcher).with_settle_delay(Duration::from_millis(500))
    }

    #[test]
    fn action_table() {
        assert_eq!(required_app("excel.readRange"), Some(App::Excel));
        assert_eq!(required_app("word.insertParagraph"), Some(App::Word));
        assert_eq!(required_app("powerpoint.addSlide"), Some(App::PowerPoint));
        assert_eq!(required_app("host.ping"), None);
        assert_eq!(required_app("excelsior"), None);
    }

    #[test]
    fn app_ids_round_trip() {
        for app in App::ALL {
            assert_eq!(App::from_id(app.id()), Some(app));
        }
        assert_eq!(App::from_id("outlook"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn unmapped_action_passes_through() {
        let switcher = Arc::new(RecordingSwitcher::default());
        let coordinator = coordinator(switcher.clone());

        assert_eq!(coordinator.prepare("host.ping").await, SwitchOutcome::NotRequired);
        assert!(switcher.calls().is_empty());
        assert_eq!(coordinator.current_app().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn switches_exactly_once_then_stays() {
        let switcher = Arc::new(RecordingSwitcher::default());
        let coordinator = coordinator(switcher.clone());

        assert_eq!(
            coordinator.prepare("excel.readRange").await,
            SwitchOutcome::Switched { from: None, to: App::Excel }
        );
        assert_eq!(
            coordinator.prepare("word.getText").await,
            SwitchOutcome::Switched { from: Some(App::Excel), to: App::Word }
        );
        assert_eq!(
            coordinator.prepare("word.insertParagraph").await,
            SwitchOutcome::AlreadyActive(App::Word)
        );

        assert_eq!(switcher.calls(), vec![App::Excel, App::Word]);
        assert_eq!(coordinator.current_app().await, Some(App::Word));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_switch_still_updates_state() {
        let switcher = Arc::new(RecordingSwitcher {
            fail: true,
            ..Default::default()
        });
        let coordinator = coordinator(switcher.clone());

        let outcome = coordinator.prepare("powerpoint.addSlide").await;
        assert_eq!(outcome, SwitchOutcome::SwitchFailed { from: None, to: App::PowerPoint });
        assert_eq!(coordinator.current_app().await, Some(App::PowerPoint));

        // No second attempt for the same application.
        coordinator.prepare("powerpoint.addTextBox").await;
        assert_eq!(switcher.calls(), vec![App::PowerPoint]);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_switch_is_bounded() {
        let switcher = Arc::new(RecordingSwitcher {
            hang: true,
            ..Default::default()
        });
        let coordinator = coordinator(switcher.clone()).with_switch_timeout(Duration::from_secs(5));

        let started = Instant::now();
        let outcome = coordinator.prepare("excel.writeRange").await;

        assert_eq!(outcome, SwitchOutcome::SwitchFailed { from: None, to: App::Excel });
        assert!(started.elapsed() < Duration::from_secs(3600));
        assert_eq!(coordinator.current_app().await, Some(App::Excel));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_follows_switch() {
        let switcher = Arc::new(RecordingSwitcher::default());
        let coordinator = coordinator(switcher);

        let started = Instant::now();
        coordinator.prepare("word.getText").await;
        assert!(started.elapsed() >= Duration::from_millis(500));

        let started = Instant::now();
        coordinator.prepare("word.getText").await;
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_switcher_passes_switch_and_app_id() {
        let ok = CommandSwitcher::new("sh")
            .with_args(["-c", r#"test "$1" = switch && test "$2" = word"#, "switcher"]);
        assert!(ok.switch(App::Word).await.is_ok());
        assert!(matches!(
            ok.switch(App::Excel).await,
            Err(SwitchError::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn command_switcher_reports_missing_program() {
        let missing = CommandSwitcher::new("/nonexistent/deskbridge-switch");
        assert!(matches!(
            missing.switch(App::Excel).await,
            Err(SwitchError::Spawn(_))
        ));
    }
}
