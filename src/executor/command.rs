//! Shell-command task executor used by the CLI.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use super::traits::TaskExecutor;
use super::types::{ExecutionReport, TddPhase, TestCounts, UnitOfWork};
use crate::budget::ResourceDelta;
use crate::error::{OrchestratorError, Result};

const MAX_OUTPUT_CHARS: usize = 4000;

/// Trailing JSON line a command may print to report its accounting.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommandReport {
    tokens: i64,
    cost_usd: f64,
    files_changed: i64,
    satisfied: bool,
    progress: Option<bool>,
    catastrophic: bool,
    tests_run: Option<u32>,
    tests_passed: Option<u32>,
    phase: Option<TddPhase>,
    summary: Option<String>,
}

/// Runs one shell command per unit of work.
///
/// The unit is exposed through `AUTONOMY_*` environment variables. A zero exit
/// status means success. If the last non-empty stdout line is a JSON object it
/// is read as a [`CommandReport`].
pub struct CommandExecutor {
    command: String,
    working_dir: PathBuf,
    timeout: Option<Duration>,
    session_id: Option<String>,
}

impl CommandExecutor {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
            timeout: None,
            session_id: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    #[cfg(windows)]
    fn build_shell_command(&self) -> Command {
        let mut command = Command::new("cmd");
        command.args(["/C", &self.command]).current_dir(&self.working_dir);
        command
    }

    #[cfg(not(windows))]
    fn build_shell_command(&self) -> Command {
        let mut command = Command::new("sh");
        command.args(["-c", &self.command]).current_dir(&self.working_dir);
        command
    }

    fn command_for(&self, unit: &UnitOfWork) -> Result<Command> {
        let mut command = self.build_shell_command();
        command
            .env("AUTONOMY_UNIT_ID", &unit.id)
            .env("AUTONOMY_SIGNATURE", &unit.signature)
            .env("AUTONOMY_ITERATION", unit.iteration.to_string())
            .env("AUTONOMY_REQUEST", &unit.description)
            .kill_on_drop(true);
        if let Some(session_id) = &self.session_id {
            command.env("AUTONOMY_SESSION_ID", session_id);
        }
        if let Some(action) = &unit.action {
            command.env("AUTONOMY_ACTION", serde_json::to_string(action)?);
        }
        Ok(command)
    }
}

#[async_trait]
impl TaskExecutor for CommandExecutor {
    async fn execute(&self, unit: &UnitOfWork) -> Result<ExecutionReport> {
        let start = Instant::now();
        debug!(unit_id = %unit.id, cmd = %self.command, dir = %self.working_dir.display(), "Running unit command");

        let mut command = self.command_for(unit)?;
        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, command.output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(unit_id = %unit.id, timeout_secs = timeout.as_secs(), "Unit command timed out");
                    return Ok(ExecutionReport::failure(format!(
                        "command timed out after {}s",
                        timeout.as_secs()
                    )));
                }
            },
            None => command.output().await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let report = parse_report(&stdout)?;

        let mut result = if output.status.success() {
            ExecutionReport::success()
        } else {
            let detail = stderr.trim();
            ExecutionReport::failure(if detail.is_empty() {
                format!("command exited with {}", output.status)
            } else {
                truncate(detail)
            })
        };

        debug!(
            unit_id = %unit.id,
            success = result.success,
            duration_ms = start.elapsed().as_millis() as u64,
            "Unit command finished"
        );

        if let Some(report) = report {
            result.resource_delta = ResourceDelta::new()
                .tokens(report.tokens)
                .cost(report.cost_usd)
                .files_changed(report.files_changed);
            result.request_satisfied = report.satisfied;
            result.catastrophic = report.catastrophic;
            if let Some(progress) = report.progress {
                result.progress = progress;
            }
            if let Some(run) = report.tests_run {
                result.tests = Some(TestCounts {
                    run,
                    passed: report.tests_passed.unwrap_or(0).min(run),
                });
            }
            result.tdd_phase = report.phase;
            result.output = report.summary;
        }
        if result.output.is_none() {
            let text = stdout.trim();
            if !text.is_empty() {
                result.output = Some(truncate(text));
            }
        }

        Ok(result)
    }
}

/// Reads the trailing JSON report, if the last non-empty line is an object.
fn parse_report(stdout: &str) -> Result<Option<CommandReport>> {
    let Some(last) = stdout.lines().rev().map(str::trim).find(|l| !l.is_empty()) else {
        return Ok(None);
    };
    if !last.starts_with('{') {
        return Ok(None);
    }
    serde_json::from_str(last)
        .map(Some)
        .map_err(|e| OrchestratorError::Executor(format!("invalid report line: {}", e)))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_OUTPUT_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_OUTPUT_CHARS).collect();
    out.push_str("...");
    out
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unit() -> UnitOfWork {
        UnitOfWork::new("unit-1", "approach-0", "write docs", 1)
    }

    #[tokio::test]
    async fn test_exit_status_is_success() {
        let dir = TempDir::new().unwrap();
        let report = CommandExecutor::new("true", dir.path())
            .execute(&unit())
            .await
            .unwrap();
        assert!(report.success);
        assert!(!report.request_satisfied);

        let report = CommandExecutor::new("echo boom >&2; exit 3", dir.path())
            .execute(&unit())
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_trailing_json_report() {
        let dir = TempDir::new().unwrap();
        let cmd = r#"echo working; echo '{"tokens": 120, "cost_usd": 0.02, "files_changed": 2, "satisfied": true, "tests_run": 4, "tests_passed": 3, "phase": "green"}'"#;
        let report = CommandExecutor::new(cmd, dir.path())
            .execute(&unit())
            .await
            .unwrap();

        assert!(report.success);
        assert!(report.request_satisfied);
        assert_eq!(report.resource_delta.tokens, 120);
        assert_eq!(report.resource_delta.files_changed, 2);
        assert_eq!(report.tests, Some(TestCounts { run: 4, passed: 3 }));
        assert_eq!(report.tdd_phase, Some(TddPhase::Green));
    }

    #[tokio::test]
    async fn test_unit_exposed_through_env() {
        let dir = TempDir::new().unwrap();
        let report = CommandExecutor::new(
            "echo \"$AUTONOMY_UNIT_ID/$AUTONOMY_SIGNATURE/$AUTONOMY_REQUEST/$AUTONOMY_SESSION_ID\"",
            dir.path(),
        )
        .with_session_id("ses-env")
        .execute(&unit())
        .await
        .unwrap();
        assert_eq!(
            report.output.as_deref(),
            Some("unit-1/approach-0/write docs/ses-env")
        );
    }

    #[tokio::test]
    async fn test_malformed_report_is_executor_error() {
        let dir = TempDir::new().unwrap();
        let err = CommandExecutor::new("echo '{not json'", dir.path())
            .execute(&unit())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Executor(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let dir = TempDir::new().unwrap();
        let report = CommandExecutor::new("sleep 5", dir.path())
            .with_timeout(Duration::from_millis(100))
            .execute(&unit())
            .await
            .unwrap();
        assert!(!report.success);
        assert!(report.error.unwrap().contains("timed out"));
    }
}
