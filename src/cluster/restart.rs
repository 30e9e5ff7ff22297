//! Database restart trigger
//!
//! Restarts go through the stolon keeper's `pg_ctl` as the `stolon` user. The command
//! line is fixed. Once launched, a restart runs to completion: it is detached from
//! the requesting task and the child is never killed, even when the wait times out.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Privilege-dropping wrapper used to run the restart
pub const RESTART_PROGRAM: &str = "gosu";

/// Fixed arguments of the restart command
pub const RESTART_ARGS: [&str; 5] = ["stolon", "pg_ctl", "-D", "/data/postgres", "restart"];

/// Result message of a successful restart
pub const RESTART_SUCCESS_MESSAGE: &str = "Restart completed successfully";

/// Longest stderr excerpt carried in a failure
const MAX_STDERR_LENGTH: usize = 4 * 1024;

/// How long to keep collecting stderr once the command has exited.
/// Daemons started by the command may hold the pipe open indefinitely.
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Terminal state of an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub success: bool,
    pub code: Option<i32>,
    /// Human readable terminal state, e.g. `exit status: 1`
    pub description: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartError {
    /// The command could not be started
    Spawn(String),
    /// The command did not finish in time (it is left running)
    TimedOut(Duration),
    /// The command exited unsuccessfully
    Failed { description: String, stderr: String },
}

impl std::fmt::Display for RestartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartError::Spawn(e) => write!(f, "failed to start restart: {}", e),
            RestartError::TimedOut(d) => write!(
                f,
                "restart did not finish within {}",
                humantime::format_duration(*d)
            ),
            RestartError::Failed {
                description,
                stderr,
            } => {
                if stderr.is_empty() {
                    write!(f, "restart failed: {}", description)
                } else {
                    write!(f, "restart failed: {}: {}", description, stderr)
                }
            }
        }
    }
}

impl std::error::Error for RestartError {}

/// Runs one external command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ExitReport, RestartError>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ExitReport, RestartError> {
        tracing::info!(program, ?args, "running external command");

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        let mut child = cmd
            .spawn()
            .map_err(|e| RestartError::Spawn(format!("{}: {}", program, e)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RestartError::Spawn(format!("{}: stderr pipe not available", program)))?;

        // Drain on a separate task: only the exit is bounded by the timeout, and the
        // reader keeps the pipe open for anything the command left running.
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        let mut drain = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut line = Vec::new();
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        if let Ok(mut buf) = sink.lock() {
                            if buf.len() <= MAX_STDERR_LENGTH {
                                buf.extend_from_slice(&line);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::debug!("error reading stderr: {}", e);
                        break;
                    }
                }
            }
        });

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(RestartError::Spawn(format!("{}: {}", program, e))),
            Err(_) => {
                tracing::warn!(program, "external command exceeded {:?}; left running", timeout);
                return Err(RestartError::TimedOut(timeout));
            }
        };

        if tokio::time::timeout(STDERR_GRACE, &mut drain).await.is_err() {
            tracing::debug!(program, "stderr still open after exit; keeping what was read");
        }

        let raw = collected.lock().map(|buf| buf.clone()).unwrap_or_default();
        let mut stderr = String::from_utf8_lossy(&raw).trim().to_string();
        if stderr.len() > MAX_STDERR_LENGTH {
            let mut cut = MAX_STDERR_LENGTH;
            while !stderr.is_char_boundary(cut) {
                cut -= 1;
            }
            stderr.truncate(cut);
            stderr.push_str("... [truncated]");
        }

        Ok(ExitReport {
            success: status.success(),
            code: status.code(),
            description: status.to_string(),
            stderr,
        })
    }
}

/// Triggers the fixed restart command and classifies its outcome
#[derive(Clone)]
pub struct RestartTrigger {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl RestartTrigger {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Run the restart and wait for it.
    ///
    /// Returns [`RESTART_SUCCESS_MESSAGE`] on a zero exit.
    pub async fn trigger(&self) -> Result<String, RestartError> {
        let runner = Arc::clone(&self.runner);
        let timeout = self.timeout;

        // Detached so that a dropped request does not interrupt the restart.
        let handle =
            tokio::spawn(async move { runner.run(RESTART_PROGRAM, &RESTART_ARGS, timeout).await });

        let report = handle
            .await
            .map_err(|e| RestartError::Spawn(format!("restart task failed: {}", e)))??;

        if !report.success {
            tracing::error!(
                code = ?report.code,
                stderr = %report.stderr,
                "restart exited unsuccessfully: {}",
                report.description
            );
            return Err(RestartError::Failed {
                description: report.description,
                stderr: report.stderr,
            });
        }

        tracing::info!("restart completed");
        Ok(RESTART_SUCCESS_MESSAGE.to_string())
    }
}
