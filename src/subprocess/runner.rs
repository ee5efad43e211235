use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use super::error::{InterruptReason, ProcessError};

/// A program invocation with its standard streams wired to files or the terminal
#[derive(Debug, Clone, Default)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// Stop the child when the parent receives Ctrl-C
    pub interruptible: bool,
    /// Read stdin from this file instead of inheriting it
    pub stdin: Option<PathBuf>,
    /// Truncate and write stdout to this file instead of inheriting it
    pub stdout: Option<PathBuf>,
    /// Truncate and write stderr to this file instead of inheriting it
    pub stderr: Option<PathBuf>,
}

impl ProcessCommand {
    /// Shell-quoted form for logs and messages
    pub fn display(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(&self.args))
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub duration: Duration,
}

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }

    /// Exit code a wrapping process should report (128 + signal for signals)
    pub fn as_exit_code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Error(code) => *code,
            ExitStatus::Signal(signal) => 128 + signal,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Success => f.write_str("exit 0"),
            ExitStatus::Error(code) => write!(f, "exit {code}"),
            ExitStatus::Signal(signal) => write!(f, "signal {signal}"),
        }
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the command to completion, or until it is interrupted
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

pub struct TokioProcessRunner;

impl TokioProcessRunner {
    /// Log command execution details
    fn log_command_start(command: &ProcessCommand) {
        tracing::debug!("Executing subprocess: {}", command.display());

        if !command.env.is_empty() {
            tracing::trace!("Extra environment variables: {:?}", command.env);
        }
        if let Some(ref dir) = command.working_dir {
            tracing::trace!("Working directory: {:?}", dir);
        }
        if let Some(ref timeout) = command.timeout {
            tracing::trace!("Timeout: {:?}", timeout);
        }
    }

    /// Configure the command with environment, working directory and streams.
    ///
    /// The child stays in the parent's process group and environment so that
    /// interactive programs keep their terminal.
    fn configure_command(
        command: &ProcessCommand,
    ) -> Result<tokio::process::Command, ProcessError> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);

        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        Self::configure_stdio(&mut cmd, command)?;
        cmd.kill_on_drop(true);
        Ok(cmd)
    }

    /// Attach redirected streams; anything not redirected is inherited
    fn configure_stdio(
        cmd: &mut tokio::process::Command,
        command: &ProcessCommand,
    ) -> Result<(), ProcessError> {
        if let Some(path) = &command.stdin {
            let file = File::open(path).map_err(|e| ProcessError::redirect(path, e))?;
            cmd.stdin(Stdio::from(file));
        }

        let stdout = match &command.stdout {
            Some(path) => {
                Some(File::create(path).map_err(|e| ProcessError::redirect(path, e))?)
            }
            None => None,
        };

        match (&command.stderr, &stdout) {
            // `cmd > log 2>&1` style: both streams share one open file
            (Some(path), Some(file)) if command.stdout.as_ref() == Some(path) => {
                let shared = file
                    .try_clone()
                    .map_err(|e| ProcessError::redirect(path, e))?;
                cmd.stderr(Stdio::from(shared));
            }
            (Some(path), _) => {
                let file = File::create(path).map_err(|e| ProcessError::redirect(path, e))?;
                cmd.stderr(Stdio::from(file));
            }
            (None, _) => {}
        }

        if let Some(file) = stdout {
            cmd.stdout(Stdio::from(file));
        }

        Ok(())
    }

    /// Resolve when the command must be stopped early; pending forever otherwise
    async fn interruption(timeout: Option<Duration>, interruptible: bool) -> InterruptReason {
        let deadline = async {
            match timeout {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    InterruptReason::Timeout(limit)
                }
                None => std::future::pending().await,
            }
        };

        let signal = async {
            if interruptible {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => return InterruptReason::Signal,
                    Err(e) => tracing::debug!("Cannot listen for Ctrl-C: {}", e),
                }
            }
            std::future::pending().await
        };

        tokio::select! {
            reason = deadline => reason,
            reason = signal => reason,
        }
    }

    /// Convert process exit status to our ExitStatus enum
    fn parse_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    /// Parse signal status on Unix systems
    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            ExitStatus::Signal(signal)
        } else {
            ExitStatus::Error(1)
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
        ExitStatus::Error(1)
    }

    /// Log the process execution result
    fn log_result(result: &ProcessOutput, command: &ProcessCommand) {
        match &result.status {
            ExitStatus::Success => {
                tracing::debug!(
                    "Subprocess completed successfully in {:?}: {}",
                    result.duration,
                    command.display()
                );
            }
            ExitStatus::Error(code) => {
                tracing::debug!(
                    "Subprocess failed with exit code {} in {:?}: {}",
                    code,
                    result.duration,
                    command.display()
                );
            }
            ExitStatus::Signal(signal) => {
                tracing::warn!(
                    "Subprocess terminated by signal {} in {:?}: {}",
                    signal,
                    result.duration,
                    command.display()
                );
            }
        }
    }

    /// Map spawn error to ProcessError
    fn map_spawn_error(error: std::io::Error, command: &ProcessCommand) -> ProcessError {
        if error.kind() == std::io::ErrorKind::NotFound {
            ProcessError::CommandNotFound(command.program.clone())
        } else {
            ProcessError::Spawn {
                command: command.display(),
                source: error,
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        if command.program.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }

        Self::log_command_start(&command);
        let mut cmd = Self::configure_command(&command)?;

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, &command))?;

        let status = tokio::select! {
            waited = child.wait() => waited.map_err(|source| ProcessError::Wait {
                command: command.display(),
                source,
            })?,
            reason = Self::interruption(command.timeout, command.interruptible) => {
                tracing::warn!("Stopping '{}': {}", command.display(), reason);
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill '{}': {}", command.program, e);
                }
                return Err(ProcessError::Interrupted(reason));
            }
        };

        let output = ProcessOutput {
            status: Self::parse_exit_status(status),
            duration: start.elapsed(),
        };
        Self::log_result(&output, &command);
        Ok(output)
    }
}
