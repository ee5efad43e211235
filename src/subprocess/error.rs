use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Why a running child was stopped before it exited on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptReason {
    /// Ctrl-C / SIGINT delivered to the parent process
    Signal,
    /// The caller-supplied timeout elapsed
    Timeout(Duration),
}

impl fmt::Display for InterruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => f.write_str("interrupted by signal"),
            Self::Timeout(limit) => write!(f, "timed out after {limit:?}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot redirect to {}: {source}", .path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process {0}")]
    Interrupted(InterruptReason),

    #[error("No command given")]
    EmptyCommand,

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

impl ProcessError {
    pub fn redirect(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Redirect {
            path: path.into(),
            source,
        }
    }
}
