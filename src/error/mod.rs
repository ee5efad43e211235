//! Error taxonomy for provenance-tracked execution
//!
//! Every failure a caller can observe is a [`LineageError`]. Component errors
//! ([`GitError`], [`StorageError`], [`ProcessError`]) convert into it, and each
//! variant maps onto a stable numeric code from [`ErrorCode`] and a process
//! exit code used by the binary.

use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

use crate::git::{CommitRef, GitError};
use crate::guard::GuardState;
use crate::store::StorageError;
use crate::subprocess::{InterruptReason, ProcessError};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, LineageError>;

/// Which precondition of a guarded run was violated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionFailure {
    #[error("working tree has uncommitted changes ({})", format_paths(.paths))]
    DirtyWorkingTree { paths: Vec<PathBuf> },

    #[error("branch '{branch}' is {behind} commit(s) behind '{upstream}'")]
    OutOfSync {
        branch: String,
        upstream: String,
        behind: usize,
    },
}

/// The unified error type for the execution engine
#[derive(Error, Debug)]
pub enum LineageError {
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionFailure),

    #[error("repository is busy: {} is held by {holder}", .lock_path.display())]
    RepositoryBusy { lock_path: PathBuf, holder: String },

    #[error("failed to execute '{command}'")]
    Execution {
        command: String,
        #[source]
        source: ProcessError,
    },

    #[error("'{command}' was interrupted ({reason}); repository restored to its previous state")]
    Interrupted {
        command: String,
        reason: InterruptReason,
    },

    #[error("failed to commit the effects of '{command}'; repository restored to its previous state")]
    Commit {
        command: String,
        #[source]
        source: GitError,
    },

    #[error("failed to restore the repository after an aborted run: {reason}")]
    Rollback {
        reason: String,
        #[source]
        source: GitError,
    },

    #[error("commit {commit} was created but the workflow step could not be recorded")]
    StorageUnavailable {
        commit: CommitRef,
        #[source]
        source: StorageError,
    },

    #[error("cannot move repository guard from {from:?} to {to:?}")]
    InvalidTransition { from: GuardState, to: GuardState },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("configuration error: {message}")]
    Config { message: String, path: Option<PathBuf> },

    #[error("failed to encode step metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LineageError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error tied to a file
    pub fn config_at(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Precondition(PreconditionFailure::DirtyWorkingTree { .. }) => {
                ErrorCode::PRECONDITION_DIRTY_WORKTREE
            }
            Self::Precondition(PreconditionFailure::OutOfSync { .. }) => {
                ErrorCode::PRECONDITION_OUT_OF_SYNC
            }
            Self::RepositoryBusy { .. } => ErrorCode::PRECONDITION_REPOSITORY_BUSY,
            Self::InvalidTransition { .. } => ErrorCode::PRECONDITION_INVALID_STATE,
            Self::Execution { source, .. } => match source {
                ProcessError::CommandNotFound(_) => ErrorCode::EXEC_COMMAND_NOT_FOUND,
                _ => ErrorCode::EXEC_SPAWN_FAILED,
            },
            Self::Interrupted {
                reason: InterruptReason::Timeout(_),
                ..
            } => ErrorCode::EXEC_TIMEOUT,
            Self::Interrupted { .. } => ErrorCode::EXEC_INTERRUPTED,
            Self::Commit { .. } => ErrorCode::GIT_COMMIT_FAILED,
            Self::Rollback { .. } => ErrorCode::GIT_ROLLBACK_FAILED,
            Self::StorageUnavailable { .. } => ErrorCode::STORAGE_UNAVAILABLE,
            Self::Git(GitError::NotARepository(_)) => ErrorCode::GIT_REPO_NOT_FOUND,
            Self::Git(_) => ErrorCode::GIT_GENERIC,
            Self::Config { .. } => ErrorCode::CONFIG_GENERIC,
            Self::Metadata(_) => ErrorCode::STORAGE_SERIALIZATION_ERROR,
            Self::Io(_) => ErrorCode::OTHER_IO,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Precondition(_) | Self::RepositoryBusy { .. } => 3,
            Self::Execution {
                source: ProcessError::CommandNotFound(_),
                ..
            } => 127,
            Self::Execution { .. } => 4,
            Self::Interrupted {
                reason: InterruptReason::Signal,
                ..
            } => 130,
            Self::Interrupted { .. } => 124,
            Self::Commit { .. } | Self::Rollback { .. } => 5,
            Self::StorageUnavailable { .. } => 6,
            _ => 1,
        }
    }

    /// Whether the repository may be in a state that needs attention.
    ///
    /// A missing workflow step after a successful commit leaves the repository
    /// consistent; the caller only has to reconcile the store.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::StorageUnavailable { .. })
    }

    /// Whether the error was raised before anything touched the repository
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Precondition(_) | Self::RepositoryBusy { .. } | Self::Config { .. }
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        let hint = match self {
            Self::Precondition(PreconditionFailure::DirtyWorkingTree { .. }) => {
                Some("commit or stash your changes before running a tracked command")
            }
            Self::Precondition(PreconditionFailure::OutOfSync { .. }) => {
                Some("pull the upstream changes before running a tracked command")
            }
            Self::RepositoryBusy { .. } => {
                Some("another tracked command is running in this repository")
            }
            Self::StorageUnavailable { .. } => {
                Some("the commit is kept; record the step manually once the store is reachable")
            }
            _ => None,
        };

        match hint {
            Some(hint) => format!("[E{:04}] {}\nhint: {}", self.code(), self, hint),
            None => format!("[E{:04}] {}", self.code(), self),
        }
    }

    /// Get a developer-oriented message with the full source chain
    pub fn developer_message(&self) -> String {
        let mut message = format!(
            "[E{:04}] {} ({})",
            self.code(),
            self,
            describe_error_code(self.code())
        );
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(&format!("\n  caused by: {cause}"));
            source = cause.source();
        }
        message
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    const SHOWN: usize = 5;
    let mut listed: Vec<String> = paths
        .iter()
        .take(SHOWN)
        .map(|p| p.display().to_string())
        .collect();
    if paths.len() > SHOWN {
        listed.push(format!("and {} more", paths.len() - SHOWN));
    }
    listed.join(", ")
}
