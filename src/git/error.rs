//! Git operation error types

use std::path::PathBuf;
use thiserror::Error;

/// Git-specific errors
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("Repository has no working directory")]
    BareRepository,

    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    #[error("Path is not inside the repository: {}", .0.display())]
    PathOutsideRepository(PathBuf),

    #[error("Git {operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Git command failed: {0}")]
    CommandFailed(String),
}

impl GitError {
    /// Wrap an I/O error on a working-tree path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Attach the name of the failed operation to a raw `git2` error
pub(crate) trait GitResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T, GitError>;
}

impl<T> GitResultExt<T> for Result<T, git2::Error> {
    fn during(self, operation: &'static str) -> Result<T, GitError> {
        self.map_err(|source| GitError::Operation { operation, source })
    }
}
