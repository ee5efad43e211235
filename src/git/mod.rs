//! Version-control backend
//!
//! The execution engine talks to the repository only through the
//! [`VersionControl`] trait. [`Git2Repository`] is the production
//! implementation; tests wrap it to inject failures.

pub mod error;
pub mod repository;
pub mod types;

pub use error::GitError;
pub use repository::Git2Repository;
pub use types::*;

use std::path::{Path, PathBuf};

/// Operations the guarded run needs from the version-control backend
pub trait VersionControl: Send + Sync {
    /// Root of the working tree (canonical)
    fn root(&self) -> &Path;

    /// Directory holding repository metadata, outside the working tree
    fn state_dir(&self) -> &Path;

    /// Current HEAD commit, `None` on an unborn branch
    fn head(&self) -> Result<Option<CommitRef>, GitError>;

    /// Uncommitted changes relative to HEAD
    fn status(&self) -> Result<WorkingTreeStatus, GitError>;

    /// Ahead/behind counts against the configured upstream, if any
    fn upstream_status(&self) -> Result<Option<UpstreamStatus>, GitError>;

    /// Tracked and untracked (non-ignored) paths
    fn known_files(&self) -> Result<KnownFiles, GitError>;

    /// Fingerprint every known file currently present on disk
    fn snapshot(&self) -> Result<WorkingTreeSnapshot, GitError>;

    /// Stage `produced`, unstage `removed` and commit on HEAD
    fn commit(
        &self,
        produced: &[PathBuf],
        removed: &[PathBuf],
        message: &str,
    ) -> Result<CommitRef, GitError>;

    /// Files changed between two commits (`from = None` means the empty tree)
    fn diff(&self, from: Option<&CommitRef>, to: &CommitRef) -> Result<TreeDiff, GitError>;

    /// Full message of a commit
    fn commit_message(&self, commit: &CommitRef) -> Result<String, GitError>;

    /// Reset tracked files and the index to `baseline` and delete `created` paths
    fn restore(&self, baseline: Option<&CommitRef>, created: &[PathBuf]) -> Result<(), GitError>;

    /// Whether the working tree has no uncommitted changes at all
    fn is_clean(&self) -> Result<bool, GitError> {
        Ok(self.status()?.is_clean())
    }

    /// Whether the current branch is not behind its upstream
    fn is_up_to_date(&self) -> Result<bool, GitError> {
        Ok(self
            .upstream_status()?
            .map(|status| status.is_up_to_date())
            .unwrap_or(true))
    }
}
