//! Observation of a command's effects on the working tree

pub mod change_set;

pub use change_set::ChangeSet;

use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

use crate::git::{GitError, VersionControl, WorkingTreeSnapshot};
use crate::tool::ToolDraft;

/// Holds the before-snapshot of a run until the command has exited
#[derive(Debug)]
pub struct ChangeWatcher {
    before: WorkingTreeSnapshot,
}

impl ChangeWatcher {
    /// Snapshot the working tree.
    ///
    /// `excluded` paths are treated as absent: these are output-stream targets
    /// that the invoking shell created or truncated before the command ran, so
    /// they always show up as produced.
    pub fn start(
        vcs: &dyn VersionControl,
        excluded: &BTreeSet<PathBuf>,
    ) -> Result<Self, GitError> {
        let mut before = vcs.snapshot()?;
        for path in excluded {
            before.remove(path);
        }
        debug!("Before-snapshot holds {} files", before.len());
        Ok(Self { before })
    }

    /// Paths that existed before the run; anything else found after a failed
    /// run was created by it
    pub fn baseline_paths(&self) -> BTreeSet<PathBuf> {
        self.before.paths().cloned().collect()
    }

    pub fn before(&self) -> &WorkingTreeSnapshot {
        &self.before
    }

    /// Snapshot again and compare
    pub fn finish(self, vcs: &dyn VersionControl, draft: &ToolDraft) -> Result<ChangeSet, GitError> {
        let after = vcs.snapshot()?;
        let changes = ChangeSet::diff(&self.before, &after, &draft.provisional_inputs());
        debug!(
            "Observed {} produced, {} removed and {} consumed paths",
            changes.produced.len(),
            changes.removed.len(),
            changes.consumed.len()
        );
        Ok(changes)
    }
}
