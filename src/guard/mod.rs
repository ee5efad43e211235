//! Transactional guard around a tracked run
//!
//! A [`RepositoryGuard`] owns the repository for the duration of one run. It
//! holds the lock file, checks the working tree before anything executes,
//! turns the observed changes into exactly one commit, and restores the
//! baseline if the run is abandoned part-way. Dropping a guard that is still
//! running rolls the repository back.

pub mod lock;

pub use lock::{LockGuard, RepositoryLock};

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{LineageError, PreconditionFailure, Result};
use crate::git::{CommitRef, VersionControl};
use crate::watch::ChangeSet;

/// Name of the lock file inside the git directory
pub const LOCK_FILE_NAME: &str = "lineage.lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    Precheck,
    Running,
    Finalizing,
    Committed,
    Aborted,
    Failed,
}

/// What the guard requires of the working tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPolicy {
    pub allow_untracked: bool,
    pub require_up_to_date: bool,
    /// How long to wait for a busy repository; `None` fails at once
    pub lock_wait: Option<Duration>,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            allow_untracked: false,
            require_up_to_date: true,
            lock_wait: None,
        }
    }
}

pub struct RepositoryGuard {
    vcs: Arc<dyn VersionControl>,
    policy: GuardPolicy,
    state: GuardState,
    baseline: Option<CommitRef>,
    baseline_paths: BTreeSet<PathBuf>,
    lock: Option<LockGuard>,
}

impl RepositoryGuard {
    pub fn new(vcs: Arc<dyn VersionControl>, policy: GuardPolicy) -> Self {
        Self {
            vcs,
            policy,
            state: GuardState::Idle,
            baseline: None,
            baseline_paths: BTreeSet::new(),
            lock: None,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// HEAD when the run started
    pub fn baseline(&self) -> Option<&CommitRef> {
        self.baseline.as_ref()
    }

    pub fn lock_path(&self) -> PathBuf {
        self.vcs.state_dir().join(LOCK_FILE_NAME)
    }

    fn transition(&mut self, allowed: &[GuardState], to: GuardState) -> Result<()> {
        if !allowed.contains(&self.state) {
            return Err(LineageError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!("Repository guard {:?} -> {:?}", self.state, to);
        self.state = to;
        Ok(())
    }

    /// Take the repository lock
    pub async fn acquire(&mut self, holder: &str) -> Result<()> {
        if self.state != GuardState::Idle {
            return Err(LineageError::InvalidTransition {
                from: self.state,
                to: GuardState::Precheck,
            });
        }
        let lock = LockGuard::acquire(&self.lock_path(), holder, self.policy.lock_wait).await?;
        self.lock = Some(lock);
        self.transition(&[GuardState::Idle], GuardState::Precheck)
    }

    /// Check that the working tree is clean and the branch is current.
    ///
    /// `ignored` paths may be dirty; they are the output-stream targets the
    /// invoking shell has already opened. On failure the guard is aborted and
    /// the lock released.
    pub fn precheck(&mut self, ignored: &BTreeSet<PathBuf>) -> Result<()> {
        if self.state != GuardState::Precheck {
            return Err(LineageError::InvalidTransition {
                from: self.state,
                to: GuardState::Running,
            });
        }

        let status = self.vcs.status()?;
        let dirty = status.dirty_paths(self.policy.allow_untracked, ignored);
        if !dirty.is_empty() {
            self.abort()?;
            return Err(PreconditionFailure::DirtyWorkingTree { paths: dirty }.into());
        }

        if self.policy.require_up_to_date {
            if let Some(upstream) = self.vcs.upstream_status()? {
                if !upstream.is_up_to_date() {
                    self.abort()?;
                    return Err(PreconditionFailure::OutOfSync {
                        branch: upstream.branch,
                        upstream: upstream.upstream,
                        behind: upstream.behind,
                    }
                    .into());
                }
            }
        }

        debug!("Working tree is clean");
        Ok(())
    }

    /// Give up before anything ran
    pub fn abort(&mut self) -> Result<()> {
        self.transition(&[GuardState::Precheck], GuardState::Aborted)?;
        self.lock = None;
        Ok(())
    }

    /// Record the baseline and enter the running state.
    ///
    /// `baseline_paths` are the files that existed before the command ran;
    /// a rollback deletes everything else. Tracked files are always kept,
    /// since resetting to the baseline restores them.
    pub fn begin(&mut self, mut baseline_paths: BTreeSet<PathBuf>) -> Result<()> {
        if self.state != GuardState::Precheck {
            return Err(LineageError::InvalidTransition {
                from: self.state,
                to: GuardState::Running,
            });
        }
        self.baseline = self.vcs.head()?;
        baseline_paths.extend(self.vcs.known_files()?.tracked);
        self.baseline_paths = baseline_paths;
        self.transition(&[GuardState::Precheck], GuardState::Running)
    }

    /// Commit the observed changes; roll back if the commit fails
    pub fn finalize(
        &mut self,
        command: &str,
        changes: &ChangeSet,
        message: &str,
    ) -> Result<CommitRef> {
        self.transition(&[GuardState::Running], GuardState::Finalizing)?;

        match self
            .vcs
            .commit(&changes.produced_paths(), &changes.removed_paths(), message)
        {
            Ok(commit) => {
                self.state = GuardState::Committed;
                info!("Recorded '{}' as commit {}", command, commit);
                Ok(commit)
            }
            Err(source) => {
                error!("Commit failed for '{}': {}", command, source);
                self.rollback()?;
                Err(LineageError::Commit {
                    command: command.to_string(),
                    source,
                })
            }
        }
    }

    /// Restore the baseline: reset tracked files and delete created ones
    pub fn rollback(&mut self) -> Result<()> {
        self.transition(
            &[GuardState::Running, GuardState::Finalizing],
            GuardState::Failed,
        )?;

        let restored = self.vcs.known_files().and_then(|known| {
            let created: Vec<PathBuf> = known
                .tracked
                .into_iter()
                .chain(known.untracked)
                .filter(|path| !self.baseline_paths.contains(path))
                .collect();
            self.vcs.restore(self.baseline.as_ref(), &created)
        });

        match restored {
            Ok(()) => {
                warn!(
                    "Repository restored to {}",
                    self.baseline
                        .as_ref()
                        .map(|c| c.short())
                        .unwrap_or("an empty tree")
                );
                Ok(())
            }
            Err(source) => Err(LineageError::Rollback {
                reason: "could not restore the working tree".to_string(),
                source,
            }),
        }
    }

    /// Release the lock explicitly
    pub fn release(mut self) {
        self.lock = None;
    }
}

impl Drop for RepositoryGuard {
    fn drop(&mut self) {
        if matches!(self.state, GuardState::Running | GuardState::Finalizing) {
            warn!("Run abandoned while {:?}, rolling back", self.state);
            if let Err(e) = self.rollback() {
                error!("{}", e.developer_message());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::repository::test_support::init_repo_with;
    use crate::git::Git2Repository;

    fn guard_for(dir: &tempfile::TempDir) -> (RepositoryGuard, Arc<Git2Repository>) {
        let git = Arc::new(
            Git2Repository::discover(dir.path())
                .unwrap()
                .with_author("Test", "test@example.com"),
        );
        let guard = RepositoryGuard::new(git.clone(), GuardPolicy::default());
        (guard, git)
    }

    fn baseline_paths(git: &Git2Repository) -> BTreeSet<PathBuf> {
        git.snapshot().unwrap().paths().cloned().collect()
    }

    #[tokio::test]
    async fn test_commit_lifecycle() {
        let dir = init_repo_with(&[("a.txt", "alpha\n")]);
        let (mut guard, git) = guard_for(&dir);

        guard.acquire("test").await.unwrap();
        assert!(guard.lock_path().exists());
        guard.precheck(&BTreeSet::new()).unwrap();
        guard.begin(baseline_paths(&git)).unwrap();
        assert_eq!(guard.state(), GuardState::Running);

        std::fs::write(dir.path().join("b.txt"), "beta\n").unwrap();
        let changes = ChangeSet {
            produced: [PathBuf::from("b.txt")].into(),
            ..Default::default()
        };
        let commit = guard.finalize("touch b.txt", &changes, "add b").unwrap();

        assert_eq!(guard.state(), GuardState::Committed);
        assert_eq!(git.head().unwrap(), Some(commit));
        assert!(git.is_clean().unwrap());

        let lock_path = guard.lock_path();
        drop(guard);
        assert!(!lock_path.exists());
    }

    #[tokio::test]
    async fn test_dirty_tree_aborts() {
        let dir = init_repo_with(&[("a.txt", "alpha\n")]);
        std::fs::write(dir.path().join("a.txt"), "edited\n").unwrap();
        let (mut guard, _git) = guard_for(&dir);

        guard.acquire("test").await.unwrap();
        let err = guard.precheck(&BTreeSet::new()).unwrap_err();

        assert!(matches!(
            err,
            LineageError::Precondition(PreconditionFailure::DirtyWorkingTree { ref paths })
                if paths == &[PathBuf::from("a.txt")]
        ));
        assert_eq!(guard.state(), GuardState::Aborted);
        assert!(!guard.lock_path().exists());
    }

    #[tokio::test]
    async fn test_ignored_stream_targets_and_untracked_policy() {
        let dir = init_repo_with(&[("a.txt", "alpha\n")]);
        std::fs::write(dir.path().join("out.log"), "").unwrap();
        std::fs::write(dir.path().join("notes.md"), "scratch").unwrap();

        let git = Arc::new(Git2Repository::discover(dir.path()).unwrap());
        let policy = GuardPolicy {
            allow_untracked: true,
            ..Default::default()
        };
        let mut guard = RepositoryGuard::new(git, policy);
        guard.acquire("test").await.unwrap();

        let ignored = BTreeSet::from([PathBuf::from("out.log")]);
        guard.precheck(&ignored).unwrap();
    }

    #[tokio::test]
    async fn test_drop_while_running_rolls_back() {
        let dir = init_repo_with(&[("a.txt", "alpha\n")]);
        let (mut guard, git) = guard_for(&dir);

        guard.acquire("test").await.unwrap();
        guard.precheck(&BTreeSet::new()).unwrap();
        guard.begin(baseline_paths(&git)).unwrap();

        std::fs::write(dir.path().join("a.txt"), "half written").unwrap();
        std::fs::write(dir.path().join("partial.txt"), "x").unwrap();
        drop(guard);

        assert!(git.is_clean().unwrap());
        assert!(!dir.path().join("partial.txt").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "alpha\n"
        );
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let dir = init_repo_with(&[("a.txt", "alpha\n")]);
        let (mut guard, _git) = guard_for(&dir);

        assert!(matches!(
            guard.begin(BTreeSet::new()),
            Err(LineageError::InvalidTransition {
                from: GuardState::Idle,
                to: GuardState::Running
            })
        ));
        assert!(guard
            .finalize("x", &ChangeSet::default(), "msg")
            .is_err());
        assert!(guard.rollback().is_err());
        assert_eq!(guard.state(), GuardState::Idle);
        assert!(!guard.lock_path().exists());
    }

    #[tokio::test]
    async fn test_second_guard_is_busy() {
        let dir = init_repo_with(&[("a.txt", "alpha\n")]);
        let (mut first, git) = guard_for(&dir);
        first.acquire("first").await.unwrap();

        let mut second = RepositoryGuard::new(git, GuardPolicy::default());
        let err = second.acquire("second").await.unwrap_err();
        assert!(matches!(err, LineageError::RepositoryBusy { .. }));
        assert_eq!(second.state(), GuardState::Idle);
    }
}
