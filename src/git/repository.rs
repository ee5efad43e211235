//! `git2`-backed implementation of [`VersionControl`]

use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Delta, ObjectType, Oid, Repository, ResetType, Signature, Status, StatusOptions,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::error::{GitError, GitResultExt};
use super::types::*;
use super::VersionControl;

const DEFAULT_AUTHOR_NAME: &str = "lineage";
const DEFAULT_AUTHOR_EMAIL: &str = "lineage@localhost";

/// A git working tree accessed through libgit2
///
/// The repository handle is reopened for every operation, so the type is
/// cheap to share between threads.
#[derive(Debug, Clone)]
pub struct Git2Repository {
    root: PathBuf,
    git_dir: PathBuf,
    author: Option<(String, String)>,
}

impl Git2Repository {
    /// Find the repository containing `start`
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, GitError> {
        let start = start.as_ref();
        let repo = Repository::discover(start)
            .map_err(|_| GitError::NotARepository(start.to_path_buf()))?;
        let workdir = repo.workdir().ok_or(GitError::BareRepository)?;
        let root = workdir
            .canonicalize()
            .map_err(|e| GitError::io(workdir, e))?;
        let git_dir = repo
            .path()
            .canonicalize()
            .map_err(|e| GitError::io(repo.path(), e))?;

        debug!("Opened repository at {}", root.display());
        Ok(Self {
            root,
            git_dir,
            author: None,
        })
    }

    /// Use a fixed author instead of the repository's `user.name`/`user.email`
    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author = Some((name.into(), email.into()));
        self
    }

    fn open(&self) -> Result<Repository, GitError> {
        Repository::open(&self.root).map_err(|_| GitError::NotARepository(self.root.clone()))
    }

    fn signature(&self, repo: &Repository) -> Result<Signature<'static>, GitError> {
        if let Some((name, email)) = &self.author {
            return Signature::now(name, email).during("build signature");
        }
        match repo.signature() {
            Ok(signature) => Ok(signature),
            Err(e) => {
                debug!("No git identity configured ({}), using default author", e);
                Signature::now(DEFAULT_AUTHOR_NAME, DEFAULT_AUTHOR_EMAIL).during("build signature")
            }
        }
    }

    fn find_commit<'r>(
        repo: &'r Repository,
        commit: &CommitRef,
    ) -> Result<git2::Commit<'r>, GitError> {
        let oid = Oid::from_str(commit.as_str())
            .map_err(|_| GitError::CommitNotFound(commit.as_str().to_string()))?;
        repo.find_commit(oid)
            .map_err(|_| GitError::CommitNotFound(commit.as_str().to_string()))
    }

    fn remove_created(&self, path: &Path) -> Result<(), GitError> {
        let absolute = self.root.join(path);
        match fs::remove_file(&absolute) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(GitError::io(absolute, e)),
        }
        trace!("Removed {}", path.display());

        // Prune directories the command created and that are now empty
        let mut parent = absolute.parent();
        while let Some(dir) = parent {
            if dir == self.root || fs::remove_dir(dir).is_err() {
                break;
            }
            parent = dir.parent();
        }
        Ok(())
    }
}

fn head_commit(repo: &Repository) -> Result<Option<git2::Commit<'_>>, GitError> {
    match repo.head() {
        Ok(reference) => reference.peel_to_commit().map(Some).during("resolve HEAD"),
        Err(e)
            if matches!(
                e.code(),
                git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
            ) =>
        {
            Ok(None)
        }
        Err(e) => Err(GitError::Operation {
            operation: "read HEAD",
            source: e,
        }),
    }
}

fn fingerprint(path: &Path) -> Result<Option<FileFingerprint>, GitError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GitError::io(path, e)),
    };

    if metadata.file_type().is_symlink() {
        let target = fs::read_link(path).map_err(|e| GitError::io(path, e))?;
        let blob = Oid::hash_object(ObjectType::Blob, target.to_string_lossy().as_bytes())
            .during("hash symlink")?;
        return Ok(Some(FileFingerprint {
            blob: blob.to_string(),
            mode: FileMode::Symlink,
        }));
    }

    if !metadata.is_file() {
        return Ok(None);
    }

    let blob = Oid::hash_file(ObjectType::Blob, path).during("hash file")?;
    let mode = if is_executable(&metadata) {
        FileMode::Executable
    } else {
        FileMode::Regular
    };
    Ok(Some(FileFingerprint {
        blob: blob.to_string(),
        mode,
    }))
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

const STAGED: Status = Status::INDEX_NEW
    .union(Status::INDEX_MODIFIED)
    .union(Status::INDEX_DELETED)
    .union(Status::INDEX_RENAMED)
    .union(Status::INDEX_TYPECHANGE);

const WORKTREE_MODIFIED: Status = Status::WT_MODIFIED
    .union(Status::WT_TYPECHANGE)
    .union(Status::WT_RENAMED);

impl VersionControl for Git2Repository {
    fn root(&self) -> &Path {
        &self.root
    }

    fn state_dir(&self) -> &Path {
        &self.git_dir
    }

    fn head(&self) -> Result<Option<CommitRef>, GitError> {
        let repo = self.open()?;
        let head = head_commit(&repo)?;
        Ok(head.map(|commit| CommitRef::new(commit.id().to_string())))
    }

    fn status(&self) -> Result<WorkingTreeStatus, GitError> {
        let repo = self.open()?;
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .exclude_submodules(true);
        let statuses = repo.statuses(Some(&mut options)).during("status")?;

        let mut status = WorkingTreeStatus::new();
        for entry in statuses.iter() {
            let path = path_from_bytes(entry.path_bytes());
            let flags = entry.status();

            if flags.is_conflicted() {
                status.conflicted.push(path);
                continue;
            }
            if flags.intersects(STAGED) {
                status.staged.push(path.clone());
            }
            if flags.intersects(WORKTREE_MODIFIED) {
                status.modified.push(path.clone());
            }
            if flags.contains(Status::WT_DELETED) {
                status.deleted.push(path.clone());
            }
            if flags.contains(Status::WT_NEW) && !flags.intersects(STAGED) {
                status.untracked.push(path);
            }
        }

        Ok(status)
    }

    fn upstream_status(&self) -> Result<Option<UpstreamStatus>, GitError> {
        let repo = self.open()?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(e)
                if matches!(
                    e.code(),
                    git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
                ) =>
            {
                return Ok(None)
            }
            Err(e) => {
                return Err(GitError::Operation {
                    operation: "read HEAD",
                    source: e,
                })
            }
        };
        if !head.is_branch() {
            return Ok(None);
        }
        let Some(branch_name) = head.shorthand().map(str::to_string) else {
            return Ok(None);
        };

        let branch = repo
            .find_branch(&branch_name, BranchType::Local)
            .during("find branch")?;
        let upstream = match branch.upstream() {
            Ok(upstream) => upstream,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => {
                return Err(GitError::Operation {
                    operation: "find upstream",
                    source: e,
                })
            }
        };

        let (Some(local), Some(remote)) = (head.target(), upstream.get().target()) else {
            return Ok(None);
        };
        let (ahead, behind) = repo
            .graph_ahead_behind(local, remote)
            .during("compare with upstream")?;
        let upstream_name = upstream
            .name()
            .during("read upstream name")?
            .unwrap_or("upstream")
            .to_string();

        Ok(Some(UpstreamStatus {
            branch: branch_name,
            upstream: upstream_name,
            ahead,
            behind,
        }))
    }

    fn known_files(&self) -> Result<KnownFiles, GitError> {
        let repo = self.open()?;
        let index = repo.index().during("read index")?;
        let tracked = index
            .iter()
            .map(|entry| path_from_bytes(&entry.path))
            .collect();
        let untracked = self.status()?.untracked;

        Ok(KnownFiles { tracked, untracked })
    }

    fn snapshot(&self) -> Result<WorkingTreeSnapshot, GitError> {
        let known = self.known_files()?;
        let mut snapshot = WorkingTreeSnapshot::new();

        for path in known.tracked.into_iter().chain(known.untracked) {
            if let Some(fingerprint) = fingerprint(&self.root.join(&path))? {
                snapshot.insert(path, fingerprint);
            }
        }

        trace!("Snapshot holds {} files", snapshot.len());
        Ok(snapshot)
    }

    fn commit(
        &self,
        produced: &[PathBuf],
        removed: &[PathBuf],
        message: &str,
    ) -> Result<CommitRef, GitError> {
        let repo = self.open()?;
        let mut index = repo.index().during("read index")?;

        for path in produced {
            index.add_path(path).during("stage file")?;
        }
        for path in removed {
            index.remove_path(path).during("stage removal")?;
        }
        index.write().during("write index")?;

        let tree_id = index.write_tree().during("write tree")?;
        let tree = repo.find_tree(tree_id).during("find tree")?;
        let signature = self.signature(&repo)?;
        let parent = head_commit(&repo)?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &parents,
            )
            .during("commit")?;

        debug!(
            "Committed {} produced and {} removed paths as {}",
            produced.len(),
            removed.len(),
            oid
        );
        Ok(CommitRef::new(oid.to_string()))
    }

    fn diff(&self, from: Option<&CommitRef>, to: &CommitRef) -> Result<TreeDiff, GitError> {
        let repo = self.open()?;
        let to_tree = Self::find_commit(&repo, to)?.tree().during("read tree")?;
        let from_tree = match from {
            Some(commit) => Some(Self::find_commit(&repo, commit)?.tree().during("read tree")?),
            None => None,
        };

        let diff = repo
            .diff_tree_to_tree(from_tree.as_ref(), Some(&to_tree), None)
            .during("diff")?;

        let mut result = TreeDiff::new();
        for delta in diff.deltas() {
            match delta.status() {
                Delta::Added => {
                    if let Some(path) = delta.new_file().path() {
                        result.added.push(path.to_path_buf());
                    }
                }
                Delta::Deleted => {
                    if let Some(path) = delta.old_file().path() {
                        result.removed.push(path.to_path_buf());
                    }
                }
                Delta::Modified | Delta::Typechange => {
                    if let Some(path) = delta.new_file().path() {
                        result.modified.push(path.to_path_buf());
                    }
                }
                _ => {}
            }
        }

        Ok(result)
    }

    fn commit_message(&self, commit: &CommitRef) -> Result<String, GitError> {
        let repo = self.open()?;
        let commit = Self::find_commit(&repo, commit)?;
        Ok(String::from_utf8_lossy(commit.message_bytes()).into_owned())
    }

    fn restore(&self, baseline: Option<&CommitRef>, created: &[PathBuf]) -> Result<(), GitError> {
        let repo = self.open()?;

        match baseline {
            Some(commit) => {
                let target = Self::find_commit(&repo, commit)?;
                let mut checkout = CheckoutBuilder::new();
                checkout.force();
                repo.reset(target.as_object(), ResetType::Hard, Some(&mut checkout))
                    .during("reset")?;
            }
            None => {
                let mut index = repo.index().during("read index")?;
                index.clear().during("clear index")?;
                index.write().during("write index")?;
            }
        }

        for path in created {
            self.remove_created(path)?;
        }

        debug!(
            "Restored repository to {} and removed {} created paths",
            baseline.map(|c| c.short()).unwrap_or("empty tree"),
            created.len()
        );
        Ok(())
    }
}

/// Paths as git stores them: raw bytes, not necessarily UTF-8
#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}
