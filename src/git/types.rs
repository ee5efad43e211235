//! Git-related types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier of a commit capturing a step's effects
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitRef(String);

impl CommitRef {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// Uncommitted state of the working tree, relative to HEAD
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeStatus {
    pub staged: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub untracked: Vec<PathBuf>,
    pub conflicted: Vec<PathBuf>,
}

impl WorkingTreeStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.untracked.is_empty()
            && self.conflicted.is_empty()
    }

    /// Paths that make the tree dirty, skipping `ignored` and optionally untracked files
    pub fn dirty_paths(&self, allow_untracked: bool, ignored: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
        let untracked: &[PathBuf] = if allow_untracked { &[] } else { &self.untracked };
        let dirty: BTreeSet<&PathBuf> = self
            .staged
            .iter()
            .chain(&self.modified)
            .chain(&self.deleted)
            .chain(&self.conflicted)
            .chain(untracked)
            .filter(|path| !ignored.contains(*path))
            .collect();
        dirty.into_iter().cloned().collect()
    }
}

/// Relationship between the current branch and its upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamStatus {
    pub branch: String,
    pub upstream: String,
    pub ahead: usize,
    pub behind: usize,
}

impl UpstreamStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.behind == 0
    }
}

/// Files the repository knows about at a given moment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownFiles {
    pub tracked: Vec<PathBuf>,
    pub untracked: Vec<PathBuf>,
}

/// How a file is stored, mirroring git file modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    Regular,
    Executable,
    Symlink,
}

/// Content identity of a working-tree file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// Git blob id of the file content (or link target)
    pub blob: String,
    pub mode: FileMode,
}

/// Content fingerprints of every tracked and untracked, non-ignored file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeSnapshot {
    entries: BTreeMap<PathBuf, FileFingerprint>,
}

impl WorkingTreeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: PathBuf, fingerprint: FileFingerprint) {
        self.entries.insert(path, fingerprint);
    }

    pub fn remove(&mut self, path: &Path) -> Option<FileFingerprint> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &Path) -> Option<&FileFingerprint> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &FileFingerprint)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Files changed between two commits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl TreeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }
}
