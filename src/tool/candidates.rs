//! Files the repository knows about when a command is invoked

use std::collections::BTreeSet;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::git::VersionControl;

/// Tracked plus untracked, non-ignored paths at invocation time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFileSet {
    paths: BTreeSet<PathBuf>,
}

impl CandidateFileSet {
    /// Enumerate the repository's files.
    ///
    /// Never fails: if the backend cannot list files the set is empty and every
    /// token is classified as a literal.
    pub fn collect(vcs: &dyn VersionControl) -> Self {
        match vcs.known_files() {
            Ok(known) => {
                let set: Self = known.tracked.into_iter().chain(known.untracked).collect();
                debug!("Collected {} candidate files", set.len());
                set
            }
            Err(e) => {
                warn!("Cannot enumerate repository files, path inference disabled: {}", e);
                Self::default()
            }
        }
    }

    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Whether any candidate lives strictly below `dir`
    pub fn contains_under(&self, dir: &Path) -> bool {
        self.paths
            .range::<Path, _>((Bound::Excluded(dir), Bound::Unbounded))
            .next()
            .is_some_and(|path| path.starts_with(dir))
    }

    /// Whether `path` is a candidate or a directory holding candidates
    pub fn references(&self, path: &Path) -> bool {
        self.contains(path) || self.contains_under(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for CandidateFileSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self::from_paths(iter)
    }
}
