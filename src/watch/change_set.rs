use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::git::WorkingTreeSnapshot;

/// Filesystem effects of one command, as repository-relative paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Inputs that were present and left untouched
    pub consumed: BTreeSet<PathBuf>,
    /// Files created or changed in content or mode
    pub produced: BTreeSet<PathBuf>,
    /// Files present before and gone after
    pub removed: BTreeSet<PathBuf>,
}

impl ChangeSet {
    /// Compare two snapshots.
    ///
    /// Reads are not observed: a path counts as consumed when it was named as
    /// an input (or lies below an input directory) and did not change.
    pub fn diff(
        before: &WorkingTreeSnapshot,
        after: &WorkingTreeSnapshot,
        inputs: &BTreeSet<PathBuf>,
    ) -> Self {
        let produced: BTreeSet<PathBuf> = after
            .iter()
            .filter(|(path, fingerprint)| before.get(path) != Some(*fingerprint))
            .map(|(path, _)| path.clone())
            .collect();

        let removed = before
            .paths()
            .filter(|path| !after.contains(path))
            .cloned()
            .collect();

        let consumed = after
            .paths()
            .filter(|path| before.contains(path) && !produced.contains(*path))
            .filter(|path| is_named_by(path, inputs))
            .cloned()
            .collect();

        Self {
            consumed,
            produced,
            removed,
        }
    }

    /// Whether the command left no trace on the working tree
    pub fn is_empty(&self) -> bool {
        self.produced.is_empty() && self.removed.is_empty()
    }

    pub fn produced_paths(&self) -> Vec<PathBuf> {
        self.produced.iter().cloned().collect()
    }

    pub fn removed_paths(&self) -> Vec<PathBuf> {
        self.removed.iter().cloned().collect()
    }

    pub fn touches(&self, path: &Path) -> bool {
        self.produced.contains(path) || self.removed.contains(path)
    }
}

fn is_named_by(path: &Path, inputs: &BTreeSet<PathBuf>) -> bool {
    inputs.iter().any(|input| path.starts_with(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{FileFingerprint, FileMode};

    fn snapshot(entries: &[(&str, &str, FileMode)]) -> WorkingTreeSnapshot {
        let mut snapshot = WorkingTreeSnapshot::new();
        for (path, blob, mode) in entries {
            snapshot.insert(
                PathBuf::from(path),
                FileFingerprint {
                    blob: blob.to_string(),
                    mode: *mode,
                },
            );
        }
        snapshot
    }

    fn paths(items: &[&str]) -> BTreeSet<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_diff_classifies_paths() {
        use FileMode::*;
        let before = snapshot(&[
            ("a.txt", "1", Regular),
            ("data/x.csv", "2", Regular),
            ("data/y.csv", "3", Regular),
            ("gone.txt", "4", Regular),
            ("run.sh", "5", Regular),
        ]);
        let after = snapshot(&[
            ("a.txt", "1", Regular),
            ("data/x.csv", "2", Regular),
            ("data/y.csv", "9", Regular),
            ("new.txt", "6", Regular),
            ("run.sh", "5", Executable),
        ]);

        let changes = ChangeSet::diff(&before, &after, &paths(&["a.txt", "data", "missing.txt"]));

        assert_eq!(changes.produced, paths(&["data/y.csv", "new.txt", "run.sh"]));
        assert_eq!(changes.removed, paths(&["gone.txt"]));
        assert_eq!(changes.consumed, paths(&["a.txt", "data/x.csv"]));
        assert!(changes.consumed.is_disjoint(&changes.produced));
        assert!(changes.touches(Path::new("gone.txt")));
    }

    #[test]
    fn test_modified_input_is_not_consumed() {
        let before = snapshot(&[("log.txt", "1", FileMode::Regular)]);
        let after = snapshot(&[("log.txt", "2", FileMode::Regular)]);

        let changes = ChangeSet::diff(&before, &after, &paths(&["log.txt"]));
        assert!(changes.consumed.is_empty());
        assert_eq!(changes.produced, paths(&["log.txt"]));
    }

    #[test]
    fn test_identical_snapshots_are_empty() {
        let state = snapshot(&[("a.txt", "1", FileMode::Regular)]);
        assert!(ChangeSet::diff(&state, &state, &BTreeSet::new()).is_empty());
    }
}
