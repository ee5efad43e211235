//! Lexical resolution of command-line tokens to repository paths

use std::path::{Component, Path, PathBuf};

/// Resolves tokens relative to the invocation directory and the repository root
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    cwd: PathBuf,
}

impl PathResolver {
    /// `root` and `cwd` must be absolute; `cwd` is normally inside `root`
    pub fn new(root: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cwd: cwd.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Repository-relative form of `token`, if it names something below the root.
    ///
    /// Resolution is purely lexical: symlinks are not followed and the path
    /// does not need to exist. The root itself is never a path.
    pub fn resolve(&self, token: &str) -> Option<PathBuf> {
        if token.is_empty() {
            return None;
        }
        self.relative(Path::new(token))
    }

    /// Like [`resolve`](Self::resolve) for an already-built path
    pub fn relative(&self, path: &Path) -> Option<PathBuf> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        };
        let normalized = normalize(&absolute)?;
        let relative = normalized.strip_prefix(&self.root).ok()?;
        if relative.as_os_str().is_empty() {
            None
        } else {
            Some(relative.to_path_buf())
        }
    }

    /// Absolute path of a repository-relative path
    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// Remove `.` and `..` components; `None` if `..` climbs above the root
pub fn normalize(path: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Some(normalized)
}
