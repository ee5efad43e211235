//! Configuration
//!
//! Settings come from built-in defaults, the user's `config.toml`, the
//! repository's `.lineage.toml` and finally `LINEAGE_*` environment
//! variables, each layer overriding the previous one key by key.

pub mod loader;

pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LineageError, Result};
use crate::guard::GuardPolicy;
use crate::tool::default_option_prefixes;
use crate::tool::paths::normalize;

/// Name of the per-repository configuration file
pub const REPOSITORY_CONFIG_FILE: &str = ".lineage.toml";

/// Default store location, relative to the git directory
pub const DEFAULT_STORE_PATH: &str = "lineage/workflow.jsonl";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    pub guard: GuardConfig,
    pub lock: LockConfig,
    pub store: StoreConfig,
    pub commit: CommitConfig,
    pub tool: ToolConfig,
    pub run: RunConfig,
}

/// Preconditions checked before a command runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Let untracked files exist in the working tree
    pub allow_untracked: bool,
    /// Refuse to run when the branch is behind its upstream
    pub require_up_to_date: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            allow_untracked: false,
            require_up_to_date: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Wait this long for a busy repository instead of failing at once
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub wait: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Workflow file; relative paths are taken from the repository root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    pub summary_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            summary_prefix: "lineage".to_string(),
            author_name: None,
            author_email: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Token prefixes that mark an option
    pub option_prefixes: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            option_prefixes: default_option_prefixes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Kill the command and roll back after this long
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Kill the command and roll back on Ctrl-C
    pub handle_interrupts: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            handle_interrupts: true,
        }
    }
}

impl LineageConfig {
    /// Reject values that would make runs misbehave
    pub fn validate(&self) -> Result<()> {
        if self.commit.summary_prefix.trim().is_empty() {
            return Err(LineageError::config("commit.summary_prefix must not be empty"));
        }
        if self.tool.option_prefixes.iter().any(|p| p.is_empty()) {
            return Err(LineageError::config("tool.option_prefixes must not contain empty strings"));
        }
        if self.commit.author_name.is_some() != self.commit.author_email.is_some() {
            return Err(LineageError::config(
                "commit.author_name and commit.author_email must be set together",
            ));
        }
        if self.run.timeout == Some(Duration::ZERO) {
            return Err(LineageError::config("run.timeout must be greater than zero"));
        }
        Ok(())
    }

    pub fn guard_policy(&self) -> GuardPolicy {
        GuardPolicy {
            allow_untracked: self.guard.allow_untracked,
            require_up_to_date: self.guard.require_up_to_date,
            lock_wait: self.lock.wait,
        }
    }

    /// Where the workflow file lives for a repository.
    ///
    /// The file is written after each commit, so it must not be part of the
    /// working tree; a configured path inside it is rejected.
    pub fn store_path(&self, root: &Path, git_dir: &Path) -> Result<PathBuf> {
        let Some(path) = &self.store.path else {
            return Ok(git_dir.join(DEFAULT_STORE_PATH));
        };
        let joined = root.join(path);
        let resolved = normalize(&joined).unwrap_or(joined);
        if resolved.starts_with(root) && !resolved.starts_with(git_dir) {
            return Err(LineageError::config(format!(
                "store.path {} is inside the working tree; use a path in the git directory or outside the repository",
                path.display()
            )));
        }
        Ok(resolved)
    }

    pub fn author(&self) -> Option<(&str, &str)> {
        Some((
            self.commit.author_name.as_deref()?,
            self.commit.author_email.as_deref()?,
        ))
    }
}
