//! The repository, configuration and store the binary operates on

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::{ConfigLoader, LineageConfig};
use crate::coordinator::ExecutionCoordinator;
use crate::error::Result;
use crate::git::{Git2Repository, VersionControl};
use crate::store::WorkflowStore;
use crate::subprocess::SubprocessManager;

pub struct Workspace {
    pub repository: Arc<Git2Repository>,
    pub config: LineageConfig,
    pub store: WorkflowStore,
    store_path: PathBuf,
}

impl Workspace {
    /// Open the repository containing `dir` with the configuration from `loader`
    pub fn open(dir: &Path, loader: &ConfigLoader) -> Result<Self> {
        let mut repository = Git2Repository::discover(dir)?;
        let config = loader.load(repository.root())?;
        if let Some((name, email)) = config.author() {
            repository = repository.with_author(name, email);
        }

        let store_path = config.store_path(repository.root(), repository.state_dir())?;
        debug!("Workflow store at {}", store_path.display());

        Ok(Self {
            store: WorkflowStore::open(&store_path),
            repository: Arc::new(repository),
            config,
            store_path,
        })
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Coordinator that runs commands as real child processes
    pub fn coordinator(&self) -> ExecutionCoordinator {
        self.coordinator_with(SubprocessManager::production())
    }

    pub fn coordinator_with(&self, subprocess: SubprocessManager) -> ExecutionCoordinator {
        ExecutionCoordinator::new(
            self.repository.clone(),
            self.store.clone(),
            subprocess,
            self.config.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::REPOSITORY_CONFIG_FILE;
    use crate::git::repository::test_support::init_repo_with;
    use std::collections::HashMap;

    fn loader() -> ConfigLoader {
        ConfigLoader::new()
            .with_user_config(None)
            .with_env(HashMap::new())
    }

    #[test]
    fn test_store_defaults_to_git_dir() {
        let dir = init_repo_with(&[("a.txt", "alpha\n")]);
        let workspace = Workspace::open(dir.path(), &loader()).unwrap();

        assert!(workspace
            .store_path()
            .starts_with(workspace.repository.state_dir()));
        assert!(workspace.store_path().ends_with("lineage/workflow.jsonl"));
    }

    #[test]
    fn test_repository_config_is_applied() {
        let dir = init_repo_with(&[("a.txt", "alpha\n")]);
        std::fs::write(
            dir.path().join(REPOSITORY_CONFIG_FILE),
            "[commit]\nsummary_prefix = \"step\"\n",
        )
        .unwrap();

        let workspace = Workspace::open(dir.path(), &loader()).unwrap();
        assert_eq!(workspace.config.commit.summary_prefix, "step");
    }

    #[test]
    fn test_store_inside_working_tree_is_refused() {
        let dir = init_repo_with(&[("a.txt", "alpha\n")]);
        std::fs::write(
            dir.path().join(REPOSITORY_CONFIG_FILE),
            "[store]\npath = \"workflow.jsonl\"\n",
        )
        .unwrap();

        let err = Workspace::open(dir.path(), &loader()).err().unwrap();
        assert!(err.to_string().contains("store.path"));
        assert!(!dir.path().join("workflow.jsonl").exists());
    }

    #[test]
    fn test_outside_repository() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Workspace::open(dir.path(), &loader()).is_err());
    }
}
