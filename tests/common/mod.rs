//! Common test utilities and helpers

#![allow(dead_code)]

use git2::{Repository, Signature};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use lineage::config::LineageConfig;
use lineage::coordinator::ExecutionCoordinator;
use lineage::git::{Git2Repository, VersionControl};
use lineage::store::{StepStorage, WorkflowStore};
use lineage::subprocess::SubprocessManager;

/// A temporary git repository with one initial commit
pub struct TestRepo {
    dir: TempDir,
    pub git: Arc<Git2Repository>,
}

impl TestRepo {
    /// Create a repository whose first commit holds `files`
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        for (path, contents) in files {
            write_file(dir.path(), path, contents);
        }

        let mut index = repo.index().unwrap();
        for (path, _) in files {
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test User", "test@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
            .unwrap();

        let git = Arc::new(
            Git2Repository::discover(dir.path())
                .unwrap()
                .with_author("Test User", "test@example.com"),
        );
        Self { dir, git }
    }

    /// Publish the current branch to a bare `origin` and track it
    pub fn with_upstream(files: &[(&str, &str)]) -> (Self, TempDir) {
        let this = Self::with_files(files);
        let origin = TempDir::new().unwrap();
        Repository::init_bare(origin.path()).unwrap();

        let repo = Repository::open(this.path()).unwrap();
        let branch = this.branch();
        let mut remote = repo
            .remote("origin", origin.path().to_str().unwrap())
            .unwrap();
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote.push(&[refspec.as_str()], None).unwrap();
        remote.fetch(&[] as &[&str], None, None).unwrap();
        repo.find_branch(&branch, git2::BranchType::Local)
            .unwrap()
            .set_upstream(Some(&format!("origin/{branch}")))
            .unwrap();

        (this, origin)
    }

    /// Add a commit to `origin` and fetch it, leaving the local branch behind
    pub fn advance_upstream(&self, origin: &Path) {
        let branch = self.branch();
        let bare = Repository::open_bare(origin).unwrap();
        let reference = format!("refs/heads/{branch}");
        let parent = bare
            .find_reference(&reference)
            .unwrap()
            .peel_to_commit()
            .unwrap();
        let sig = Signature::now("Someone Else", "else@example.com").unwrap();
        bare.commit(
            Some(&reference),
            &sig,
            &sig,
            "Upstream work",
            &parent.tree().unwrap(),
            &[&parent],
        )
        .unwrap();

        let repo = Repository::open(self.path()).unwrap();
        repo.find_remote("origin")
            .unwrap()
            .fetch(&[] as &[&str], None, None)
            .unwrap();
    }

    pub fn branch(&self) -> String {
        let repo = Repository::open(self.path()).unwrap();
        let head = repo.head().unwrap();
        head.shorthand().unwrap().to_string()
    }

    pub fn path(&self) -> &Path {
        self.git.root()
    }

    pub fn join(&self, path: &str) -> PathBuf {
        self.path().join(path)
    }

    pub fn write(&self, path: &str, contents: &str) {
        write_file(self.path(), path, contents);
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.join(path)).unwrap()
    }

    pub fn commit_count(&self) -> usize {
        let repo = Repository::open(self.dir.path()).unwrap();
        let mut walk = repo.revwalk().unwrap();
        walk.push_head().unwrap();
        walk.count()
    }

    /// Store file inside the git directory
    pub fn store(&self) -> WorkflowStore {
        WorkflowStore::open(self.git.state_dir().join("lineage/workflow.jsonl"))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.git.state_dir().join(lineage::guard::LOCK_FILE_NAME)
    }

    /// Coordinator running real processes against the file store
    pub fn coordinator(&self) -> ExecutionCoordinator {
        self.coordinator_with(self.git.clone(), Arc::new(self.file_storage()), test_config())
    }

    pub fn coordinator_with(
        &self,
        vcs: Arc<dyn VersionControl>,
        storage: Arc<dyn StepStorage>,
        config: LineageConfig,
    ) -> ExecutionCoordinator {
        ExecutionCoordinator::new(
            vcs,
            WorkflowStore::new(storage),
            SubprocessManager::production(),
            config,
        )
    }

    fn file_storage(&self) -> lineage::store::FileStepStorage {
        lineage::store::FileStepStorage::new(self.git.state_dir().join("lineage/workflow.jsonl"))
    }
}

/// Default configuration without Ctrl-C handling
pub fn test_config() -> LineageConfig {
    let mut config = LineageConfig::default();
    config.run.handle_interrupts = false;
    config
}

fn write_file(root: &Path, path: &str, contents: &str) {
    let absolute = root.join(path);
    if let Some(parent) = absolute.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(absolute, contents).unwrap();
}
