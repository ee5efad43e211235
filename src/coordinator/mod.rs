//! Orchestration of a provenance-tracked run
//!
//! [`ExecutionCoordinator::run`] threads one command through the whole
//! pipeline: candidate collection, stream mapping, the repository guard,
//! tool inference, change observation, the commit and the store append.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::LineageConfig;
use crate::error::{LineageError, Result};
use crate::git::{CommitRef, VersionControl};
use crate::guard::RepositoryGuard;
use crate::store::{Step, WorkflowStore};
use crate::subprocess::{
    ExitStatus, ProcessCommand, ProcessCommandBuilder, ProcessError, SubprocessManager,
};
use crate::tool::{
    CandidateFileSet, CommandLine, PathResolver, StepMetadata, StreamMapper, StreamMapping,
    ToolFactory,
};
use crate::watch::ChangeWatcher;

/// Where the command's standard streams go
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StreamRequest {
    /// Keep the streams this process inherited from its shell
    #[default]
    Inherit,
    /// Open these files for the command; relative paths start at the working directory
    Declared {
        stdin: Option<PathBuf>,
        stdout: Option<PathBuf>,
        stderr: Option<PathBuf>,
    },
}

/// One command to run under provenance tracking
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub command: CommandLine,
    pub working_dir: PathBuf,
    pub streams: StreamRequest,
    /// Overrides the configured run timeout
    pub timeout: Option<Duration>,
}

impl RunRequest {
    pub fn new(command: CommandLine, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            working_dir: working_dir.into(),
            streams: StreamRequest::Inherit,
            timeout: None,
        }
    }

    pub fn with_streams(mut self, streams: StreamRequest) -> Self {
        self.streams = streams;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Outcome of a recorded run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub step: Step,
    pub commit: CommitRef,
    pub exit_status: ExitStatus,
}

pub struct ExecutionCoordinator {
    vcs: Arc<dyn VersionControl>,
    store: WorkflowStore,
    subprocess: SubprocessManager,
    config: LineageConfig,
}

impl ExecutionCoordinator {
    pub fn new(
        vcs: Arc<dyn VersionControl>,
        store: WorkflowStore,
        subprocess: SubprocessManager,
        config: LineageConfig,
    ) -> Self {
        Self {
            vcs,
            store,
            subprocess,
            config,
        }
    }

    pub fn store(&self) -> &WorkflowStore {
        &self.store
    }

    /// Run a command and record it as one commit and one workflow step.
    ///
    /// A non-zero exit is recorded like any other. Errors raised before the
    /// command starts leave the repository untouched; errors raised after it
    /// started roll the repository back, except a store failure, which keeps
    /// the commit.
    pub async fn run(&self, request: RunRequest) -> Result<RunReport> {
        let shown = request.command.to_string();
        if request.command.is_empty() {
            return Err(LineageError::Execution {
                command: shown,
                source: ProcessError::EmptyCommand,
            });
        }

        let cwd = request.working_dir.canonicalize()?;
        if !cwd.starts_with(self.vcs.root()) {
            warn!(
                "{} is outside the repository, no argument will be treated as a path",
                cwd.display()
            );
        }
        let resolver = PathResolver::new(self.vcs.root(), &cwd);

        let candidates = CandidateFileSet::collect(self.vcs.as_ref());
        let mapping = self.map_streams(&resolver, &request.streams);

        let mut guard = RepositoryGuard::new(Arc::clone(&self.vcs), self.config.guard_policy());
        guard.acquire(&format!("lineage run {shown}")).await?;

        // The shell opened ambient targets already; declared ones are opened later
        let ignored = if mapping.is_declared() {
            BTreeSet::new()
        } else {
            mapping.output_targets()
        };
        guard.precheck(&ignored)?;

        let factory = ToolFactory::new(resolver)
            .with_option_prefixes(self.config.tool.option_prefixes.clone());
        let draft = factory.build(&request.command, &candidates, &mapping);
        debug!(
            "Inferred base command {:?} with {} parameters",
            draft.base_command(),
            draft.parameters().len()
        );

        let started = ChangeWatcher::start(self.vcs.as_ref(), &mapping.output_targets())
            .map_err(LineageError::from)
            .and_then(|watcher| {
                guard.begin(watcher.baseline_paths())?;
                Ok(watcher)
            });
        let watcher = match started {
            Ok(watcher) => watcher,
            Err(e) => {
                if let Err(abort) = guard.abort() {
                    warn!("{}", abort);
                }
                return Err(e);
            }
        };

        let command = self.process_command(&request, &cwd);
        info!("Running {}", shown);
        let exit_status = match self.subprocess.runner().run(command).await {
            Ok(output) => {
                debug!("Command exited with {} after {:?}", output.status, output.duration);
                output.status
            }
            Err(ProcessError::Interrupted(reason)) => {
                let err = LineageError::Interrupted {
                    command: shown,
                    reason,
                };
                return Err(abandon(&mut guard, err));
            }
            Err(source) => {
                let err = LineageError::Execution {
                    command: shown,
                    source,
                };
                return Err(abandon(&mut guard, err));
            }
        };

        let changes = match watcher.finish(self.vcs.as_ref(), &draft) {
            Ok(changes) => changes,
            Err(e) => return Err(abandon(&mut guard, e.into())),
        };
        let tool = draft.seal(&changes);
        let metadata = StepMetadata::new(tool, exit_status, changes);
        let message = match metadata.commit_message(&self.config.commit.summary_prefix) {
            Ok(message) => message,
            Err(e) => return Err(abandon(&mut guard, e.into())),
        };

        let commit = guard.finalize(&metadata.tool.display(), &metadata.changes, &message)?;

        // The lock stays held until the step is appended
        let StepMetadata {
            tool,
            exit_status,
            changes,
        } = metadata;
        let step = self
            .store
            .add_step(tool, commit.clone(), exit_status, changes)
            .await;
        guard.release();

        Ok(RunReport {
            step: step?,
            commit,
            exit_status,
        })
    }

    fn map_streams(&self, resolver: &PathResolver, streams: &StreamRequest) -> StreamMapping {
        let mapper = StreamMapper::new(resolver.clone());
        match streams {
            StreamRequest::Inherit => mapper.map(),
            StreamRequest::Declared {
                stdin,
                stdout,
                stderr,
            } => mapper.declare(stdin.as_deref(), stdout.as_deref(), stderr.as_deref()),
        }
    }

    fn process_command(&self, request: &RunRequest, cwd: &Path) -> ProcessCommand {
        let mut builder = ProcessCommandBuilder::from_argv(request.command.argv())
            .current_dir(cwd)
            .maybe_timeout(request.timeout.or(self.config.run.timeout))
            .interruptible(self.config.run.handle_interrupts);

        if let StreamRequest::Declared {
            stdin,
            stdout,
            stderr,
        } = &request.streams
        {
            if let Some(path) = stdin {
                builder = builder.stdin_from(cwd.join(path));
            }
            if let Some(path) = stdout {
                builder = builder.stdout_to(cwd.join(path));
            }
            if let Some(path) = stderr {
                builder = builder.stderr_to(cwd.join(path));
            }
        }
        builder.build()
    }
}

/// Roll back after a failure; a failed rollback supersedes the original error
fn abandon(guard: &mut RepositoryGuard, err: LineageError) -> LineageError {
    match guard.rollback() {
        Ok(()) => err,
        Err(rollback) => {
            error!("{}", err);
            rollback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::repository::test_support::init_repo_with;
    use crate::git::Git2Repository;
    use crate::store::MemoryStepStorage;
    use crate::subprocess::MockProcessRunner;
    use crate::tool::ParameterRole;

    struct Fixture {
        dir: tempfile::TempDir,
        git: Arc<Git2Repository>,
        storage: MemoryStepStorage,
        mock: MockProcessRunner,
        coordinator: ExecutionCoordinator,
    }

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        let dir = init_repo_with(files);
        let git = Arc::new(
            Git2Repository::discover(dir.path())
                .unwrap()
                .with_author("Test", "test@example.com"),
        );
        let storage = MemoryStepStorage::new();
        let (subprocess, mock) = SubprocessManager::mock();
        let coordinator = ExecutionCoordinator::new(
            git.clone(),
            WorkflowStore::new(Arc::new(storage.clone())),
            subprocess,
            LineageConfig::default(),
        );
        Fixture {
            dir,
            git,
            storage,
            mock,
            coordinator,
        }
    }

    fn request(fixture: &Fixture, command: &str) -> RunRequest {
        RunRequest::new(CommandLine::parse(command), fixture.dir.path())
    }

    #[tokio::test]
    async fn test_records_inputs_and_outputs() {
        let mut fx = fixture(&[("a.txt", "alpha\n")]);
        fx.mock
            .expect_command("cp")
            .writes_file("b.txt", "alpha\n")
            .finish();
        let before = fx.git.head().unwrap();

        let report = fx.coordinator.run(request(&fx, "cp a.txt b.txt")).await.unwrap();

        assert_eq!(report.exit_status, ExitStatus::Success);
        assert_eq!(report.step.sequence, 1);
        assert_eq!(report.step.tool.inputs, vec![PathBuf::from("a.txt")]);
        assert_eq!(report.step.tool.outputs, vec![PathBuf::from("b.txt")]);
        assert_eq!(fx.git.head().unwrap(), Some(report.commit.clone()));
        assert!(fx.git.is_clean().unwrap());

        let diff = fx.git.diff(before.as_ref(), &report.commit).unwrap();
        assert_eq!(diff.added, vec![PathBuf::from("b.txt")]);

        let message = fx.git.commit_message(&report.commit).unwrap();
        let metadata = StepMetadata::from_commit_message(&message).unwrap().unwrap();
        assert_eq!(metadata.tool, report.step.tool);
        assert_eq!(fx.storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_declared_stdout_becomes_output() {
        let mut fx = fixture(&[("a.txt", "alpha\n")]);
        fx.mock.expect_command("echo").prints("hello\n").finish();

        let req = request(&fx, "echo hello").with_streams(StreamRequest::Declared {
            stdin: None,
            stdout: Some(PathBuf::from("out.log")),
            stderr: None,
        });
        let report = fx.coordinator.run(req).await.unwrap();

        let tool = &report.step.tool;
        assert_eq!(tool.redirections.len(), 1);
        assert_eq!(tool.redirections[0].target, PathBuf::from("out.log"));
        assert_eq!(tool.outputs, vec![PathBuf::from("out.log")]);
        assert!(report.step.changes.produced.contains(Path::new("out.log")));
        assert!(fx.git.is_clean().unwrap());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_recorded() {
        let mut fx = fixture(&[("a.txt", "alpha\n")]);
        fx.mock
            .expect_command("make")
            .writes_file("partial.txt", "x")
            .returns_exit_code(2)
            .finish();

        let report = fx.coordinator.run(request(&fx, "make all")).await.unwrap();

        assert_eq!(report.exit_status, ExitStatus::Error(2));
        assert_eq!(report.step.exit_status, ExitStatus::Error(2));
        assert_eq!(report.step.tool.base_command, vec!["make", "all"]);
        assert!(report
            .step
            .tool
            .parameters
            .iter()
            .all(|p| p.role() != ParameterRole::InputPath));
        assert!(report.step.changes.produced.contains(Path::new("partial.txt")));
    }

    #[tokio::test]
    async fn test_spawn_failure_rolls_back() {
        let mut fx = fixture(&[("a.txt", "alpha\n")]);
        fx.mock.expect_command("missing-tool").fails_to_spawn().finish();
        let before = fx.git.head().unwrap();

        let err = fx
            .coordinator
            .run(request(&fx, "missing-tool a.txt"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LineageError::Execution {
                source: ProcessError::CommandNotFound(_),
                ..
            }
        ));
        assert_eq!(err.exit_code(), 127);
        assert_eq!(fx.git.head().unwrap(), before);
        assert!(fx.storage.is_empty().await);
        assert!(!fx.git.state_dir().join(crate::guard::LOCK_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_dirty_tree_runs_nothing() {
        let fx = fixture(&[("a.txt", "alpha\n")]);
        std::fs::write(fx.dir.path().join("a.txt"), "edited\n").unwrap();

        let err = fx.coordinator.run(request(&fx, "cat a.txt")).await.unwrap_err();

        assert!(err.is_precondition());
        assert!(fx.mock.get_call_history().is_empty());
        assert!(fx.storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let fx = fixture(&[("a.txt", "alpha\n")]);
        let err = fx.coordinator.run(request(&fx, "")).await.unwrap_err();
        assert!(matches!(
            err,
            LineageError::Execution {
                source: ProcessError::EmptyCommand,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_commit() {
        let dir = init_repo_with(&[("a.txt", "alpha\n")]);
        let git = Arc::new(
            Git2Repository::discover(dir.path())
                .unwrap()
                .with_author("Test", "test@example.com"),
        );
        let (subprocess, mut mock) = SubprocessManager::mock();
        mock.expect_command("touch").writes_file("new.txt", "").finish();
        let coordinator = ExecutionCoordinator::new(
            git.clone(),
            WorkflowStore::new(Arc::new(MemoryStepStorage::unavailable())),
            subprocess,
            LineageConfig::default(),
        );

        let err = coordinator
            .run(RunRequest::new(CommandLine::parse("touch new.txt"), dir.path()))
            .await
            .unwrap_err();

        match err {
            LineageError::StorageUnavailable { commit, .. } => {
                assert_eq!(git.head().unwrap(), Some(commit));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(dir.path().join("new.txt").exists());
        assert!(git.is_clean().unwrap());
    }

    #[test]
    fn test_process_command_uses_declared_streams() {
        let fx = fixture(&[("a.txt", "alpha\n")]);
        let cwd = fx.git.root().to_path_buf();
        let req = request(&fx, "sort a.txt")
            .with_streams(StreamRequest::Declared {
                stdin: None,
                stdout: Some(PathBuf::from("sorted.txt")),
                stderr: Some(PathBuf::from("sorted.txt")),
            })
            .with_timeout(Some(Duration::from_secs(3)));

        let command = fx.coordinator.process_command(&req, &cwd);

        assert_eq!(command.program, "sort");
        assert_eq!(command.args, vec!["a.txt".to_string()]);
        assert_eq!(command.stdout, Some(cwd.join("sorted.txt")));
        assert_eq!(command.stderr, command.stdout);
        assert_eq!(command.timeout, Some(Duration::from_secs(3)));
        assert!(command.interruptible);
        assert_eq!(command.working_dir, Some(cwd));
    }
}
