use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};

/// Runner that answers from scripted expectations instead of spawning programs.
///
/// Expectations may carry filesystem side effects, applied relative to the
/// command's working directory, so that change tracking can be exercised
/// without a real child process.
#[derive(Clone)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

#[derive(Debug, Clone)]
enum SideEffect {
    WriteFile { path: PathBuf, contents: String },
    RemoveFile(PathBuf),
    Stdout(String),
}

#[derive(Debug, Clone, Copy)]
enum MockResponse {
    Exit(ExitStatus),
    NotFound,
}

struct MockExpectation {
    program: String,
    #[allow(clippy::type_complexity)]
    args_matcher: Option<Box<dyn Fn(&[String]) -> bool + Send + Sync>>,
    effects: Vec<SideEffect>,
    response: MockResponse,
    times_called: usize,
    expected_times: Option<usize>,
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(Vec::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn expect_command(&mut self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                args_matcher: None,
                effects: Vec::new(),
                response: MockResponse::Exit(ExitStatus::Success),
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = lock(&self.call_history);
        let count = history.iter().filter(|cmd| cmd.program == program).count();
        count == times
    }

    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        lock(&self.call_history).clone()
    }

    pub fn reset(&mut self) {
        lock(&self.expectations).clear();
        lock(&self.call_history).clear();
    }

    fn apply(effect: &SideEffect, command: &ProcessCommand) -> std::io::Result<()> {
        let base = command.working_dir.as_deref().unwrap_or(Path::new("."));
        match effect {
            SideEffect::WriteFile { path, contents } => {
                let target = base.join(path);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(target, contents)
            }
            SideEffect::RemoveFile(path) => std::fs::remove_file(base.join(path)),
            SideEffect::Stdout(text) => match &command.stdout {
                Some(path) => std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?
                    .write_all(text.as_bytes()),
                None => Ok(()),
            },
        }
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        lock(&self.call_history).push(command.clone());

        let mut expectations = lock(&self.expectations);

        for expectation in expectations.iter_mut() {
            if expectation.program != command.program {
                continue;
            }

            if let Some(ref args_matcher) = expectation.args_matcher {
                if !(args_matcher)(&command.args) {
                    continue;
                }
            }

            expectation.times_called += 1;

            if let Some(expected) = expectation.expected_times {
                if expectation.times_called > expected {
                    return Err(ProcessError::MockExpectationNotMet(format!(
                        "Command '{}' called {} times, expected {}",
                        command.program, expectation.times_called, expected
                    )));
                }
            }

            let status = match expectation.response {
                MockResponse::NotFound => {
                    return Err(ProcessError::CommandNotFound(command.program.clone()))
                }
                MockResponse::Exit(status) => status,
            };

            if let Some(path) = &command.stdout {
                std::fs::File::create(path).map_err(|e| ProcessError::redirect(path, e))?;
            }
            for effect in &expectation.effects {
                Self::apply(effect, &command).map_err(|e| {
                    ProcessError::MockExpectationNotMet(format!(
                        "side effect {effect:?} failed: {e}"
                    ))
                })?;
            }

            return Ok(ProcessOutput {
                status,
                duration: Duration::from_millis(10),
            });
        }

        Err(ProcessError::MockExpectationNotMet(format!(
            "No expectation found for command: {} {:?}",
            command.program, command.args
        )))
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    /// Create or overwrite a file, relative to the working directory
    pub fn writes_file(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.expectation.effects.push(SideEffect::WriteFile {
            path: path.into(),
            contents: contents.to_string(),
        });
        self
    }

    pub fn removes_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.expectation
            .effects
            .push(SideEffect::RemoveFile(path.into()));
        self
    }

    /// Append text to the command's stdout redirection target, if any
    pub fn prints(mut self, text: &str) -> Self {
        self.expectation
            .effects
            .push(SideEffect::Stdout(text.to_string()));
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.response = MockResponse::Exit(if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        });
        self
    }

    pub fn returns_success(mut self) -> Self {
        self.expectation.response = MockResponse::Exit(ExitStatus::Success);
        self
    }

    /// Behave as if the program does not exist
    pub fn fails_to_spawn(mut self) -> Self {
        self.expectation.response = MockResponse::NotFound;
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        lock(&self.runner.expectations).push(self.expectation);
    }
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::ProcessCommandBuilder;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_side_effects_apply_in_working_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("old.txt"), "x").unwrap();

        let mut mock = MockProcessRunner::new();
        mock.expect_command("tool")
            .writes_file("sub/new.txt", "data")
            .removes_file("old.txt")
            .prints("report\n")
            .returns_exit_code(2)
            .finish();

        let command = ProcessCommandBuilder::new("tool")
            .current_dir(dir.path())
            .stdout_to(dir.path().join("out.log"))
            .build();
        let output = mock.run(command).await.unwrap();

        assert_eq!(output.status, ExitStatus::Error(2));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("sub/new.txt")).unwrap(),
            "data"
        );
        assert!(!dir.path().join("old.txt").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.log")).unwrap(),
            "report\n"
        );
        assert!(mock.verify_called("tool", 1));
    }

    #[tokio::test]
    async fn test_unexpected_command() {
        let mock = MockProcessRunner::new();
        let result = mock.run(ProcessCommandBuilder::new("ls").build()).await;
        assert!(matches!(result, Err(ProcessError::MockExpectationNotMet(_))));
    }

    #[tokio::test]
    async fn test_fails_to_spawn_and_call_limits() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("missing").fails_to_spawn().finish();
        mock.expect_command("once").times(1).finish();

        let missing = mock.run(ProcessCommandBuilder::new("missing").build()).await;
        assert!(matches!(missing, Err(ProcessError::CommandNotFound(_))));

        assert!(mock.run(ProcessCommandBuilder::new("once").build()).await.is_ok());
        assert!(mock.run(ProcessCommandBuilder::new("once").build()).await.is_err());
    }
}
