use std::path::Path;
use std::time::Duration;

use crate::subprocess::ProcessCommand;

pub struct ProcessCommandBuilder {
    command: ProcessCommand,
}

impl ProcessCommandBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            command: ProcessCommand {
                program: program.to_string(),
                ..Default::default()
            },
        }
    }

    /// Start from a full argument vector; the first element is the program
    pub fn from_argv(argv: &[String]) -> Self {
        let (program, args) = argv.split_first().map_or(("", &[][..]), |(p, a)| (p.as_str(), a));
        Self::new(program).args(args)
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.command.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.command
            .args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.command.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.command.timeout = Some(timeout);
        self
    }

    pub fn maybe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command.timeout = timeout;
        self
    }

    pub fn interruptible(mut self, interruptible: bool) -> Self {
        self.command.interruptible = interruptible;
        self
    }

    pub fn stdin_from(mut self, path: impl AsRef<Path>) -> Self {
        self.command.stdin = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn stdout_to(mut self, path: impl AsRef<Path>) -> Self {
        self.command.stdout = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn stderr_to(mut self, path: impl AsRef<Path>) -> Self {
        self.command.stderr = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> ProcessCommand {
        self.command
    }
}
