//! Command-line tool description types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// What a single command-line token means to the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterRole {
    Literal,
    InputPath,
    OutputPath,
    Flag,
    FlagWithValue,
}

/// A role together with how certain it is.
///
/// Roles are `Provisional` while only the argument vector and the candidate
/// files are known, and become `Final` once the observed changes are in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "role", rename_all = "snake_case")]
pub enum Classification {
    Provisional(ParameterRole),
    Final(ParameterRole),
}

impl Classification {
    pub fn role(&self) -> ParameterRole {
        match self {
            Self::Provisional(role) | Self::Final(role) => *role,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }
}

/// One token of the command line after the base command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// 1-based ordinal among non-flag parameters
    pub position: Option<usize>,
    /// `--name=` part of a joined option
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub value: String,
    pub classification: Classification,
    /// Repository-relative path the value refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Parameter {
    pub fn role(&self) -> ParameterRole {
        self.classification.role()
    }

    /// The original command-line token
    pub fn token(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{}", self.value),
            None => self.value.clone(),
        }
    }

    pub fn is_flag(&self) -> bool {
        self.prefix.is_some() || matches!(self.role(), ParameterRole::Flag | ParameterRole::FlagWithValue)
    }
}

/// A standard stream of the child process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdin,
    Stdout,
    Stderr,
}

impl Stream {
    pub const ALL: [Stream; 3] = [Stream::Stdin, Stream::Stdout, Stream::Stderr];

    pub fn fd(&self) -> u8 {
        match self {
            Self::Stdin => 0,
            Self::Stdout => 1,
            Self::Stderr => 2,
        }
    }

    pub fn is_output(&self) -> bool {
        !matches!(self, Self::Stdin)
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        })
    }
}

/// A standard stream bound to a file inside the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirection {
    pub stream: Stream,
    pub target: PathBuf,
}

/// A tokenised command line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLine {
    argv: Vec<String>,
}

impl CommandLine {
    /// Take an argument vector verbatim
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command string with POSIX shell quoting rules
    pub fn parse(command: &str) -> Self {
        match shell_words::split(command) {
            Ok(argv) => Self { argv },
            Err(e) => {
                warn!("Cannot parse '{}' ({}), splitting on whitespace", command, e);
                Self::from_args(command.split_whitespace())
            }
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    pub fn len(&self) -> usize {
        self.argv.len()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(&self.argv))
    }
}

/// Declarative description of one command invocation, with final roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLineTool {
    pub command: Vec<String>,
    pub base_command: Vec<String>,
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub redirections: Vec<Redirection>,
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    #[serde(default)]
    pub outputs: Vec<PathBuf>,
}

impl CommandLineTool {
    /// Rebuild the argument vector from the base command and parameters
    pub fn command_line(&self) -> Vec<String> {
        self.base_command
            .iter()
            .cloned()
            .chain(self.parameters.iter().map(Parameter::token))
            .collect()
    }

    /// Shell form of the invocation including redirections
    pub fn display(&self) -> String {
        let mut rendered = shell_words::join(&self.command);
        for redirection in &self.redirections {
            let operator = match redirection.stream {
                Stream::Stdin => "<",
                Stream::Stdout => ">",
                Stream::Stderr => "2>",
            };
            let target = redirection.target.to_string_lossy();
            rendered.push_str(&format!(" {operator} {}", shell_words::quote(&target)));
        }
        rendered
    }

    pub fn redirection(&self, stream: Stream) -> Option<&Redirection> {
        self.redirections.iter().find(|r| r.stream == stream)
    }

    pub fn parameters_with_role(&self, role: ParameterRole) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(move |p| p.role() == role)
    }

    pub fn reads(&self, path: &Path) -> bool {
        self.inputs.iter().any(|p| p == path)
    }

    pub fn writes(&self, path: &Path) -> bool {
        self.outputs.iter().any(|p| p == path)
    }
}
