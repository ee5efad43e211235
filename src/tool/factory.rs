//! Inference of a tool description from a command line
//!
//! Classification happens in two passes. [`ToolFactory::build`] looks only at
//! the tokens and the files that exist before the run and produces a
//! [`ToolDraft`] with provisional roles. [`ToolDraft::seal`] then folds in the
//! observed [`ChangeSet`]: anything the command produced becomes an output and
//! every role becomes final.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::candidates::CandidateFileSet;
use super::model::{
    Classification, CommandLine, CommandLineTool, Parameter, ParameterRole, Redirection, Stream,
};
use super::paths::PathResolver;
use super::streams::StreamMapping;
use crate::watch::ChangeSet;

/// Option prefixes used when none are configured
pub fn default_option_prefixes() -> Vec<String> {
    if cfg!(windows) {
        vec!["-".to_string(), "/".to_string()]
    } else {
        vec!["-".to_string()]
    }
}

/// Builds tool drafts for commands run from one working directory
#[derive(Debug, Clone)]
pub struct ToolFactory {
    resolver: PathResolver,
    option_prefixes: Vec<String>,
}

/// Provisional classification of a single token
struct Token {
    value: String,
    prefix: Option<String>,
    role: ParameterRole,
    path: Option<PathBuf>,
}

impl ToolFactory {
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver,
            option_prefixes: default_option_prefixes(),
        }
    }

    pub fn with_option_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.option_prefixes = prefixes;
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Classify every token of `command_line` without running anything
    pub fn build(
        &self,
        command_line: &CommandLine,
        candidates: &CandidateFileSet,
        streams: &StreamMapping,
    ) -> ToolDraft {
        let tokens: Vec<Token> = command_line
            .argv()
            .iter()
            .map(|token| self.classify(token, candidates))
            .collect();

        // The executable is always part of the base command, even when it is
        // a repository file such as `./run.sh`.
        let base_len = tokens
            .iter()
            .skip(1)
            .position(|t| t.role != ParameterRole::Literal || t.prefix.is_some())
            .map_or(tokens.len(), |i| i + 1);

        let executable = tokens
            .first()
            .filter(|t| t.role == ParameterRole::InputPath)
            .and_then(|t| t.path.clone());

        let base_paths = tokens[..base_len].iter().map(|t| t.path.clone()).collect();
        let parameters = number_positions(
            tokens
                .into_iter()
                .skip(base_len)
                .map(|t| Parameter {
                    position: None,
                    prefix: t.prefix,
                    value: t.value,
                    classification: Classification::Provisional(t.role),
                    path: t.path,
                })
                .collect(),
        );

        let draft = ToolDraft {
            command: command_line.argv().to_vec(),
            base_len,
            base_paths,
            executable,
            parameters,
            redirections: streams.redirections(),
        };
        debug!(
            "Built draft for '{}': base command {:?}, {} parameters, {} provisional inputs",
            command_line,
            draft.base_command(),
            draft.parameters.len(),
            draft.provisional_inputs().len()
        );
        draft
    }

    fn is_option(&self, token: &str) -> bool {
        self.option_prefixes
            .iter()
            .any(|prefix| token.len() > prefix.len() && token.starts_with(prefix.as_str()))
    }

    fn classify(&self, token: &str, candidates: &CandidateFileSet) -> Token {
        let path = self.resolver.resolve(token);

        if let Some(path) = path.as_ref().filter(|p| candidates.references(p)) {
            trace!("'{}' names repository path {}", token, path.display());
            return Token {
                value: token.to_string(),
                prefix: None,
                role: ParameterRole::InputPath,
                path: Some(path.clone()),
            };
        }

        if self.is_option(token) {
            if let Some((name, value)) = token.split_once('=') {
                let value_path = self.resolver.resolve(value);
                let role = match &value_path {
                    Some(p) if candidates.references(p) => ParameterRole::InputPath,
                    _ => ParameterRole::FlagWithValue,
                };
                return Token {
                    value: value.to_string(),
                    prefix: Some(format!("{name}=")),
                    role,
                    path: value_path,
                };
            }
            return Token {
                value: token.to_string(),
                prefix: None,
                role: ParameterRole::Flag,
                path: None,
            };
        }

        // Kept so that the token can become an output once the run is observed
        Token {
            value: token.to_string(),
            prefix: None,
            role: ParameterRole::Literal,
            path,
        }
    }
}

/// A tool description whose roles are still provisional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDraft {
    command: Vec<String>,
    base_len: usize,
    /// Resolved path of every base-command token
    base_paths: Vec<Option<PathBuf>>,
    /// The executable itself when it is a repository file
    executable: Option<PathBuf>,
    parameters: Vec<Parameter>,
    redirections: Vec<Redirection>,
}

impl ToolDraft {
    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn base_command(&self) -> &[String] {
        &self.command[..self.base_len]
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn redirections(&self) -> &[Redirection] {
        &self.redirections
    }

    /// Paths the command is expected to read
    pub fn provisional_inputs(&self) -> BTreeSet<PathBuf> {
        self.executable
            .iter()
            .cloned()
            .chain(
                self.parameters
                    .iter()
                    .filter(|p| p.role() == ParameterRole::InputPath)
                    .filter_map(|p| p.path.clone()),
            )
            .chain(
                self.redirections
                    .iter()
                    .filter(|r| r.stream == Stream::Stdin)
                    .map(|r| r.target.clone()),
            )
            .collect()
    }

    /// Fix every role against what the run actually changed
    pub fn seal(self, changes: &ChangeSet) -> CommandLineTool {
        let produced = |path: &Path| {
            changes.produced.contains(path) || changes.produced.iter().any(|p| p.starts_with(path))
        };

        // A base-command word that turned out to be an output, and every word
        // after it, move back into the parameter list.
        let base_len = self
            .base_paths
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, path)| path.as_deref().is_some_and(produced))
            .map_or(self.base_len, |(i, _)| i);

        let demoted = (base_len..self.base_len).map(|i| Parameter {
            position: None,
            prefix: None,
            value: self.command[i].clone(),
            classification: Classification::Provisional(ParameterRole::Literal),
            path: self.base_paths[i].clone(),
        });

        let parameters: Vec<Parameter> = demoted
            .chain(self.parameters)
            .map(|mut parameter| {
                let names_product = parameter.path.as_deref().is_some_and(produced);
                let role = match parameter.role() {
                    ParameterRole::Flag => ParameterRole::Flag,
                    _ if names_product => ParameterRole::OutputPath,
                    ParameterRole::InputPath => ParameterRole::InputPath,
                    role => {
                        parameter.path = None;
                        role
                    }
                };
                parameter.classification = Classification::Final(role);
                parameter
            })
            .collect();
        let parameters = number_positions(parameters);

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        if let Some(executable) = &self.executable {
            push_unique(&mut inputs, executable);
        }
        for parameter in &parameters {
            if let Some(path) = &parameter.path {
                match parameter.role() {
                    ParameterRole::InputPath => push_unique(&mut inputs, path),
                    ParameterRole::OutputPath => push_unique(&mut outputs, path),
                    _ => {}
                }
            }
        }
        for redirection in &self.redirections {
            match redirection.stream {
                Stream::Stdin => push_unique(&mut inputs, &redirection.target),
                Stream::Stdout | Stream::Stderr => push_unique(&mut outputs, &redirection.target),
            }
        }
        for path in &changes.produced {
            push_unique(&mut outputs, path);
        }

        CommandLineTool {
            base_command: self.command[..base_len].to_vec(),
            command: self.command,
            parameters,
            redirections: self.redirections,
            inputs,
            outputs,
        }
    }
}

fn push_unique(paths: &mut Vec<PathBuf>, path: &Path) {
    if !paths.iter().any(|p| p == path) {
        paths.push(path.to_path_buf());
    }
}

/// Give non-flag parameters their 1-based ordinal
fn number_positions(mut parameters: Vec<Parameter>) -> Vec<Parameter> {
    let mut next = 1;
    for parameter in &mut parameters {
        if parameter.is_flag() {
            parameter.position = None;
        } else {
            parameter.position = Some(next);
            next += 1;
        }
    }
    parameters
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn factory() -> ToolFactory {
        ToolFactory::new(PathResolver::new("/repo", "/repo"))
    }

    fn roles(tool: &CommandLineTool) -> Vec<ParameterRole> {
        tool.parameters.iter().map(Parameter::role).collect()
    }

    fn produced(paths: &[&str]) -> ChangeSet {
        ChangeSet {
            produced: paths.iter().map(PathBuf::from).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_copy_classifies_input_and_output() {
        let candidates = CandidateFileSet::from_paths(["a.txt"]);
        let draft = factory().build(
            &CommandLine::from_args(["cp", "a.txt", "b.txt"]),
            &candidates,
            &StreamMapping::default(),
        );

        assert_eq!(draft.base_command(), ["cp"]);
        assert_eq!(
            draft.parameters()[0].classification,
            Classification::Provisional(ParameterRole::InputPath)
        );
        assert_eq!(
            draft.provisional_inputs(),
            BTreeSet::from([PathBuf::from("a.txt")])
        );

        let tool = draft.seal(&produced(&["b.txt"]));
        assert_eq!(tool.base_command, ["cp"]);
        assert_eq!(
            roles(&tool),
            [ParameterRole::InputPath, ParameterRole::OutputPath]
        );
        assert!(tool.parameters.iter().all(|p| p.classification.is_final()));
        assert_eq!(tool.inputs, [PathBuf::from("a.txt")]);
        assert_eq!(tool.outputs, [PathBuf::from("b.txt")]);
        assert_eq!(tool.command_line(), tool.command);
    }

    #[test]
    fn test_flags_and_joined_options() {
        let candidates = CandidateFileSet::from_paths(["data/in.csv"]);
        let draft = factory().build(
            &CommandLine::parse("tool -v --in=data/in.csv --out=res.csv --mode=fast -"),
            &candidates,
            &StreamMapping::default(),
        );
        let tool = draft.seal(&produced(&["res.csv"]));

        assert_eq!(tool.base_command, ["tool"]);
        assert_eq!(
            roles(&tool),
            [
                ParameterRole::Flag,
                ParameterRole::InputPath,
                ParameterRole::OutputPath,
                ParameterRole::FlagWithValue,
                ParameterRole::Literal,
            ]
        );
        assert_eq!(tool.parameters[1].prefix.as_deref(), Some("--in="));
        assert_eq!(tool.parameters[1].value, "data/in.csv");
        assert_eq!(tool.parameters[2].path, Some(PathBuf::from("res.csv")));
        assert_eq!(tool.parameters[3].path, None);
        assert_eq!(
            tool.parameters.iter().map(|p| p.position).collect::<Vec<_>>(),
            [None, None, None, None, Some(1)]
        );
        assert_eq!(tool.command_line(), tool.command);
    }

    #[test]
    fn test_base_command_word_demoted_when_produced() {
        let draft = factory().build(
            &CommandLine::from_args(["touch", "new.txt", "other.txt"]),
            &CandidateFileSet::default(),
            &StreamMapping::default(),
        );
        assert_eq!(draft.base_command(), ["touch", "new.txt", "other.txt"]);

        let tool = draft.seal(&produced(&["new.txt", "other.txt"]));
        assert_eq!(tool.base_command, ["touch"]);
        assert_eq!(
            roles(&tool),
            [ParameterRole::OutputPath, ParameterRole::OutputPath]
        );
        assert_eq!(
            tool.parameters.iter().map(|p| p.position).collect::<Vec<_>>(),
            [Some(1), Some(2)]
        );
        assert_eq!(tool.command_line(), tool.command);
    }

    #[test]
    fn test_literals_stay_in_base_command() {
        let tool = factory()
            .build(
                &CommandLine::from_args(["echo", "hello", "world"]),
                &CandidateFileSet::default(),
                &StreamMapping::default(),
            )
            .seal(&ChangeSet::default());

        assert_eq!(tool.base_command, ["echo", "hello", "world"]);
        assert!(tool.parameters.is_empty());
        assert!(tool.inputs.is_empty());
    }

    #[test]
    fn test_script_executable_is_an_input() {
        let candidates = CandidateFileSet::from_paths(["run.sh", "data/a.csv"]);
        let draft = factory().build(
            &CommandLine::from_args(["./run.sh", "data"]),
            &candidates,
            &StreamMapping::default(),
        );
        assert_eq!(draft.base_command(), ["./run.sh"]);

        let tool = draft.seal(&ChangeSet::default());
        assert_eq!(roles(&tool), [ParameterRole::InputPath]);
        assert_eq!(
            tool.inputs,
            [PathBuf::from("run.sh"), PathBuf::from("data")]
        );
    }

    #[test]
    fn test_modified_input_becomes_output() {
        let candidates = CandidateFileSet::from_paths(["log.txt"]);
        let tool = factory()
            .build(
                &CommandLine::from_args(["sort", "-o", "log.txt", "log.txt"]),
                &candidates,
                &StreamMapping::default(),
            )
            .seal(&produced(&["log.txt"]));

        assert_eq!(
            roles(&tool),
            [
                ParameterRole::Flag,
                ParameterRole::OutputPath,
                ParameterRole::OutputPath
            ]
        );
        assert!(tool.inputs.is_empty());
    }

    #[test]
    fn test_stream_targets_feed_inputs_and_outputs() {
        let candidates = CandidateFileSet::from_paths(["in.txt"]);
        let streams = StreamMapping {
            stdin: Some(PathBuf::from("in.txt")),
            stdout: Some(PathBuf::from("out.log")),
            ..Default::default()
        };
        let draft = factory().build(&CommandLine::from_args(["wc", "-l"]), &candidates, &streams);
        assert!(draft.provisional_inputs().contains(Path::new("in.txt")));

        let tool = draft.seal(&produced(&["out.log"]));
        assert_eq!(tool.inputs, [PathBuf::from("in.txt")]);
        assert_eq!(tool.outputs, [PathBuf::from("out.log")]);
        assert_eq!(tool.redirections.len(), 2);
    }

    #[test]
    fn test_unnamed_products_are_listed_as_outputs() {
        let tool = factory()
            .build(
                &CommandLine::from_args(["make"]),
                &CandidateFileSet::default(),
                &StreamMapping::default(),
            )
            .seal(&produced(&["build/app", "build/app.o"]));

        assert_eq!(
            tool.outputs,
            [PathBuf::from("build/app"), PathBuf::from("build/app.o")]
        );
    }

    #[test]
    fn test_configured_option_prefixes() {
        let factory = factory().with_option_prefixes(vec!["-".into(), "/".into()]);
        let tool = factory
            .build(
                &CommandLine::from_args(["robocopy", "/E", "x"]),
                &CandidateFileSet::default(),
                &StreamMapping::default(),
            )
            .seal(&ChangeSet::default());

        assert_eq!(roles(&tool), [ParameterRole::Flag, ParameterRole::Literal]);
    }
}
