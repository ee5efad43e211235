//! Command-line tool inference
//!
//! Turns a raw argument vector into a [`CommandLineTool`]: which tokens are
//! files read, files written, flags or plain literals, and where the standard
//! streams go.

pub mod candidates;
pub mod cwl;
pub mod factory;
pub mod metadata;
pub mod model;
pub mod paths;
pub mod streams;

pub use candidates::CandidateFileSet;
pub use factory::{default_option_prefixes, ToolDraft, ToolFactory};
pub use metadata::{StepMetadata, METADATA_MARKER};
pub use model::{
    Classification, CommandLine, CommandLineTool, Parameter, ParameterRole, Redirection, Stream,
};
pub use paths::PathResolver;
pub use streams::{StreamMapper, StreamMapping, StreamSource};
