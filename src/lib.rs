//! # lineage
//!
//! Provenance-tracked execution of shell commands.
//!
//! `lineage run -- <command>` runs a command inside a git repository, works
//! out which files it read and wrote, commits exactly those effects and
//! appends a declarative description of the invocation to a workflow store.
//!
//! ## Modules
//!
//! - `app` - Logging, fatal error handling and workspace setup for the binary
//! - `cli` - Argument parsing and subcommand implementations
//! - `config` - Layered configuration from user, repository and environment
//! - `coordinator` - Orchestrates one tracked run end to end
//! - `error` - Error taxonomy, codes and exit statuses
//! - `git` - Version-control backend over libgit2
//! - `guard` - Repository lock, precondition checks, commit and rollback
//! - `store` - Append-only workflow store and provenance graph
//! - `subprocess` - Child-process execution with a mockable runner
//! - `tool` - Inference of command-line tool descriptions
//! - `watch` - Before/after snapshots and change sets

pub mod app;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod git;
pub mod guard;
pub mod store;
pub mod subprocess;
pub mod tool;
pub mod watch;

pub use coordinator::{ExecutionCoordinator, RunReport, RunRequest, StreamRequest};
pub use error::{LineageError, Result};
