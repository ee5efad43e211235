//! CLI argument structures
//!
//! This module defines the command-line interface of `lineage`: the main CLI
//! structure and all subcommand definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use super::validation::parse_timeout;

/// Record shell commands as reproducible workflow steps
#[derive(Parser)]
#[command(name = "lineage")]
#[command(about = "lineage - Record shell commands as provenance-tracked workflow steps", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Run as if started in this directory
    #[arg(short = 'C', long = "directory", global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command and record it as a workflow step
    #[command(name = "run")]
    Run {
        /// Read the command's stdin from this file
        #[arg(long, value_name = "PATH")]
        stdin: Option<PathBuf>,

        /// Write the command's stdout to this file
        #[arg(long, value_name = "PATH")]
        stdout: Option<PathBuf>,

        /// Write the command's stderr to this file
        #[arg(long, value_name = "PATH")]
        stderr: Option<PathBuf>,

        /// Kill the command and roll back after this long (e.g. "30s", "5m")
        #[arg(long, value_parser = parse_timeout)]
        timeout: Option<Duration>,

        /// The command to run, after `--`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// List recorded steps
    #[command(name = "log")]
    Log,

    /// Show one step by sequence number, id prefix or commit
    #[command(name = "show")]
    Show {
        step: String,

        /// Print the step as a CWL CommandLineTool document
        #[arg(long)]
        cwl: bool,
    },

    /// List the steps that produced a file, oldest first
    #[command(name = "trace")]
    Trace { path: PathBuf },
}
