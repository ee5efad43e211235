//! Command routing and execution
//!
//! This module handles routing CLI commands to their respective implementations.

use crate::app::AppConfig;
use crate::cli::args::Commands;
use crate::cli::commands::*;
use anyhow::Result;

/// Execute a CLI command and return the process exit code
pub async fn execute_command(command: Commands, app: &AppConfig) -> Result<i32> {
    match command {
        Commands::Run {
            stdin,
            stdout,
            stderr,
            timeout,
            command,
        } => {
            let args = TrackedRunArgs {
                command,
                stdin,
                stdout,
                stderr,
                timeout,
            };
            run_tracked_command(app, args).await
        }
        Commands::Log => run_log_command(app).await,
        Commands::Show { step, cwl } => run_show_command(app, &step, cwl).await,
        Commands::Trace { path } => run_trace_command(app, &path).await,
    }
}
