//! `lineage run`: execute a command under provenance tracking

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::app::{diagnostic_line, report_warning, AppConfig, Workspace};
use crate::config::ConfigLoader;
use crate::coordinator::{RunReport, RunRequest, StreamRequest};
use crate::tool::CommandLine;

pub struct TrackedRunArgs {
    pub command: Vec<String>,
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl TrackedRunArgs {
    fn streams(&self) -> StreamRequest {
        if self.stdin.is_none() && self.stdout.is_none() && self.stderr.is_none() {
            StreamRequest::Inherit
        } else {
            StreamRequest::Declared {
                stdin: self.stdin.clone(),
                stdout: self.stdout.clone(),
                stderr: self.stderr.clone(),
            }
        }
    }
}

/// Run the command and exit with its status
pub async fn run_tracked_command(app: &AppConfig, args: TrackedRunArgs) -> Result<i32> {
    let workspace = Workspace::open(&app.working_dir, &ConfigLoader::new())?;
    let request = RunRequest::new(CommandLine::from_args(&args.command), &app.working_dir)
        .with_streams(args.streams())
        .with_timeout(args.timeout);

    match workspace.coordinator().run(request).await {
        Ok(report) => {
            print_report(&report);
            Ok(report.exit_status.as_exit_code())
        }
        Err(e) if !e.is_fatal() => {
            report_warning(&e);
            Ok(e.exit_code())
        }
        Err(e) => Err(e.into()),
    }
}

/// Summary next to the log output; stdout may be the command's own output file
fn print_report(report: &RunReport) {
    info!(
        "Step {} recorded as commit {}",
        report.step.sequence,
        report.commit.short()
    );
    let changes = &report.step.changes;
    diagnostic_line(&format!(
        "[lineage] step {} ({}) exited with {}: {} produced, {} removed, {} consumed",
        report.step.sequence,
        report.commit.short(),
        report.exit_status,
        changes.produced.len(),
        changes.removed.len(),
        changes.consumed.len()
    ));
}
