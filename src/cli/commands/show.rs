//! `lineage show`: describe one step

use anyhow::{bail, Result};
use std::fmt::Write as _;

use crate::app::{AppConfig, Workspace};
use crate::config::ConfigLoader;
use crate::git::{CommitRef, VersionControl};
use crate::store::Step;
use crate::tool::{CommandLineTool, StepMetadata};

pub async fn run_show_command(app: &AppConfig, query: &str, cwl: bool) -> Result<i32> {
    let workspace = Workspace::open(&app.working_dir, &ConfigLoader::new())?;

    let tool = match workspace.store.find(query).await? {
        Some(step) => {
            if !cwl {
                print!("{}", describe_step(&step));
            }
            step.tool
        }
        // A commit whose step never reached the store still carries its metadata
        None => match metadata_from_commit(workspace.repository.as_ref(), query)? {
            Some(metadata) => {
                if !cwl {
                    println!("commit {} (not in the workflow store)", query);
                    print!("{}", describe_tool(&metadata.tool));
                }
                metadata.tool
            }
            None => bail!("No step matches '{}'", query),
        },
    };

    if cwl {
        print!("{}", tool.to_cwl()?);
    }
    Ok(0)
}

fn metadata_from_commit(vcs: &dyn VersionControl, query: &str) -> Result<Option<StepMetadata>> {
    let message = match vcs.commit_message(&CommitRef::new(query)) {
        Ok(message) => message,
        Err(_) => return Ok(None),
    };
    Ok(StepMetadata::from_commit_message(&message)?)
}

pub(crate) fn describe_step(step: &Step) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "step {} ({})", step.sequence, step.id);
    let _ = writeln!(out, "commit {}", step.commit);
    let _ = writeln!(out, "recorded {}", step.recorded_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "status {}", step.exit_status);
    out.push_str(&describe_tool(&step.tool));
    for path in &step.changes.removed {
        let _ = writeln!(out, "  removed {}", path.display());
    }
    out
}

fn describe_tool(tool: &CommandLineTool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "command {}", tool.display());
    let _ = writeln!(out, "base {}", shell_words::join(&tool.base_command));
    for parameter in &tool.parameters {
        let position = parameter
            .position
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        let _ = writeln!(
            out,
            "  {:>3}  {:<15} {}",
            position,
            format!("{:?}", parameter.role()),
            parameter.token()
        );
    }
    for input in &tool.inputs {
        let _ = writeln!(out, "  input  {}", input.display());
    }
    for output in &tool.outputs {
        let _ = writeln!(out, "  output {}", output.display());
    }
    out
}
