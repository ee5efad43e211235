//! `lineage log`: list recorded steps

use anyhow::Result;

use crate::app::{AppConfig, Workspace};
use crate::config::ConfigLoader;
use crate::store::Step;

pub async fn run_log_command(app: &AppConfig) -> Result<i32> {
    let workspace = Workspace::open(&app.working_dir, &ConfigLoader::new())?;
    let steps = workspace.store.steps().await?;

    if steps.is_empty() {
        println!("No steps recorded in {}", workspace.store.location());
        return Ok(0);
    }
    for step in &steps {
        println!("{}", format_step_line(step));
    }
    Ok(0)
}

pub(crate) fn format_step_line(step: &Step) -> String {
    format!(
        "{:>4}  {}  {}  {:<10}  {}",
        step.sequence,
        step.short_id(),
        step.commit.short(),
        step.exit_status.to_string(),
        step.tool.display()
    )
}
