//! `lineage trace`: the steps behind a file

use anyhow::{Context, Result};
use std::path::Path;

use crate::app::{AppConfig, Workspace};
use crate::config::ConfigLoader;
use crate::git::VersionControl;
use crate::tool::PathResolver;

use super::log::format_step_line;

pub async fn run_trace_command(app: &AppConfig, path: &Path) -> Result<i32> {
    let workspace = Workspace::open(&app.working_dir, &ConfigLoader::new())?;
    let cwd = app
        .working_dir
        .canonicalize()
        .with_context(|| format!("Cannot resolve {}", app.working_dir.display()))?;
    let resolver = PathResolver::new(workspace.repository.root(), cwd);
    let relative = resolver
        .relative(path)
        .with_context(|| format!("{} is not inside the repository", path.display()))?;

    let graph = workspace.store.graph().await?;
    let upstream = graph.upstream_of(&relative);
    if upstream.is_empty() {
        println!("No recorded step produced {}", relative.display());
        return Ok(0);
    }

    for step in upstream {
        println!("{}", format_step_line(step));
        for (producer, input) in graph.dependencies(step.sequence) {
            println!(
                "        <- {} from step {}",
                input.display(),
                producer.sequence
            );
        }
    }
    Ok(0)
}
