//! Structured step metadata carried in commit messages

use serde::{Deserialize, Serialize};

use super::model::CommandLineTool;
use crate::subprocess::ExitStatus;
use crate::watch::ChangeSet;

/// Line that separates the human summary from the JSON payload
pub const METADATA_MARKER: &str = "Lineage-Step-Metadata:";

const SUMMARY_WIDTH: usize = 72;

/// Everything needed to describe and re-run a step, as recorded in its commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMetadata {
    pub tool: CommandLineTool,
    pub exit_status: ExitStatus,
    pub changes: ChangeSet,
}

impl StepMetadata {
    pub fn new(tool: CommandLineTool, exit_status: ExitStatus, changes: ChangeSet) -> Self {
        Self {
            tool,
            exit_status,
            changes,
        }
    }

    /// One-line summary, cut to a readable width
    pub fn summary(&self, prefix: &str) -> String {
        let command = self.tool.display().replace(['\n', '\r'], " ");
        let mut summary = format!("{prefix}: {command}");
        if summary.chars().count() > SUMMARY_WIDTH {
            summary = summary.chars().take(SUMMARY_WIDTH - 3).collect();
            summary.push_str("...");
        }
        summary
    }

    /// Full commit message: summary, blank line, marker and JSON payload
    pub fn commit_message(&self, prefix: &str) -> Result<String, serde_json::Error> {
        let payload = serde_json::to_string_pretty(self)?;
        Ok(format!(
            "{}\n\n{}\n{}\n",
            self.summary(prefix),
            METADATA_MARKER,
            payload
        ))
    }

    /// Recover the metadata from a commit message; `Ok(None)` if it carries none
    pub fn from_commit_message(message: &str) -> Result<Option<Self>, serde_json::Error> {
        let Some((_, payload)) = message.split_once(METADATA_MARKER) else {
            return Ok(None);
        };
        serde_json::from_str(payload.trim()).map(Some)
    }
}
