//! Append-only workflow store
//!
//! Every tracked run becomes one [`Step`]. Steps are only ever appended; a
//! correction is a new step. The provenance graph is derived on demand from
//! the step list.

pub mod backends;
pub mod error;
pub mod graph;
pub mod traits;

pub use backends::{FileStepStorage, MemoryStepStorage};
pub use error::{StorageError, StorageResult};
pub use graph::WorkflowGraph;
pub use traits::StepStorage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{LineageError, Result};
use crate::git::CommitRef;
use crate::subprocess::ExitStatus;
use crate::tool::CommandLineTool;
use crate::watch::ChangeSet;

/// One recorded command execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    /// 1-based position in the workflow
    pub sequence: u64,
    pub tool: CommandLineTool,
    pub commit: CommitRef,
    pub exit_status: ExitStatus,
    pub changes: ChangeSet,
    pub recorded_at: DateTime<Utc>,
}

impl Step {
    /// Paths this step read: observed consumption plus declared inputs
    pub fn read_paths(&self) -> BTreeSet<PathBuf> {
        self.changes
            .consumed
            .iter()
            .chain(&self.tool.inputs)
            .filter(|path| !self.changes.produced.contains(*path))
            .cloned()
            .collect()
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

/// The persistent list of steps
#[derive(Clone)]
pub struct WorkflowStore {
    storage: Arc<dyn StepStorage>,
}

impl WorkflowStore {
    pub fn new(storage: Arc<dyn StepStorage>) -> Self {
        Self { storage }
    }

    /// Store backed by a JSON-lines file
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStepStorage::new(path)))
    }

    pub fn location(&self) -> String {
        self.storage.location()
    }

    /// Append a step for a run whose effects are in `commit`.
    ///
    /// The commit already exists when this is called; a storage failure is
    /// reported as [`LineageError::StorageUnavailable`] and never undoes it.
    pub async fn add_step(
        &self,
        tool: CommandLineTool,
        commit: CommitRef,
        exit_status: ExitStatus,
        changes: ChangeSet,
    ) -> Result<Step> {
        let appended = async {
            let sequence = self
                .storage
                .load_all()
                .await?
                .last()
                .map_or(1, |last| last.sequence + 1);

            let step = Step {
                id: Uuid::new_v4(),
                sequence,
                tool,
                commit: commit.clone(),
                exit_status,
                changes,
                recorded_at: Utc::now(),
            };
            self.storage.persist(&step).await?;
            Ok::<_, StorageError>(step)
        }
        .await;

        match appended {
            Ok(step) => {
                info!(
                    "Appended step {} ({}) to {}",
                    step.sequence,
                    step.short_id(),
                    self.storage.location()
                );
                Ok(step)
            }
            Err(source) => {
                warn!("Commit {} has no workflow step: {}", commit, source);
                Err(LineageError::StorageUnavailable { commit, source })
            }
        }
    }

    /// All steps in append order
    pub async fn steps(&self) -> StorageResult<Vec<Step>> {
        self.storage.load_all().await
    }

    /// Look a step up by sequence number, or by a unique prefix of its id or commit
    pub async fn find(&self, query: &str) -> StorageResult<Option<Step>> {
        let steps = self.steps().await?;

        if let Ok(sequence) = query.parse::<u64>() {
            if let Some(step) = steps.iter().find(|s| s.sequence == sequence) {
                return Ok(Some(step.clone()));
            }
        }

        let query = query.to_ascii_lowercase();
        let mut matches = steps.into_iter().filter(|step| {
            step.id.simple().to_string().starts_with(&query)
                || step.id.to_string().starts_with(&query)
                || step.commit.as_str().starts_with(&query)
        });
        let found = matches.next();
        if found.is_some() && matches.next().is_some() {
            warn!("'{}' matches more than one step", query);
            return Ok(None);
        }
        Ok(found)
    }

    /// Provenance graph over all steps
    pub async fn graph(&self) -> StorageResult<WorkflowGraph> {
        Ok(WorkflowGraph::from_steps(&self.steps().await?))
    }
}
