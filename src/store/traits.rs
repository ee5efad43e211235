//! Persistence interface for workflow steps

use async_trait::async_trait;

use super::error::StorageResult;
use super::Step;

/// Append-only step persistence
#[async_trait]
pub trait StepStorage: Send + Sync {
    /// Durably append one step after all previously persisted ones
    async fn persist(&self, step: &Step) -> StorageResult<()>;

    /// Load every persisted step in append order
    async fn load_all(&self) -> StorageResult<Vec<Step>>;

    /// Short description of where steps are kept
    fn location(&self) -> String;
}
