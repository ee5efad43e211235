//! In-memory backend

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::error::{StorageError, StorageResult};
use crate::store::traits::StepStorage;
use crate::store::Step;

/// Steps kept in process memory; clones share the same list
#[derive(Clone, Default)]
pub struct MemoryStepStorage {
    steps: Arc<RwLock<Vec<Step>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStepStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose writes always fail
    pub fn unavailable() -> Self {
        let storage = Self::new();
        storage.set_available(false);
        storage
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.steps.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.steps.read().await.is_empty()
    }
}

#[async_trait]
impl StepStorage for MemoryStepStorage {
    async fn persist(&self, step: &Step) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("memory store is offline"));
        }
        self.steps.write().await.push(step.clone());
        Ok(())
    }

    async fn load_all(&self) -> StorageResult<Vec<Step>> {
        Ok(self.steps.read().await.clone())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
