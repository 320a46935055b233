//! In-Memory Config Store
//!
//! Implements ConfigStore by keeping every applied configuration.
//! Used for dry runs and tests.

use crate::domain::errors::StoreError;
use crate::domain::ports::ConfigStore;
use async_trait::async_trait;
use parking_lot::Mutex;

/// A configuration handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedConfig {
    pub content: String,
    pub hash: String,
}

/// Recording config store.
#[derive(Default)]
pub struct MemoryConfigStore {
    applied: Mutex<Vec<AppliedConfig>>,
    fail_with: Mutex<Option<String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent applies fail with `reason` (`None` to recover).
    pub fn set_failure(&self, reason: Option<String>) {
        *self.fail_with.lock() = reason;
    }

    /// Every successfully applied configuration, oldest first.
    pub fn applied(&self) -> Vec<AppliedConfig> {
        self.applied.lock().clone()
    }

    pub fn last(&self) -> Option<AppliedConfig> {
        self.applied.lock().last().cloned()
    }

    pub fn apply_count(&self) -> usize {
        self.applied.lock().len()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn apply(&self, content: &str, content_hash: &str) -> Result<(), StoreError> {
        if let Some(reason) = self.fail_with.lock().clone() {
            return Err(StoreError::Rejected(reason));
        }

        self.applied.lock().push(AppliedConfig {
            content: content.to_string(),
            hash: content_hash.to_string(),
        });
        Ok(())
    }
}
