//! Config Store Port
//!
//! Defines where rendered HAProxy configuration ends up.

use crate::domain::errors::StoreError;
use async_trait::async_trait;

/// Destination for rendered configuration.
///
/// This is an outbound port. Implementations persist the content under a
/// fixed identifier and signal whatever consumes it (for example by bumping
/// a restart annotation with `content_hash`). Applying the same content
/// twice must be harmless.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Persist `content` and notify dependents with its hash.
    async fn apply(&self, content: &str, content_hash: &str) -> Result<(), StoreError>;
}
