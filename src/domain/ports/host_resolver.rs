//! Host Resolver Port
//!
//! Defines the interface for resolving hostnames to addresses.

use crate::domain::errors::ResolveError;
use async_trait::async_trait;
use std::net::IpAddr;

/// Resolver for A/AAAA lookups.
///
/// This is an outbound port that abstracts the system resolver so the
/// A-record checker can be exercised without DNS.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve a hostname, returning every address in answer order.
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError>;
}
