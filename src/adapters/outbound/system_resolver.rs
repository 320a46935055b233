//! System Host Resolver
//!
//! Implements HostResolver with the operating system resolver.

use crate::domain::errors::ResolveError;
use crate::domain::ports::HostResolver;
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

/// Resolver backed by `getaddrinfo` through tokio.
pub struct SystemHostResolver {
    timeout: Duration,
}

impl SystemHostResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Wildcard names cannot be looked up directly; probe a concrete label.
    pub fn lookup_name(host: &str) -> String {
        match host.strip_prefix('*') {
            Some(rest) => format!("test{}", rest),
            None => host.to_string(),
        }
    }
}

impl Default for SystemHostResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl HostResolver for SystemHostResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        let name = Self::lookup_name(host);
        tracing::debug!("checking host {}", name);

        let addrs = tokio::time::timeout(self.timeout, tokio::net::lookup_host((name.as_str(), 0)))
            .await
            .map_err(|_| ResolveError::new(&name, "lookup timed out"))?
            .map_err(|e| ResolveError::new(&name, e))?;

        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        tracing::debug!("{} resolved to {:?}", name, ips);
        Ok(ips)
    }
}
