//! A-Record Checker
//!
//! Learns the virtual IPs of discovered jobs from DNS. A job's API VIP is
//! published as `api-int.{namespace}-{job}.{base_domain}`; the ingress VIP
//! is the address right after it.

use crate::adapters::outbound::TargetStore;
use crate::domain::ports::HostResolver;
use crate::domain::value_objects::next_address;
use std::net::IpAddr;
use std::sync::Arc;

/// Default prefix an address must carry to be treated as a cluster VIP.
pub const DEFAULT_INTERNAL_PREFIX: &str = "10.";

/// Hostname of a job's internal API endpoint.
pub fn api_int_host(namespace: &str, job_id: &str, base_domain: &str) -> String {
    format!("api-int.{}-{}.{}", namespace, job_id, base_domain)
}

/// Resolves VIPs for jobs still lacking a primary address.
pub struct ARecordChecker {
    store: Arc<TargetStore>,
    resolver: Arc<dyn HostResolver>,
    base_domain: String,
    internal_prefix: String,
}

impl ARecordChecker {
    pub fn new(
        store: Arc<TargetStore>,
        resolver: Arc<dyn HostResolver>,
        base_domain: impl Into<String>,
    ) -> Self {
        Self {
            store,
            resolver,
            base_domain: base_domain.into(),
            internal_prefix: DEFAULT_INTERNAL_PREFIX.to_string(),
        }
    }

    pub fn with_internal_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.internal_prefix = prefix.into();
        self
    }

    /// Pick the VIP among resolved addresses: the last one whose text starts
    /// with the internal prefix.
    pub fn select_vip(&self, addresses: &[IpAddr]) -> Option<IpAddr> {
        addresses
            .iter()
            .filter(|ip| ip.is_ipv4() && ip.to_string().starts_with(&self.internal_prefix))
            .last()
            .copied()
    }

    /// Check every pending job once. Returns the number of jobs updated.
    ///
    /// The store lock is not held across lookups, so a namespace deleted
    /// meanwhile simply drops the result.
    pub async fn check(&self) -> usize {
        let pending = self.store.pending_lookups();
        let mut updated = 0;

        for record in pending {
            let host = api_int_host(&record.namespace, &record.job_id, &self.base_domain);
            let addresses = match self.resolver.resolve(&host).await {
                Ok(addresses) => addresses,
                Err(e) => {
                    tracing::warn!("{}", e);
                    continue;
                }
            };

            let Some(primary) = self.select_vip(&addresses) else {
                tracing::debug!("no internal address for {} in {:?}", host, addresses);
                continue;
            };

            let mut secondaries = vec![primary];
            match next_address(primary) {
                Some(next) => secondaries.push(next),
                None => tracing::warn!("no address follows {}", primary),
            }

            if self
                .store
                .record_addresses(&record.namespace, &record.job_id, primary, secondaries)
            {
                tracing::info!("{} resolved to VIP {}", host, primary);
                updated += 1;
            }
        }

        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ResolveError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    #[derive(Default)]
    struct StaticResolver {
        answers: HashMap<String, Vec<IpAddr>>,
    }

    #[async_trait]
    impl HostResolver for StaticResolver {
        async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
            self.answers
                .get(host)
                .cloned()
                .ok_or_else(|| ResolveError::new(host, "no such host"))
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    /// Checker over a resolver answering `(host, address)` pairs in order.
    fn checker(store: Arc<TargetStore>, answers: &[(&str, &str)]) -> ARecordChecker {
        let mut resolver = StaticResolver::default();
        for (host, address) in answers {
            resolver
                .answers
                .entry(host.to_string())
                .or_default()
                .push(ip(address));
        }
        ARecordChecker::new(store, Arc::new(resolver), "example.com")
    }

    const HOST: &str = "api-int.ci-ln-abc-h1.example.com";

    #[test]
    fn test_api_int_host() {
        assert_eq!(
            api_int_host("ci-ln-abc", "h1", "example.com"),
            "api-int.ci-ln-abc-h1.example.com"
        );
    }

    #[tokio::test]
    async fn test_check_sets_primary_and_secondaries() {
        let store = Arc::new(TargetStore::new());
        store.record_pod_observation("ci-ln-abc", "h1");
        let checker = checker(
            store.clone(),
            &[(HOST, "10.0.0.4")],
        );

        assert_eq!(checker.check().await, 1);

        let record = &store.snapshot()[0];
        assert_eq!(record.primary, Some(ip("10.0.0.4")));
        assert_eq!(record.secondaries, vec![ip("10.0.0.4"), ip("10.0.0.5")]);
    }

    #[tokio::test]
    async fn test_check_last_internal_address_wins() {
        let store = Arc::new(TargetStore::new());
        store.record_pod_observation("ci-ln-abc", "h1");
        let checker = checker(
            store.clone(),
            &[
                (HOST, "10.0.0.4"),
                (HOST, "192.168.1.1"),
                (HOST, "10.0.0.9"),
                (HOST, "172.16.0.1"),
            ],
        );

        checker.check().await;
        assert_eq!(store.snapshot()[0].primary, Some(ip("10.0.0.9")));
    }

    #[tokio::test]
    async fn test_check_ignores_external_addresses() {
        let store = Arc::new(TargetStore::new());
        store.record_pod_observation("ci-ln-abc", "h1");
        let checker = checker(
            store.clone(),
            &[(HOST, "192.168.1.1"), (HOST, "fd00::10")],
        );

        assert_eq!(checker.check().await, 0);
        assert!(!store.snapshot()[0].has_primary());
    }

    #[tokio::test]
    async fn test_check_resolution_failure_is_retried() {
        let store = Arc::new(TargetStore::new());
        store.record_pod_observation("ci-ln-abc", "h1");
        store.record_pod_observation("ci-ln-def", "h2");
        let checker = checker(
            store.clone(),
            &[("api-int.ci-ln-def-h2.example.com", "10.1.0.1")],
        );

        assert_eq!(checker.check().await, 1);
        assert_eq!(store.pending_lookups().len(), 1);
        assert_eq!(store.pending_lookups()[0].namespace, "ci-ln-abc");
    }

    #[tokio::test]
    async fn test_check_skips_resolved_jobs() {
        let store = Arc::new(TargetStore::new());
        store.record_pod_observation("ci-ln-abc", "h1");
        store.record_addresses("ci-ln-abc", "h1", ip("10.0.0.1"), vec![]);
        let checker = checker(
            store.clone(),
            &[(HOST, "10.0.0.7")],
        );

        assert_eq!(checker.check().await, 0);
        assert_eq!(store.snapshot()[0].primary, Some(ip("10.0.0.1")));
    }

    #[tokio::test]
    async fn test_custom_internal_prefix() {
        let store = Arc::new(TargetStore::new());
        store.record_pod_observation("ci-ln-abc", "h1");
        let checker = checker(
            store.clone(),
            &[(HOST, "10.0.0.4"), (HOST, "172.16.3.3")],
        )
        .with_internal_prefix("172.16.");

        checker.check().await;
        assert_eq!(store.snapshot()[0].primary, Some(ip("172.16.3.3")));
    }

    #[test]
    fn test_select_vip_broadcast_has_no_successor() {
        let store = Arc::new(TargetStore::new());
        let checker = checker(store, &[]).with_internal_prefix("255.");
        let vip = checker.select_vip(&[ip("255.255.255.255")]);
        assert_eq!(vip, Some(ip("255.255.255.255")));
        assert_eq!(next_address(ip("255.255.255.255")), None);
    }
}
