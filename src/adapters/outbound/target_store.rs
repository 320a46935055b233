//! Target Store
//!
//! In-memory map of discovered jobs, keyed by (namespace, job identifier).
//!
//! Every read and write goes through one coarse lock so a snapshot never
//! observes a half-applied pod event.

use crate::domain::entities::TargetRecord;
use crate::domain::value_objects::JobKey;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Records keyed by job identity, iterated in key order.
pub type TargetMap = BTreeMap<JobKey, TargetRecord>;

/// Lock-guarded store of discovered targets.
#[derive(Default)]
pub struct TargetStore {
    records: Mutex<TargetMap>,
}

impl TargetStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job seen in a pod event. Returns true if it was new.
    pub fn record_pod_observation(&self, namespace: &str, job_id: &str) -> bool {
        let key = JobKey::new(namespace, job_id);
        let mut records = self.records.lock();
        if records.contains_key(&key) {
            return false;
        }
        records.insert(key, TargetRecord::new(namespace, job_id));
        tracing::debug!("tracking job {}/{}", namespace, job_id);
        true
    }

    /// Set the addresses of a known job. Returns false if the job is unknown.
    pub fn record_addresses(
        &self,
        namespace: &str,
        job_id: &str,
        primary: IpAddr,
        secondaries: Vec<IpAddr>,
    ) -> bool {
        let mut records = self.records.lock();
        match records.get_mut(&JobKey::new(namespace, job_id)) {
            Some(record) => {
                record.primary = Some(primary);
                record.secondaries = secondaries;
                true
            }
            None => false,
        }
    }

    /// Forget every job in a namespace. Returns the number removed.
    pub fn remove_namespace(&self, namespace: &str) -> usize {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|key, _| key.namespace != namespace);
        let removed = before - records.len();

        if removed > 0 {
            tracing::info!("deleting namespace {} ({} jobs)", namespace, removed);
        }
        removed
    }

    /// Point-in-time copy of every record.
    pub fn snapshot(&self) -> Vec<TargetRecord> {
        self.records.lock().values().cloned().collect()
    }

    /// Records still waiting for a primary address.
    pub fn pending_lookups(&self) -> Vec<TargetRecord> {
        self.records
            .lock()
            .values()
            .filter(|r| !r.has_primary())
            .cloned()
            .collect()
    }

    /// Run `f` while holding the store lock.
    pub fn with_lock<R>(&self, f: impl FnOnce(&TargetMap) -> R) -> R {
        let records = self.records.lock();
        f(&records)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_record_pod_observation_is_idempotent() {
        let store = TargetStore::new();
        assert!(store.record_pod_observation("ci-ln-a", "h1"));
        assert!(!store.record_pod_observation("ci-ln-a", "h1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_observation_keeps_learned_addresses() {
        let store = TargetStore::new();
        store.record_pod_observation("ci-ln-a", "h1");
        store.record_addresses("ci-ln-a", "h1", ip("10.0.0.4"), vec![ip("10.0.0.5")]);
        store.record_pod_observation("ci-ln-a", "h1");

        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].primary, Some(ip("10.0.0.4")));
    }

    #[test]
    fn test_record_addresses_unknown_job() {
        let store = TargetStore::new();
        assert!(!store.record_addresses("ci-ln-a", "h1", ip("10.0.0.4"), vec![]));
        assert!(store.is_empty());
    }

    #[test]
    fn test_record_addresses() {
        let store = TargetStore::new();
        store.record_pod_observation("ci-ln-a", "h1");
        assert!(store.record_addresses(
            "ci-ln-a",
            "h1",
            ip("10.0.0.4"),
            vec![ip("10.0.0.4"), ip("10.0.0.5")]
        ));

        let record = &store.snapshot()[0];
        assert_eq!(record.primary, Some(ip("10.0.0.4")));
        assert_eq!(record.secondaries, vec![ip("10.0.0.4"), ip("10.0.0.5")]);
    }

    #[test]
    fn test_remove_namespace() {
        let store = TargetStore::new();
        store.record_pod_observation("ci-ln-a", "h1");
        store.record_pod_observation("ci-ln-a", "h2");
        store.record_pod_observation("ci-ln-b", "h1");

        assert_eq!(store.remove_namespace("ci-ln-a"), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.remove_namespace("ci-ln-a"), 0);
        assert_eq!(store.remove_namespace("missing"), 0);
    }

    #[test]
    fn test_snapshot_is_detached_and_ordered() {
        let store = TargetStore::new();
        store.record_pod_observation("ci-ln-b", "h1");
        store.record_pod_observation("ci-ln-a", "h1");

        let snapshot = store.snapshot();
        store.remove_namespace("ci-ln-a");

        let namespaces: Vec<&str> = snapshot.iter().map(|r| r.namespace.as_str()).collect();
        assert_eq!(namespaces, vec!["ci-ln-a", "ci-ln-b"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_pending_lookups() {
        let store = TargetStore::new();
        store.record_pod_observation("ci-ln-a", "h1");
        store.record_pod_observation("ci-ln-b", "h1");
        store.record_addresses("ci-ln-a", "h1", ip("10.0.0.4"), vec![]);

        let pending = store.pending_lookups();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].namespace, "ci-ln-b");
    }

    #[test]
    fn test_with_lock() {
        let store = TargetStore::new();
        store.record_pod_observation("ci-ln-a", "h1");
        let count = store.with_lock(|records| records.len());
        assert_eq!(count, 1);
    }

    #[test]
    fn test_concurrent_observations() {
        let store = std::sync::Arc::new(TargetStore::new());
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for job in 0..50 {
                        store.record_pod_observation(&format!("ci-ln-{}", n % 2), &format!("h{}", job));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 100);
    }
}
