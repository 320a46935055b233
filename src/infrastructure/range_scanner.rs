//! Range Scanner
//!
//! Probes every address of every monitor range on each of its ports and
//! records which addresses answered.
//!
//! Two nested semaphores bound the fan-out: one per range for probes, one
//! global for ranges. Permits are refilled as soon as a probe or range
//! finishes, so one slow endpoint holds a single slot rather than a whole
//! wave.

use crate::domain::entities::{MonitorRange, PortSpec};
use crate::domain::ports::EndpointProber;
use crate::domain::value_objects::Protocol;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Scanner concurrency limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Maximum probes in flight within one range
    pub per_range_concurrency: usize,
    /// Maximum ranges scanned at once
    pub range_concurrency: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            per_range_concurrency: 25,
            range_concurrency: 10,
        }
    }
}

/// Mutable per-range scan result shared by that range's probe tasks.
struct ScanState {
    ports: Vec<PortSpec>,
    base_domain: String,
}

impl ScanState {
    fn record(&mut self, idx: usize, address: IpAddr, protocol: Protocol, domain: Option<String>) {
        let port = &mut self.ports[idx];
        port.targets.push(address);
        // first live probe fixes the protocol
        port.protocol.get_or_insert(protocol);

        if let Some(domain) = domain {
            tracing::info!("found base domain {}", domain);
            self.base_domain = domain;
        }
    }
}

/// Concurrent scanner over monitor ranges.
#[derive(Clone)]
pub struct RangeScanner {
    prober: Arc<dyn EndpointProber>,
    config: ScanConfig,
}

impl RangeScanner {
    pub fn new(prober: Arc<dyn EndpointProber>, config: ScanConfig) -> Self {
        Self { prober, config }
    }

    pub fn config(&self) -> ScanConfig {
        self.config
    }

    /// Scan all ranges, returning them in input order with fresh targets.
    pub async fn scan_all(&self, ranges: &[MonitorRange]) -> Vec<MonitorRange> {
        let limiter = Arc::new(Semaphore::new(self.config.range_concurrency.max(1)));
        let mut scans = JoinSet::new();
        let mut results = Vec::with_capacity(ranges.len());

        for (idx, range) in ranges.iter().cloned().enumerate() {
            let Ok(permit) = limiter.clone().acquire_owned().await else {
                break;
            };
            let scanner = self.clone();
            scans.spawn(async move {
                let _permit = permit;
                (idx, scanner.scan_range(range).await)
            });
            reap_finished(&mut scans, |result| results.push(result));
        }

        while let Some(joined) = scans.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!("range scan task failed: {}", e),
            }
        }

        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, range)| range).collect()
    }

    /// Scan one range.
    ///
    /// Target lists are cleared first. A range whose bounds do not parse is
    /// returned with empty targets.
    pub async fn scan_range(&self, mut range: MonitorRange) -> MonitorRange {
        range.clear_targets();

        let addresses = match range.address_range() {
            Ok(addresses) => addresses,
            Err(e) => {
                tracing::error!(
                    "skipping range {}-{}: {}",
                    range.ip_address_start,
                    range.ip_address_end,
                    e
                );
                return range;
            }
        };

        let state = Arc::new(Mutex::new(ScanState {
            ports: std::mem::take(&mut range.monitor_ports),
            base_domain: std::mem::take(&mut range.base_domain),
        }));
        let ports: Vec<PortSpec> = state.lock().ports.clone();

        let limiter = Arc::new(Semaphore::new(self.config.per_range_concurrency.max(1)));
        let mut probes = JoinSet::new();

        for address in addresses.iter() {
            for (idx, port) in ports.iter().enumerate() {
                let Ok(permit) = limiter.clone().acquire_owned().await else {
                    break;
                };
                let prober = self.prober.clone();
                let state = state.clone();
                let port = port.clone();

                probes.spawn(async move {
                    let _permit = permit;
                    let outcome = prober.probe(address, &port).await;
                    if outcome.reachable {
                        state
                            .lock()
                            .record(idx, address, outcome.protocol, outcome.inferred_domain);
                    }
                });
                reap_finished(&mut probes, |()| ());
            }
        }

        while let Some(joined) = probes.join_next().await {
            if let Err(e) = joined {
                tracing::error!("probe task failed: {}", e);
            }
        }

        {
            let mut state = state.lock();
            range.monitor_ports = std::mem::take(&mut state.ports);
            range.base_domain = std::mem::take(&mut state.base_domain);
        }

        tracing::debug!(
            "scanned {}-{}: {} live targets",
            range.ip_address_start,
            range.ip_address_end,
            range.monitor_ports.iter().map(|p| p.targets.len()).sum::<usize>()
        );
        range
    }
}

/// Drain tasks that already completed so a long spawn loop does not
/// accumulate finished entries.
fn reap_finished<T: 'static>(tasks: &mut JoinSet<T>, mut on_done: impl FnMut(T)) {
    while let Some(joined) = tasks.try_join_next() {
        match joined {
            Ok(value) => on_done(value),
            Err(e) => tracing::error!("scan task failed: {}", e),
        }
    }
}
