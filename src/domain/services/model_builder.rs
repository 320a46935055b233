//! Model Builder Service
//!
//! Normalizes discovered job targets and scanned static ranges into the
//! routing model.

use crate::domain::entities::{MonitorRange, PortSpec, RoutingModel, TargetRecord};

/// Port the API virtual IP is exposed on.
pub const API_PORT: u16 = 6443;
/// SAN/SNI matcher for API endpoints.
pub const API_MATCH: &str = "api.";
/// Port the ingress virtual IPs are exposed on.
pub const INGRESS_PORT: u16 = 443;
/// SAN/SNI matcher for ingress endpoints.
pub const INGRESS_PREFIX: &str = "*.apps.";

/// Base domain under which a job's cluster is published.
pub fn job_base_domain(namespace: &str, job_id: &str, base_domain: &str) -> String {
    format!("{}-{}.{}", namespace, job_id, base_domain)
}

/// Builds a [`RoutingModel`] from a target snapshot.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    base_domain: String,
    header: String,
}

impl ModelBuilder {
    pub fn new(base_domain: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            base_domain: base_domain.into(),
            header: header.into(),
        }
    }

    /// Build the model.
    ///
    /// Jobs without a primary address are skipped. Static ranges are taken
    /// as scanned. Ranges left without a base domain or without a port
    /// carrying targets are dropped, and the result is sorted by base domain
    /// so rendering does not depend on store or scan order.
    ///
    /// Ranges sharing a base domain are merged into one, as are ports
    /// sharing a number, so every (base domain, port) pair yields a single
    /// backend. Targets keep first-seen order without duplicates; on a
    /// merge, job ranges come before scanned ones and their matcher wins.
    pub fn build<'a, I>(&self, records: I, scanned: Vec<MonitorRange>) -> RoutingModel
    where
        I: IntoIterator<Item = &'a TargetRecord>,
    {
        let mut ranges: Vec<MonitorRange> = records
            .into_iter()
            .filter_map(|record| self.range_for(record))
            .chain(scanned)
            .filter_map(MonitorRange::into_routable)
            .collect();

        // stable, so merge order follows input order
        ranges.sort_by(|a, b| a.base_domain.cmp(&b.base_domain));

        let mut merged: Vec<MonitorRange> = Vec::with_capacity(ranges.len());
        for mut range in ranges {
            let ports = std::mem::take(&mut range.monitor_ports);
            match merged.last_mut() {
                Some(last) if last.base_domain == range.base_domain => {
                    tracing::debug!("merging ranges for {}", range.base_domain);
                    merge_ports(&mut last.monitor_ports, ports);
                }
                _ => {
                    merge_ports(&mut range.monitor_ports, ports);
                    merged.push(range);
                }
            }
        }

        tracing::debug!("routing model has {} ranges", merged.len());
        RoutingModel::new(self.header.clone(), merged)
    }

    fn range_for(&self, record: &TargetRecord) -> Option<MonitorRange> {
        let primary = record.primary?;

        let mut ports = vec![PortSpec::new(API_PORT)
            .with_path_match(API_MATCH)
            .with_targets(vec![primary])];

        if !record.secondaries.is_empty() {
            ports.push(
                PortSpec::new(INGRESS_PORT)
                    .with_path_prefix(INGRESS_PREFIX)
                    .with_targets(record.secondaries.clone()),
            );
        }

        Some(MonitorRange::for_domain(
            job_base_domain(&record.namespace, &record.job_id, &self.base_domain),
            ports,
        ))
    }
}

/// Fold `ports` into `into`, joining target lists of equal port numbers.
fn merge_ports(into: &mut Vec<PortSpec>, ports: Vec<PortSpec>) {
    for mut port in ports {
        let targets = std::mem::take(&mut port.targets);
        let idx = match into.iter().position(|p| p.port == port.port) {
            Some(idx) => idx,
            None => {
                into.push(port);
                into.len() - 1
            }
        };

        let existing = &mut into[idx].targets;
        for target in targets {
            if !existing.contains(&target) {
                existing.push(target);
            }
        }
    }
}
