//! Domain Entities - Core business objects
//!
//! Monitor ranges and ports describe where to look for endpoints; target
//! records describe what has been discovered per job; the routing model is
//! the normalized result that gets rendered into HAProxy configuration.

use crate::domain::errors::ScanError;
use crate::domain::value_objects::{AddressRange, JobKey, Protocol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// A port probed on every address of a monitor range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PortSpec {
    pub port: u16,
    #[serde(default)]
    pub name: String,
    /// SAN prefix used both for domain inference and SNI routing
    #[serde(default)]
    pub path_prefix: String,
    /// Alternative to `path_prefix`; consulted only when the prefix is empty
    #[serde(default)]
    pub path_match: String,
    /// Unset until configured or learned from the first live probe
    #[serde(default)]
    pub protocol: Option<Protocol>,
    /// Live addresses, in probe-completion order
    #[serde(skip)]
    pub targets: Vec<IpAddr>,
}

impl PortSpec {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    pub fn with_path_match(mut self, path_match: impl Into<String>) -> Self {
        self.path_match = path_match.into();
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_targets(mut self, targets: Vec<IpAddr>) -> Self {
        self.targets = targets;
        self
    }

    /// The active matcher: path-prefix, else path-match.
    pub fn matcher(&self) -> Option<&str> {
        if !self.path_prefix.is_empty() {
            Some(&self.path_prefix)
        } else if !self.path_match.is_empty() {
            Some(&self.path_match)
        } else {
            None
        }
    }

    /// Protocol to probe with; TLS when nothing was configured or learned.
    pub fn effective_protocol(&self) -> Protocol {
        self.protocol.unwrap_or_default()
    }

    /// Derive a base domain from certificate DNS names.
    ///
    /// Every name starting with the matcher overwrites the result, so the
    /// last matching name wins. Names that are exactly the matcher are
    /// ignored.
    pub fn infer_base_domain<'a, I>(&self, dns_names: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let matcher = self.matcher()?;
        let mut domain = None;
        for name in dns_names {
            if let Some(rest) = name.strip_prefix(matcher) {
                if !rest.is_empty() {
                    domain = Some(rest.to_string());
                }
            }
        }
        domain
    }
}

/// An address range with the ports probed on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MonitorRange {
    #[serde(default)]
    pub ip_address_start: String,
    #[serde(default)]
    pub ip_address_end: String,
    #[serde(default)]
    pub monitor_ports: Vec<PortSpec>,
    /// Empty until configured or learned from a certificate
    #[serde(default)]
    pub base_domain: String,
}

impl MonitorRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            ip_address_start: start.into(),
            ip_address_end: end.into(),
            ..Default::default()
        }
    }

    /// A range with no address bounds, as synthesized for discovered jobs.
    pub fn for_domain(base_domain: impl Into<String>, ports: Vec<PortSpec>) -> Self {
        Self {
            base_domain: base_domain.into(),
            monitor_ports: ports,
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: PortSpec) -> Self {
        self.monitor_ports.push(port);
        self
    }

    pub fn address_range(&self) -> Result<AddressRange, ScanError> {
        AddressRange::parse(&self.ip_address_start, &self.ip_address_end)
    }

    pub fn clear_targets(&mut self) {
        for port in &mut self.monitor_ports {
            port.targets.clear();
        }
    }

    /// Drop empty ports; `None` when nothing routable remains.
    pub fn into_routable(mut self) -> Option<Self> {
        if self.base_domain.is_empty() {
            return None;
        }
        self.monitor_ports.retain(|p| !p.targets.is_empty());
        if self.monitor_ports.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// What is known about one job's virtual IPs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRecord {
    pub namespace: String,
    pub job_id: String,
    /// API virtual IP
    pub primary: Option<IpAddr>,
    /// Ingress virtual IPs
    pub secondaries: Vec<IpAddr>,
}

impl TargetRecord {
    pub fn new(namespace: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            job_id: job_id.into(),
            primary: None,
            secondaries: Vec::new(),
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.namespace.clone(), self.job_id.clone())
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }
}

/// Normalized routing state rendered into HAProxy configuration.
///
/// Only ranges with a base domain and at least one port with targets are
/// present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingModel {
    /// Static preamble emitted verbatim before generated sections
    pub header: String,
    pub ranges: Vec<MonitorRange>,
}

impl RoutingModel {
    pub fn new(header: impl Into<String>, ranges: Vec<MonitorRange>) -> Self {
        Self {
            header: header.into(),
            ranges,
        }
    }

    /// The model's identity for change detection.
    pub fn base_domains(&self) -> BTreeSet<&str> {
        self.ranges.iter().map(|r| r.base_domain.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
