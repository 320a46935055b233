//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use crate::domain::errors::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Protocol used to probe a monitored port.
///
/// Ports without an explicit protocol are probed over TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TLS handshake; certificate SANs are inspected for a base domain
    Https,
    /// Plain HTTP GET; any response counts as live
    Http,
}

impl Protocol {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Https)
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::Https
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a discovered job: (namespace, job identifier).
///
/// Ordered so that store snapshots iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey {
    pub namespace: String,
    pub job_id: String,
}

impl JobKey {
    pub fn new(namespace: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            job_id: job_id.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.job_id)
    }
}

/// Step an address by one, or `None` when it would wrap past the top of
/// its address family.
///
/// # Examples
/// ```
/// use haproxy_dyna::domain::value_objects::next_address;
/// use std::net::{IpAddr, Ipv4Addr};
///
/// let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 255));
/// assert_eq!(next_address(ip), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 1, 0))));
/// ```
pub fn next_address(ip: IpAddr) -> Option<IpAddr> {
    match ip {
        IpAddr::V4(v4) => u32::from(v4)
            .checked_add(1)
            .map(|n| IpAddr::V4(Ipv4Addr::from(n))),
        IpAddr::V6(v6) => u128::from(v6)
            .checked_add(1)
            .map(|n| IpAddr::V6(Ipv6Addr::from(n))),
    }
}

/// Inclusive range of addresses of a single family.
///
/// `iter()` restarts from `start` every time it is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    start: IpAddr,
    end: IpAddr,
}

impl AddressRange {
    /// Create a range, rejecting mixed families and `start > end`.
    pub fn new(start: IpAddr, end: IpAddr) -> Result<Self, ScanError> {
        if start.is_ipv4() != end.is_ipv4() || start > end {
            return Err(ScanError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse both bounds from their textual form.
    pub fn parse(start: &str, end: &str) -> Result<Self, ScanError> {
        let start: IpAddr = start
            .trim()
            .parse()
            .map_err(|_| ScanError::InvalidAddress(start.to_string()))?;
        let end: IpAddr = end
            .trim()
            .parse()
            .map_err(|_| ScanError::InvalidAddress(end.to_string()))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> IpAddr {
        self.start
    }

    pub fn end(&self) -> IpAddr {
        self.end
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        ip.is_ipv4() == self.start.is_ipv4() && ip >= self.start && ip <= self.end
    }

    pub fn iter(&self) -> AddressIter {
        AddressIter {
            next: Some(self.start),
            end: self.end,
        }
    }
}

impl IntoIterator for &AddressRange {
    type Item = IpAddr;
    type IntoIter = AddressIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over an [`AddressRange`].
#[derive(Debug, Clone)]
pub struct AddressIter {
    next: Option<IpAddr>,
    end: IpAddr,
}

impl Iterator for AddressIter {
    type Item = IpAddr;

    fn next(&mut self) -> Option<IpAddr> {
        let current = self.next?;
        if current > self.end {
            self.next = None;
            return None;
        }
        self.next = if current == self.end {
            None
        } else {
            next_address(current)
        };
        Some(current)
    }
}
