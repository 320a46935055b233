//! Endpoint Prober Port
//!
//! Defines the interface for checking whether an address serves a port.

use crate::domain::entities::PortSpec;
use crate::domain::value_objects::Protocol;
use async_trait::async_trait;
use std::net::IpAddr;

/// Result of one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub reachable: bool,
    /// Protocol the attempt was made with
    pub protocol: Protocol,
    /// Base domain learned from the peer certificate, if any
    pub inferred_domain: Option<String>,
}

impl ProbeOutcome {
    pub fn unreachable(protocol: Protocol) -> Self {
        Self {
            reachable: false,
            protocol,
            inferred_domain: None,
        }
    }

    pub fn reachable(protocol: Protocol, inferred_domain: Option<String>) -> Self {
        Self {
            reachable: true,
            protocol,
            inferred_domain,
        }
    }
}

/// Probes a single (address, port) pair.
///
/// Failures never propagate: an unreachable endpoint is reported through
/// [`ProbeOutcome::reachable`].
#[async_trait]
pub trait EndpointProber: Send + Sync {
    async fn probe(&self, address: IpAddr, port: &PortSpec) -> ProbeOutcome;
}
