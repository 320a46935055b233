//! haproxy-dyna Library
//!
//! Discovers CI cluster endpoints (by TLS probing of static address ranges
//! and by DNS lookups for jobs seen in pod events) and renders them into a
//! SNI-routing HAProxy configuration.
//!
//! This module exposes the components for use in integration tests and as a
//! library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::{PodEvent, PodEventListener};
pub use adapters::outbound::{FileConfigStore, MemoryConfigStore, SystemHostResolver, TargetStore};
pub use application::{ARecordChecker, ReconcileError, ReconcileOutcome, Reconciler};
pub use config::{load_config, MonitorConfig};
pub use domain::entities::{MonitorRange, PortSpec, RoutingModel, TargetRecord};
pub use domain::ports::{ConfigStore, EndpointProber, HostResolver};
pub use domain::services::{ChangeDetector, ConfigRenderer, ModelBuilder};
pub use infrastructure::{EndpointProbe, RangeScanner, ScanConfig, ShutdownController};
