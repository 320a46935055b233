//! Infrastructure Layer
//!
//! Network probing, scan scheduling and shutdown coordination.

pub mod endpoint_probe;
pub mod range_scanner;
pub mod shutdown;

pub use endpoint_probe::{certificate_dns_names, EndpointProbe, ProbeError};
pub use range_scanner::{RangeScanner, ScanConfig};
pub use shutdown::{shutdown_signal, InFlightGuard, ShutdownController};
