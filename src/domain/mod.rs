//! Domain Layer
//!
//! Routing entities, address primitives and the pure services that turn
//! discovered targets into HAProxy configuration. No I/O happens here.

pub mod entities;
pub mod errors;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{MonitorRange, PortSpec, RoutingModel, TargetRecord};
pub use errors::{RenderError, ResolveError, ScanError, StoreError};
pub use value_objects::{AddressRange, JobKey, Protocol};
