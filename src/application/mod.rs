//! Application Layer
//!
//! Use cases orchestrating the domain services through the ports.

mod a_record_checker;
mod reconciler;

pub use a_record_checker::{api_int_host, ARecordChecker, DEFAULT_INTERNAL_PREFIX};
pub use reconciler::{ReconcileError, ReconcileOutcome, Reconciler};
