mod config_store;
mod endpoint_prober;
mod host_resolver;

pub use config_store::ConfigStore;
pub use endpoint_prober::{EndpointProber, ProbeOutcome};
pub use host_resolver::HostResolver;
