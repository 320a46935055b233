mod change_detector;
mod config_renderer;
mod model_builder;

pub use change_detector::{ChangeDetector, DomainDiff};
pub use config_renderer::{content_hash, ConfigRenderer, RenderedConfig, Section, SectionKind};
pub use model_builder::{
    job_base_domain, ModelBuilder, API_MATCH, API_PORT, INGRESS_PORT, INGRESS_PREFIX,
};
