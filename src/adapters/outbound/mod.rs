mod file_config_store;
mod memory_config_store;
mod system_resolver;
mod target_store;

pub use file_config_store::FileConfigStore;
pub use memory_config_store::{AppliedConfig, MemoryConfigStore};
pub use system_resolver::SystemHostResolver;
pub use target_store::{TargetMap, TargetStore};
