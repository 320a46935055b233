mod pod_events;

pub use pod_events::{
    forward_json_lines, PodEvent, PodEventListener, DEFAULT_JOB_HASH_ENV,
    DEFAULT_NAMESPACE_PREFIX,
};
