//! Pod Event Listener
//!
//! Applies pod lifecycle events to the target store. Events arrive over an
//! mpsc channel; any watcher (cluster informer, stdin feed, tests) can be
//! the producer.

use crate::adapters::outbound::TargetStore;
use crate::infrastructure::ShutdownController;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Default namespace prefix of CI jobs.
pub const DEFAULT_NAMESPACE_PREFIX: &str = "ci-ln-";
/// Default pod env var carrying the job identifier.
pub const DEFAULT_JOB_HASH_ENV: &str = "JOB_NAME_HASH";

/// Pod lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PodEvent {
    /// A pod was added or updated. `env` holds its container env vars.
    Observed {
        namespace: String,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// A namespace was deleted.
    NamespaceDeleted { namespace: String },
}

/// Inbound adapter translating pod events into store updates.
pub struct PodEventListener {
    store: Arc<TargetStore>,
    namespace_prefix: String,
    job_hash_env: String,
}

impl PodEventListener {
    pub fn new(store: Arc<TargetStore>) -> Self {
        Self {
            store,
            namespace_prefix: DEFAULT_NAMESPACE_PREFIX.to_string(),
            job_hash_env: DEFAULT_JOB_HASH_ENV.to_string(),
        }
    }

    pub fn with_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    pub fn with_job_hash_env(mut self, name: impl Into<String>) -> Self {
        self.job_hash_env = name.into();
        self
    }

    /// Apply one event. Returns true if the store changed.
    pub fn handle(&self, event: PodEvent) -> bool {
        match event {
            PodEvent::Observed { namespace, env } => {
                if !namespace.starts_with(&self.namespace_prefix) {
                    return false;
                }
                match env.get(&self.job_hash_env).filter(|v| !v.is_empty()) {
                    Some(job_id) => self.store.record_pod_observation(&namespace, job_id),
                    None => {
                        tracing::debug!(
                            "pod in {} has no {}, ignoring",
                            namespace,
                            self.job_hash_env
                        );
                        false
                    }
                }
            }
            PodEvent::NamespaceDeleted { namespace } => {
                self.store.remove_namespace(&namespace) > 0
            }
        }
    }

    /// Consume events until the channel closes or shutdown is signalled.
    pub async fn run(&self, mut events: mpsc::Receiver<PodEvent>, shutdown: ShutdownController) {
        tracing::info!(
            "watching pods in namespaces {}* (job env {})",
            self.namespace_prefix,
            self.job_hash_env
        );

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle(event);
                    }
                    None => {
                        tracing::info!("pod event source closed");
                        break;
                    }
                },
                _ = shutdown.cancelled() => break,
            }
        }
    }
}

/// Read JSON-lines pod events from `reader` and forward them to `tx`.
///
/// Malformed lines, including ones that are not UTF-8, are logged and
/// skipped. Returns when the reader hits EOF or the receiver is dropped.
pub async fn forward_json_lines<R>(mut reader: R, tx: mpsc::Sender<PodEvent>) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                tracing::warn!("skipping pod event line that is not UTF-8: {}", e);
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<PodEvent>(line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!("invalid pod event {:?}: {}", line, e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn observed(namespace: &str, job: Option<&str>) -> PodEvent {
        let mut env = HashMap::new();
        if let Some(job) = job {
            env.insert(DEFAULT_JOB_HASH_ENV.to_string(), job.to_string());
        }
        PodEvent::Observed {
            namespace: namespace.to_string(),
            env,
        }
    }

    #[test]
    fn test_handle_observed() {
        let store = Arc::new(TargetStore::new());
        let listener = PodEventListener::new(store.clone());

        assert!(listener.handle(observed("ci-ln-abc", Some("h1"))));
        assert!(!listener.handle(observed("ci-ln-abc", Some("h1"))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_handle_filters_namespace() {
        let store = Arc::new(TargetStore::new());
        let listener = PodEventListener::new(store.clone());

        assert!(!listener.handle(observed("kube-system", Some("h1"))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_handle_missing_job_env() {
        let store = Arc::new(TargetStore::new());
        let listener = PodEventListener::new(store.clone());

        assert!(!listener.handle(observed("ci-ln-abc", None)));
        assert!(!listener.handle(observed("ci-ln-abc", Some(""))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_handle_namespace_deleted() {
        let store = Arc::new(TargetStore::new());
        let listener = PodEventListener::new(store.clone());
        listener.handle(observed("ci-ln-abc", Some("h1")));

        let deleted = PodEvent::NamespaceDeleted {
            namespace: "ci-ln-abc".to_string(),
        };
        assert!(listener.handle(deleted.clone()));
        assert!(!listener.handle(deleted));
        assert!(store.is_empty());
    }

    #[test]
    fn test_custom_filter() {
        let store = Arc::new(TargetStore::new());
        let listener = PodEventListener::new(store.clone())
            .with_namespace_prefix("dev-")
            .with_job_hash_env("BUILD_ID");

        let mut env = HashMap::new();
        env.insert("BUILD_ID".to_string(), "b7".to_string());
        assert!(listener.handle(PodEvent::Observed {
            namespace: "dev-1".to_string(),
            env,
        }));
        assert!(!listener.handle(observed("ci-ln-abc", Some("h1"))));
    }

    #[test]
    fn test_event_json() {
        let event: PodEvent = serde_json::from_str(
            r#"{"type":"observed","namespace":"ci-ln-a","env":{"JOB_NAME_HASH":"h1"}}"#,
        )
        .unwrap();
        assert_eq!(event, observed("ci-ln-a", Some("h1")));

        let event: PodEvent =
            serde_json::from_str(r#"{"type":"namespace-deleted","namespace":"ci-ln-a"}"#).unwrap();
        assert_eq!(
            event,
            PodEvent::NamespaceDeleted {
                namespace: "ci-ln-a".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_run_until_channel_closed() {
        let store = Arc::new(TargetStore::new());
        let listener = PodEventListener::new(store.clone());
        let (tx, rx) = mpsc::channel(8);

        tx.send(observed("ci-ln-a", Some("h1"))).await.unwrap();
        tx.send(observed("ci-ln-b", Some("h2"))).await.unwrap();
        drop(tx);

        listener.run(rx, ShutdownController::new()).await;
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(TargetStore::new());
        let listener = PodEventListener::new(store);
        let (_tx, rx) = mpsc::channel(8);
        let shutdown = ShutdownController::new();
        shutdown.shutdown();

        let result =
            tokio::time::timeout(Duration::from_millis(200), listener.run(rx, shutdown)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_forward_json_lines() {
        let input = concat!(
            "{\"type\":\"observed\",\"namespace\":\"ci-ln-a\",\"env\":{\"JOB_NAME_HASH\":\"h1\"}}\n",
            "not json\n",
            "\n",
            "{\"type\":\"namespace-deleted\",\"namespace\":\"ci-ln-b\"}\n",
        );
        let (tx, mut rx) = mpsc::channel(8);

        forward_json_lines(input.as_bytes(), tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(observed("ci-ln-a", Some("h1"))));
        assert!(matches!(
            rx.recv().await,
            Some(PodEvent::NamespaceDeleted { .. })
        ));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_forward_json_lines_skips_invalid_utf8() {
        let mut input = Vec::new();
        input.extend_from_slice(
            b"{\"type\":\"observed\",\"namespace\":\"ci-ln-a\",\"env\":{\"JOB_NAME_HASH\":\"h1\"}}\n",
        );
        input.extend_from_slice(b"\xff\xfe garbage\n");
        input.extend_from_slice(b"{\"type\":\"namespace-deleted\",\"namespace\":\"ci-ln-b\"}");
        let (tx, mut rx) = mpsc::channel(8);

        forward_json_lines(input.as_slice(), tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(observed("ci-ln-a", Some("h1"))));
        assert_eq!(
            rx.recv().await,
            Some(PodEvent::NamespaceDeleted {
                namespace: "ci-ln-b".to_string()
            })
        );
        assert_eq!(rx.recv().await, None);
    }
}
