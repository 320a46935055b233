//! haproxy-dyna - dynamic HAProxy configuration for CI clusters
//!
//! This is the composition root that wires together all the components.

use haproxy_dyna::adapters::inbound::{forward_json_lines, PodEventListener};
use haproxy_dyna::adapters::outbound::{FileConfigStore, SystemHostResolver, TargetStore};
use haproxy_dyna::application::{ARecordChecker, Reconciler};
use haproxy_dyna::config::load_config;
use haproxy_dyna::domain::services::ModelBuilder;
use haproxy_dyna::infrastructure::{shutdown_signal, EndpointProbe, RangeScanner, ShutdownController};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from file and environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting haproxy-dyna base_domain={} ranges={} output={}",
        cfg.base_domain,
        cfg.monitor_ranges.len(),
        cfg.output_path
    );

    // ===== COMPOSITION ROOT =====

    let shutdown = ShutdownController::new();

    // 1. Outbound adapters
    let store = Arc::new(TargetStore::new());
    let resolver = Arc::new(SystemHostResolver::new(cfg.resolve_timeout()));
    let config_store = Arc::new(FileConfigStore::new(&cfg.output_path));
    let prober = Arc::new(EndpointProbe::new(cfg.check_timeout(), shutdown.clone())?);

    // 2. Application services
    let scanner = RangeScanner::new(prober, cfg.scan_config());
    let checker = ARecordChecker::new(store.clone(), resolver, &cfg.base_domain)
        .with_internal_prefix(&cfg.internal_prefix);
    let builder = ModelBuilder::new(&cfg.base_domain, &cfg.haproxy_header);
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        scanner,
        checker,
        builder,
        config_store,
        cfg.monitor_ranges.clone(),
    ));

    // 3. Inbound adapter: JSON-lines pod events on stdin
    let listener = PodEventListener::new(store)
        .with_namespace_prefix(&cfg.namespace_prefix)
        .with_job_hash_env(&cfg.job_hash_env);
    let (events_tx, events_rx) = mpsc::channel(256);

    tokio::spawn(async move {
        if let Err(e) = forward_json_lines(BufReader::new(tokio::io::stdin()), events_tx).await {
            tracing::error!("pod event feed failed: {}", e);
        }
    });

    let listener_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { listener.run(events_rx, shutdown).await })
    };
    let reconcile_task = tokio::spawn(reconciler.run(cfg.reconcile_interval(), shutdown.clone()));

    shutdown_signal(shutdown.clone()).await;

    if !shutdown.wait_for_drain(Duration::from_secs(5)).await {
        tracing::warn!("exiting with probes still in flight");
    }
    let _ = reconcile_task.await;
    let _ = listener_task.await;

    tracing::info!("shutdown complete");
    Ok(())
}
