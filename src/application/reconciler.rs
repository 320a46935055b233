//! Reconciler - main application use case
//!
//! One reconciliation pass scans the static ranges, resolves pending job
//! VIPs, rebuilds the routing model and pushes a new HAProxy configuration
//! when the set of routed domains changed.

use crate::adapters::outbound::TargetStore;
use crate::application::ARecordChecker;
use crate::domain::entities::{MonitorRange, RoutingModel};
use crate::domain::errors::{RenderError, StoreError};
use crate::domain::ports::ConfigStore;
use crate::domain::services::{ChangeDetector, ConfigRenderer, ModelBuilder};
use crate::infrastructure::{RangeScanner, ShutdownController};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A pass that failed before its configuration was applied.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The routed domains are the ones already applied.
    Unchanged,
    /// A new configuration was applied.
    Applied { hash: String, domains: Vec<String> },
}

/// Reconciliation service.
pub struct Reconciler {
    store: Arc<TargetStore>,
    scanner: RangeScanner,
    checker: ARecordChecker,
    builder: ModelBuilder,
    config_store: Arc<dyn ConfigStore>,
    static_ranges: Vec<MonitorRange>,
    last_applied: Mutex<Option<RoutingModel>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<TargetStore>,
        scanner: RangeScanner,
        checker: ARecordChecker,
        builder: ModelBuilder,
        config_store: Arc<dyn ConfigStore>,
        static_ranges: Vec<MonitorRange>,
    ) -> Self {
        Self {
            store,
            scanner,
            checker,
            builder,
            config_store,
            static_ranges,
            last_applied: Mutex::new(None),
        }
    }

    /// The model most recently applied, if any.
    pub fn last_applied(&self) -> Option<RoutingModel> {
        self.last_applied.lock().clone()
    }

    /// Run one pass.
    ///
    /// Render and store failures leave the last applied model untouched so
    /// the next pass retries.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome, ReconcileError> {
        let scanned = self.scanner.scan_all(&self.static_ranges).await;
        let resolved = self.checker.check().await;
        if resolved > 0 {
            tracing::debug!("resolved {} job VIPs", resolved);
        }

        let model = self
            .store
            .with_lock(|records| self.builder.build(records.values(), scanned));

        if !ChangeDetector::has_changed(self.last_applied.lock().as_ref(), &model) {
            tracing::debug!("routing unchanged ({} domains)", model.ranges.len());
            return Ok(ReconcileOutcome::Unchanged);
        }

        if let Some(previous) = self.last_applied.lock().as_ref() {
            let diff = ChangeDetector::diff(previous, &model);
            tracing::info!("domains added {:?}, removed {:?}", diff.added, diff.removed);
        }

        let rendered = ConfigRenderer::render(&model)?;
        self.config_store
            .apply(&rendered.content, &rendered.hash)
            .await?;

        let domains: Vec<String> = model
            .base_domains()
            .into_iter()
            .map(str::to_string)
            .collect();
        tracing::info!(
            "applied haproxy configuration for {} domains (hash {})",
            domains.len(),
            rendered.hash.get(..16).unwrap_or(&rendered.hash)
        );

        self.store.with_lock(|_| {
            *self.last_applied.lock() = Some(model);
        });

        Ok(ReconcileOutcome::Applied {
            hash: rendered.hash,
            domains,
        })
    }

    /// Reconcile every `interval` until shutdown. Failed passes are logged
    /// and retried on the next tick.
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: ShutdownController) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.cancelled() => break,
            }

            if let Err(e) = self.reconcile().await {
                tracing::warn!("reconcile failed: {}", e);
            }
        }

        tracing::info!("reconciler stopped");
    }
}
