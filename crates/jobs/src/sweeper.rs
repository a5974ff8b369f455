//! Periodic eviction of expired jobs.
//!
//! Each sweep collects the jobs whose retention window has passed, deletes
//! their backing resources, and removes them from the registry. A job whose
//! delete fails (or times out) stays registered and is retried on the next
//! sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ocrflow_core::config::{LifecycleConfig, MIN_TICK_INTERVAL};
use ocrflow_core::types::{JobId, Timestamp};
use ocrflow_events::RemovalReason;
use ocrflow_ocr::ResourceStore;
use tokio_util::sync::CancellationToken;

use crate::registry::JobRegistry;

/// Outcome of a single sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: Vec<JobId>,
    /// Expired jobs kept because their backing delete failed.
    pub retained: Vec<JobId>,
}

pub struct EvictionSweeper {
    registry: Arc<JobRegistry>,
    store: Arc<dyn ResourceStore>,
    interval: Duration,
    delete_timeout: Duration,
}

impl EvictionSweeper {
    pub fn new(
        registry: Arc<JobRegistry>,
        store: Arc<dyn ResourceStore>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            registry,
            store,
            interval: config.sweep_interval,
            delete_timeout: config.delete_timeout,
        }
    }

    /// Evict every job that is expired at `now`.
    pub async fn sweep(&self, now: Timestamp) -> SweepReport {
        let mut report = SweepReport::default();

        for job_id in self.registry.expired_ids(now).await {
            match tokio::time::timeout(self.delete_timeout, self.store.delete_resource(job_id))
                .await
            {
                Ok(Ok(())) => {
                    self.registry.remove(job_id, RemovalReason::Expired).await;
                    report.evicted.push(job_id);
                }
                Ok(Err(e)) => {
                    tracing::warn!(%job_id, error = %e, "Eviction delete failed, retrying next sweep");
                    report.retained.push(job_id);
                }
                Err(_) => {
                    tracing::warn!(
                        %job_id,
                        timeout_secs = self.delete_timeout.as_secs(),
                        "Eviction delete timed out, retrying next sweep",
                    );
                    report.retained.push(job_id);
                }
            }
        }

        report
    }

    /// Run the sweep loop until `cancel` is triggered.
    ///
    /// The first sweep runs immediately.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Eviction sweeper started"
        );

        let mut interval = tokio::time::interval(self.interval.max(MIN_TICK_INTERVAL));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Eviction sweeper stopping");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.sweep(Utc::now()).await;
                    if report.evicted.is_empty() && report.retained.is_empty() {
                        tracing::debug!("Eviction sweep: nothing expired");
                    } else {
                        tracing::info!(
                            evicted = report.evicted.len(),
                            retained = report.retained.len(),
                            "Eviction sweep finished",
                        );
                    }
                }
            }
        }
    }
}
