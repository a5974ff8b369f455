//! Feeds registry events into the [`ViewController`].
//!
//! The controller itself is synchronous and never sleeps. This driver
//! subscribes to the event bus, forwards completions, failures and
//! removals, and owns the timer for the auto-advance grace delay.

use std::sync::Arc;
use std::time::Duration;

use ocrflow_core::types::JobId;
use ocrflow_core::view::{CompletionReaction, ViewController};
use ocrflow_events::{JobEvent, JobEventKind};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::registry::JobRegistry;

/// Shared handle to the view state machine.
pub type SharedView = Arc<Mutex<ViewController>>;

#[derive(Clone)]
pub struct ViewDriver {
    view: SharedView,
    registry: Arc<JobRegistry>,
    grace: Duration,
}

impl ViewDriver {
    pub fn new(registry: Arc<JobRegistry>, grace: Duration) -> Self {
        Self {
            view: Arc::new(Mutex::new(ViewController::new())),
            registry,
            grace,
        }
    }

    pub fn view(&self) -> SharedView {
        Arc::clone(&self.view)
    }

    /// Consume events until `cancel` fires or the bus closes.
    ///
    /// Pass a receiver obtained before any job was registered so no
    /// completion is missed.
    pub async fn run(self, mut events: broadcast::Receiver<JobEvent>, cancel: CancellationToken) {
        tracing::info!("View driver started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => self.handle(event, &cancel).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "View driver lagged behind the event bus");
                        self.resync().await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        tracing::info!("View driver stopped");
    }

    async fn handle(&self, event: JobEvent, cancel: &CancellationToken) {
        let job_id = event.job_id;
        match event.kind {
            JobEventKind::Completed => {
                let reaction = self.view.lock().await.on_job_completed(job_id);
                if reaction == CompletionReaction::ScheduleAdvance {
                    self.schedule_advance(job_id, cancel.child_token()).await;
                }
            }
            JobEventKind::Failed { reason } => {
                self.view.lock().await.on_job_failed(job_id, &reason);
            }
            JobEventKind::Removed { reason } => {
                if self.view.lock().await.on_job_removed(job_id) {
                    tracing::info!(%job_id, %reason, "Focused job removed, returning to upload");
                }
            }
            JobEventKind::Registered | JobEventKind::Progress { .. } => {}
        }
    }

    /// Open the editor after the grace delay, unless the job is removed
    /// first.
    async fn schedule_advance(&self, job_id: JobId, cancel: CancellationToken) {
        let Some(removed) = self.registry.removal_token(job_id).await else {
            return;
        };
        let view = Arc::clone(&self.view);
        let grace = self.grace;

        tokio::spawn(async move {
            tokio::select! {
                _ = removed.cancelled() => {}
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(grace) => {
                    if view.lock().await.finish_auto_advance(job_id) {
                        tracing::debug!(%job_id, "Auto-advanced to editor");
                    }
                }
            }
        });
    }

    /// After missing events, drop focus on a job that no longer exists.
    async fn resync(&self) {
        let focused = self.view.lock().await.focused_job();
        if let Some(job_id) = focused {
            if !self.registry.contains(job_id).await {
                self.view.lock().await.on_job_removed(job_id);
            }
        }
    }
}
