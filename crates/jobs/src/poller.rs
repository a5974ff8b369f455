//! Per-job status polling.
//!
//! A [`JobPoller`] fetches the job's status on a fixed interval and writes
//! each snapshot into the registry until the job is terminal, removed, or
//! the transport has failed too many times in a row.
//!
//! At most one fetch is in flight at any moment. Ticks that fire while a
//! fetch is outstanding are skipped, not queued. The in-flight fetch is
//! dropped as soon as the job is removed or the poller is stopped, so a
//! late response can never reach the registry.
//!
//! [`PollerSupervisor`] owns the running pollers, one per job id.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use ocrflow_core::config::{LifecycleConfig, MIN_TICK_INTERVAL};
use ocrflow_core::job::{JobState, JobStatus, UpdateRejection};
use ocrflow_core::types::JobId;
use ocrflow_ocr::{OcrError, StatusSource};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::registry::{JobRegistry, RegistryError, UpdateOutcome};

/// Polling knobs, taken from [`LifecycleConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_retries: u32,
    pub fetch_timeout: Duration,
}

impl From<&LifecycleConfig> for PollConfig {
    fn from(config: &LifecycleConfig) -> Self {
        Self {
            interval: config.poll_interval,
            max_retries: config.max_fetch_retries,
            fetch_timeout: config.fetch_timeout,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from(&LifecycleConfig::default())
    }
}

/// A single failed fetch attempt.
#[derive(Debug, thiserror::Error)]
pub enum FetchFailure {
    #[error(transparent)]
    Source(#[from] OcrError),

    #[error("status fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Why a poller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The job reached a terminal status.
    Finished(JobStatus),
    /// Consecutive fetch failures hit the ceiling; the job was failed.
    RetriesExhausted,
    /// The job left the registry.
    Removed,
    /// The poller was stopped without the job being removed.
    Stopped,
    /// The polling task panicked; the job was failed.
    Panicked,
}

/// Summary returned when a poller exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollExit {
    pub reason: ExitReason,
    /// Fetches started over the poller's lifetime.
    pub fetches: u32,
    /// Ticks skipped because a fetch was still outstanding.
    pub skipped_ticks: u32,
}

#[derive(Debug, Default)]
struct PollState {
    retry_count: u32,
    fetches: u32,
    skipped_ticks: u32,
}

type InFlight = BoxFuture<'static, Result<JobState, FetchFailure>>;

/// Polls one job until it no longer needs polling.
pub struct JobPoller {
    job_id: JobId,
    registry: Arc<JobRegistry>,
    source: Arc<dyn StatusSource>,
    config: PollConfig,
    removed: CancellationToken,
    stop: CancellationToken,
}

impl JobPoller {
    /// Build a poller for `job_id`.
    ///
    /// `removed` is the registry's removal token for the job; `stop` lets the
    /// owner end the loop without removing the job.
    pub fn new(
        job_id: JobId,
        registry: Arc<JobRegistry>,
        source: Arc<dyn StatusSource>,
        config: PollConfig,
        removed: CancellationToken,
        stop: CancellationToken,
    ) -> Self {
        Self {
            job_id,
            registry,
            source,
            config,
            removed,
            stop,
        }
    }

    pub async fn run(self) -> PollExit {
        let mut state = PollState::default();
        let mut in_flight: Option<InFlight> = None;

        // The first tick completes immediately, so the first fetch starts
        // without waiting a full interval.
        let mut ticker = tokio::time::interval(self.config.interval.max(MIN_TICK_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.removed.cancelled() => {
                    return self.exit(ExitReason::Removed, &state);
                }
                _ = self.stop.cancelled() => {
                    return self.exit(ExitReason::Stopped, &state);
                }
                result = wait_in_flight(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    if let Some(reason) = self.handle_result(result, &mut state).await {
                        return self.exit(reason, &state);
                    }
                }
                _ = ticker.tick() => {
                    if in_flight.is_some() {
                        state.skipped_ticks += 1;
                        tracing::trace!(job_id = %self.job_id, "Fetch still in flight, skipping tick");
                        continue;
                    }
                    state.fetches += 1;
                    in_flight = Some(self.start_fetch());
                }
            }
        }
    }

    fn start_fetch(&self) -> InFlight {
        let source = Arc::clone(&self.source);
        let job_id = self.job_id;
        let timeout = self.config.fetch_timeout;
        Box::pin(async move {
            match tokio::time::timeout(timeout, source.fetch_status(job_id)).await {
                Ok(result) => result.map_err(FetchFailure::from),
                Err(_) => Err(FetchFailure::Timeout(timeout)),
            }
        })
    }

    /// Process a completed fetch. Returns `Some` when polling should end.
    async fn handle_result(
        &self,
        result: Result<JobState, FetchFailure>,
        state: &mut PollState,
    ) -> Option<ExitReason> {
        match result {
            Ok(snapshot) => {
                state.retry_count = 0;
                if let Some(reason) = self.cancelled_reason() {
                    return Some(reason);
                }
                self.write(snapshot).await
            }
            Err(failure) => {
                state.retry_count += 1;
                if state.retry_count < self.config.max_retries {
                    tracing::warn!(
                        job_id = %self.job_id,
                        attempt = state.retry_count,
                        max_retries = self.config.max_retries,
                        error = %failure,
                        "Status fetch failed, will retry",
                    );
                    return None;
                }

                tracing::error!(
                    job_id = %self.job_id,
                    attempts = state.retry_count,
                    error = %failure,
                    "Status fetch retries exhausted, failing job",
                );
                if let Some(reason) = self.cancelled_reason() {
                    return Some(reason);
                }
                let failed = JobState::failed(format!("transport failure: {failure}"));
                match self.registry.update(self.job_id, failed).await {
                    Err(RegistryError::NotFound(_)) => Some(ExitReason::Removed),
                    // Already terminal through another path; nothing to fail.
                    Ok(UpdateOutcome::Ignored(UpdateRejection::AlreadyTerminal { status })) => {
                        Some(ExitReason::Finished(status))
                    }
                    _ => Some(ExitReason::RetriesExhausted),
                }
            }
        }
    }

    async fn write(&self, snapshot: JobState) -> Option<ExitReason> {
        match self.registry.update(self.job_id, snapshot).await {
            Ok(UpdateOutcome::Applied(job)) if job.state.is_terminal() => {
                Some(ExitReason::Finished(job.status()))
            }
            Ok(UpdateOutcome::Applied(_)) => None,
            Ok(UpdateOutcome::Ignored(UpdateRejection::AlreadyTerminal { status })) => {
                Some(ExitReason::Finished(status))
            }
            Ok(UpdateOutcome::Ignored(UpdateRejection::ProgressRegression { .. })) => None,
            Err(RegistryError::NotFound(_)) => Some(ExitReason::Removed),
            Err(e) => {
                tracing::error!(job_id = %self.job_id, error = %e, "Unexpected registry error");
                Some(ExitReason::Stopped)
            }
        }
    }

    fn cancelled_reason(&self) -> Option<ExitReason> {
        if self.removed.is_cancelled() {
            Some(ExitReason::Removed)
        } else if self.stop.is_cancelled() {
            Some(ExitReason::Stopped)
        } else {
            None
        }
    }

    fn exit(&self, reason: ExitReason, state: &PollState) -> PollExit {
        tracing::debug!(
            job_id = %self.job_id,
            ?reason,
            fetches = state.fetches,
            skipped_ticks = state.skipped_ticks,
            "Poller exited",
        );
        PollExit {
            reason,
            fetches: state.fetches,
            skipped_ticks: state.skipped_ticks,
        }
    }
}

async fn wait_in_flight(in_flight: &mut Option<InFlight>) -> Result<JobState, FetchFailure> {
    match in_flight {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

struct ManagedPoller {
    generation: u64,
    task_handle: tokio::task::JoinHandle<PollExit>,
    /// Per-job stop token (child of the master token).
    cancel: CancellationToken,
}

/// Owns one polling task per processing job.
///
/// Created once at startup via [`PollerSupervisor::new`]; the returned `Arc`
/// is cloned into the lifecycle facade and application state.
pub struct PollerSupervisor {
    pollers: RwLock<HashMap<JobId, ManagedPoller>>,
    registry: Arc<JobRegistry>,
    source: Arc<dyn StatusSource>,
    config: PollConfig,
    next_generation: AtomicU64,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
}

impl PollerSupervisor {
    pub fn new(
        registry: Arc<JobRegistry>,
        source: Arc<dyn StatusSource>,
        config: PollConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            pollers: RwLock::new(HashMap::new()),
            registry,
            source,
            config,
            next_generation: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        })
    }

    /// Start polling `job_id`.
    ///
    /// Returns `false` without spawning when the job is unknown, already
    /// terminal, already being polled, or the supervisor is shut down.
    pub async fn spawn(self: &Arc<Self>, job_id: JobId) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let Some(removed) = self.registry.removal_token(job_id).await else {
            return false;
        };
        match self.registry.get(job_id).await {
            Some(job) if !job.state.is_terminal() => {}
            _ => return false,
        }

        // Held across spawn and insert so the task's own cleanup cannot run
        // before its entry exists.
        let mut pollers = self.pollers.write().await;
        if pollers.contains_key(&job_id) {
            return false;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let stop = self.cancel.child_token();
        let poller = JobPoller::new(
            job_id,
            Arc::clone(&self.registry),
            Arc::clone(&self.source),
            self.config,
            removed,
            stop.clone(),
        );
        let supervisor = Arc::clone(self);

        let task_handle = tokio::spawn(async move {
            tracing::info!(%job_id, "Starting status poller");
            let exit = match AssertUnwindSafe(poller.run()).catch_unwind().await {
                Ok(exit) => exit,
                Err(_) => supervisor.fail_crashed(job_id).await,
            };
            supervisor.forget(job_id, generation).await;
            exit
        });

        pollers.insert(
            job_id,
            ManagedPoller {
                generation,
                task_handle,
                cancel: stop,
            },
        );
        true
    }

    pub async fn is_polling(&self, job_id: JobId) -> bool {
        self.pollers.read().await.contains_key(&job_id)
    }

    pub async fn active_count(&self) -> usize {
        self.pollers.read().await.len()
    }

    /// Stop polling `job_id` without touching the registry.
    pub async fn stop(&self, job_id: JobId) -> Option<PollExit> {
        let managed = self.pollers.write().await.remove(&job_id)?;
        managed.cancel.cancel();
        managed.task_handle.await.ok()
    }

    /// Gracefully shut down all polling tasks.
    ///
    /// Cancels the master token, then waits up to 5 seconds per task
    /// for a clean exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down status pollers");
        self.cancel.cancel();

        let drained: Vec<(JobId, ManagedPoller)> = self.pollers.write().await.drain().collect();
        for (job_id, managed) in drained {
            tracing::debug!(%job_id, "Stopping status poller");
            managed.cancel.cancel();
            let _ = tokio::time::timeout(Duration::from_secs(5), managed.task_handle).await;
        }

        tracing::info!("Status pollers shut down");
    }

    /// A panicked poller leaves no task behind, so the job cannot stay in
    /// `processing`.
    async fn fail_crashed(&self, job_id: JobId) -> PollExit {
        tracing::error!(%job_id, "Status poller panicked, failing job");
        if let Err(e) = self
            .registry
            .update(job_id, JobState::failed("status polling stopped unexpectedly"))
            .await
        {
            tracing::debug!(%job_id, error = %e, "Crashed poller's job already gone");
        }
        PollExit {
            reason: ExitReason::Panicked,
            fetches: 0,
            skipped_ticks: 0,
        }
    }

    async fn forget(&self, job_id: JobId, generation: u64) {
        let mut pollers = self.pollers.write().await;
        if pollers
            .get(&job_id)
            .is_some_and(|managed| managed.generation == generation)
        {
            pollers.remove(&job_id);
        }
    }
}
