//! Authoritative in-memory store of conversion jobs.
//!
//! [`JobRegistry`] owns every [`Job`] record. Callers only ever receive
//! clones. Each mutation runs inside a single write-lock critical section
//! and publishes its [`JobEvent`] before the lock is released, so observers
//! see events in mutation order.
//!
//! Every entry carries a removal [`CancellationToken`]. [`JobRegistry::remove`]
//! cancels it; pollers and the view driver watch that token instead of
//! polling for presence.

use std::collections::HashMap;
use std::sync::Arc;

use ocrflow_core::error::CoreError;
use ocrflow_core::job::{Job, JobResult, JobState, JobStatus, UpdateRejection};
use ocrflow_core::types::{JobId, Timestamp};
use ocrflow_events::{EventBus, JobEvent, JobEventKind, RemovalReason};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Contract violations reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Job {0} is already registered")]
    DuplicateId(JobId),

    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {id} is {status}, not completed")]
    NotCompleted { id: JobId, status: JobStatus },
}

impl From<RegistryError> for CoreError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => CoreError::NotFound { entity: "Job", id },
            RegistryError::DuplicateId(_) | RegistryError::NotCompleted { .. } => {
                CoreError::Conflict(err.to_string())
            }
        }
    }
}

/// Result of [`JobRegistry::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The snapshot was stored; carries the job after the update.
    Applied(Job),
    /// The snapshot was dropped without changing the record.
    Ignored(UpdateRejection),
}

struct Entry {
    job: Job,
    removed: CancellationToken,
}

/// Shared job store. Wrap in `Arc` and inject into every component.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Entry>>,
    events: Arc<EventBus>,
}

impl JobRegistry {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Insert a new job. Fails if the id is already present.
    pub async fn register(&self, job: Job) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(RegistryError::DuplicateId(job.id));
        }

        let id = job.id;
        jobs.insert(
            id,
            Entry {
                job,
                removed: CancellationToken::new(),
            },
        );
        self.events.publish(JobEvent::new(id, JobEventKind::Registered));
        tracing::debug!(job_id = %id, "Job registered");
        Ok(())
    }

    /// Apply a status snapshot to a job.
    ///
    /// Snapshots for terminal jobs and snapshots that would lower progress
    /// are ignored and reported as [`UpdateOutcome::Ignored`].
    pub async fn update(&self, id: JobId, state: JobState) -> Result<UpdateOutcome, RegistryError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;

        if let Err(rejection) = entry.job.apply(state) {
            tracing::debug!(job_id = %id, %rejection, "Ignoring job update");
            return Ok(UpdateOutcome::Ignored(rejection));
        }

        let kind = match &entry.job.state {
            JobState::Processing {
                progress,
                progress_message,
            } => JobEventKind::Progress {
                progress: *progress,
                message: progress_message.clone(),
            },
            JobState::Completed { .. } => JobEventKind::Completed,
            JobState::Failed { reason } => JobEventKind::Failed {
                reason: reason.clone(),
            },
        };
        if entry.job.state.is_terminal() {
            tracing::info!(job_id = %id, status = %entry.job.status(), "Job reached terminal state");
        }
        self.events.publish(JobEvent::new(id, kind));

        Ok(UpdateOutcome::Applied(entry.job.clone()))
    }

    /// Edit the result of a completed job in place (e.g. user corrections).
    ///
    /// Status and progress are untouched.
    pub async fn edit_result<F>(&self, id: JobId, edit: F) -> Result<Job, RegistryError>
    where
        F: FnOnce(&mut JobResult),
    {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        match &mut entry.job.state {
            JobState::Completed { result } => {
                edit(result);
                Ok(entry.job.clone())
            }
            other => Err(RegistryError::NotCompleted {
                id,
                status: other.status(),
            }),
        }
    }

    pub async fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.read().await.get(&id).map(|e| e.job.clone())
    }

    pub async fn contains(&self, id: JobId) -> bool {
        self.jobs.read().await.contains_key(&id)
    }

    /// Snapshot of all jobs, oldest first.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .map(|e| e.job.clone())
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        jobs
    }

    /// Ids of jobs whose retention window has passed at `now`.
    pub async fn expired_ids(&self, now: Timestamp) -> Vec<JobId> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|e| e.job.is_expired(now))
            .map(|e| e.job.id)
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Number of jobs still processing.
    pub async fn processing_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|e| !e.job.state.is_terminal())
            .count()
    }

    /// Token cancelled when the job leaves the registry.
    ///
    /// `None` if the job is not (or no longer) registered.
    pub async fn removal_token(&self, id: JobId) -> Option<CancellationToken> {
        self.jobs.read().await.get(&id).map(|e| e.removed.clone())
    }

    /// Remove a job. Removing an absent id is not an error.
    ///
    /// Returns the removed record, if there was one.
    pub async fn remove(&self, id: JobId, reason: RemovalReason) -> Option<Job> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.remove(&id)?;
        entry.removed.cancel();
        self.events
            .publish(JobEvent::new(id, JobEventKind::Removed { reason }));
        tracing::info!(job_id = %id, %reason, "Job removed");
        Some(entry.job)
    }
}
