//! Entry points used by the upload, delete and edit paths.
//!
//! [`JobLifecycle`] ties the registry, the poller supervisor and the OCR
//! collaborators together so the HTTP layer never coordinates them itself.

use std::sync::Arc;

use chrono::Utc;
use ocrflow_core::config::LifecycleConfig;
use ocrflow_core::job::{FileMeta, Job, JobState};
use ocrflow_core::types::JobId;
use ocrflow_events::RemovalReason;
use ocrflow_ocr::{DocumentSubmitter, ResourceStore, StoreError, SubmittedDocument};

use crate::poller::PollerSupervisor;
use crate::registry::{JobRegistry, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to delete job resources: {0}")]
    Store(#[from] StoreError),

    #[error("Deleting job resources timed out")]
    StoreTimeout,

    #[error("{0}")]
    Validation(String),
}

pub struct JobLifecycle {
    registry: Arc<JobRegistry>,
    pollers: Arc<PollerSupervisor>,
    store: Arc<dyn ResourceStore>,
    submitter: Arc<dyn DocumentSubmitter>,
    config: LifecycleConfig,
}

impl JobLifecycle {
    pub fn new(
        registry: Arc<JobRegistry>,
        pollers: Arc<PollerSupervisor>,
        store: Arc<dyn ResourceStore>,
        submitter: Arc<dyn DocumentSubmitter>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            registry,
            pollers,
            store,
            submitter,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn pollers(&self) -> &Arc<PollerSupervisor> {
        &self.pollers
    }

    /// Register a freshly uploaded document and start converting it.
    ///
    /// The job starts as `processing` at 0%. If the OCR service refuses the
    /// document the job is failed right away and no poller is started.
    ///
    /// Submission runs on its own task. Dropping the returned future (a
    /// timed-out or disconnected request) still leaves the job either
    /// failed or polled.
    pub async fn create_job(
        &self,
        job_id: JobId,
        meta: FileMeta,
        document: SubmittedDocument,
    ) -> Result<Job, LifecycleError> {
        let job = Job::new(job_id, meta, self.config.retention, Utc::now());
        self.registry.register(job.clone()).await?;

        let handoff = tokio::spawn(start_conversion(
            Arc::clone(&self.registry),
            Arc::clone(&self.pollers),
            Arc::clone(&self.submitter),
            job_id,
            document,
        ));
        if let Err(e) = handoff.await {
            tracing::error!(%job_id, error = %e, "Conversion hand-off task failed");
        }

        Ok(self.registry.get(job_id).await.unwrap_or(job))
    }

    /// Delete a job's backing resources, then remove it from the registry.
    ///
    /// If the backing delete fails the job stays registered.
    pub async fn delete_job(&self, job_id: JobId) -> Result<Job, LifecycleError> {
        let job = self
            .registry
            .get(job_id)
            .await
            .ok_or(RegistryError::NotFound(job_id))?;

        tokio::time::timeout(self.config.delete_timeout, self.store.delete_resource(job_id))
            .await
            .map_err(|_| LifecycleError::StoreTimeout)??;

        Ok(self
            .registry
            .remove(job_id, RemovalReason::Deleted)
            .await
            .unwrap_or(job))
    }

    /// Replace the extracted text of a completed job.
    pub async fn replace_text(&self, job_id: JobId, text: String) -> Result<Job, LifecycleError> {
        Ok(self
            .registry
            .edit_result(job_id, |result| result.replace_text(text))
            .await?)
    }

    /// Replace every occurrence of `selected` with `correction` in the
    /// extracted text of a completed job.
    pub async fn apply_correction(
        &self,
        job_id: JobId,
        selected: &str,
        correction: &str,
    ) -> Result<Job, LifecycleError> {
        if selected.is_empty() {
            return Err(LifecycleError::Validation(
                "selected_text must not be empty".into(),
            ));
        }
        Ok(self
            .registry
            .edit_result(job_id, |result| {
                let corrected = result.text.replace(selected, correction);
                result.replace_text(corrected);
            })
            .await?)
    }
}

/// Submit the document, then either start polling or fail the job.
async fn start_conversion(
    registry: Arc<JobRegistry>,
    pollers: Arc<PollerSupervisor>,
    submitter: Arc<dyn DocumentSubmitter>,
    job_id: JobId,
    document: SubmittedDocument,
) {
    match submitter.submit_document(job_id, &document).await {
        Ok(()) => {
            pollers.spawn(job_id).await;
            tracing::info!(%job_id, name = %document.name, "Conversion job created");
        }
        Err(e) => {
            tracing::error!(%job_id, error = %e, "Failed to submit document for conversion");
            let failed = JobState::failed(format!("submission failed: {e}"));
            if let Err(e) = registry.update(job_id, failed).await {
                tracing::warn!(%job_id, error = %e, "Could not mark unsubmitted job as failed");
            }
        }
    }
}
