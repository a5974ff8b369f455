//! Collaborator traits consumed by the job lifecycle.
//!
//! All three are object safe and used as `Arc<dyn Trait>` so tests can
//! substitute in-memory fakes.

use std::path::PathBuf;

use ocrflow_core::job::JobState;
use ocrflow_core::types::JobId;

/// Errors from the OCR service layer.
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The OCR service returned a non-2xx status code.
    #[error("OCR API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The status payload could not be mapped to a job state.
    #[error("Invalid status snapshot: {0}")]
    InvalidSnapshot(String),

    /// Reading the document to submit failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from deleting the backing resources of a job.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to delete {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote delete failed: {0}")]
    Remote(#[from] OcrError),
}

/// A stored upload handed to the OCR service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedDocument {
    /// Original file name as uploaded.
    pub name: String,
    /// Where the upload was written on disk.
    pub path: PathBuf,
}

/// Read side of the OCR service: the current state of a job.
///
/// Must be safe to retry; a fetch never changes remote state.
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, job_id: JobId) -> Result<JobState, OcrError>;
}

/// Deletes everything stored for a job.
///
/// Must be idempotent: deleting a job twice is not an error.
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    async fn delete_resource(&self, job_id: JobId) -> Result<(), StoreError>;
}

/// Hands an uploaded document to the OCR service for conversion.
#[async_trait::async_trait]
pub trait DocumentSubmitter: Send + Sync {
    async fn submit_document(
        &self,
        job_id: JobId,
        document: &SubmittedDocument,
    ) -> Result<(), OcrError>;
}
