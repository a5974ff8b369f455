//! REST API client for the OCR service.
//!
//! Wraps the OCR service HTTP API (document submission, status retrieval,
//! job deletion) using [`reqwest`], and implements the collaborator traits
//! from [`crate::source`] on top of it.

use ocrflow_core::job::JobState;
use ocrflow_core::types::JobId;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

use crate::source::{
    DocumentSubmitter, OcrError, ResourceStore, StatusSource, StoreError, SubmittedDocument,
};
use crate::wire::StatusResponse;

/// HTTP client for the OCR service.
#[derive(Debug, Clone)]
pub struct OcrApi {
    client: reqwest::Client,
    api_url: String,
}

impl OcrApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8100`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// Upload a PDF for conversion.
    ///
    /// Sends `POST /jobs` as multipart with the `job_id` text field and the
    /// document bytes in `file`.
    pub async fn submit(&self, job_id: JobId, document: &SubmittedDocument) -> Result<(), OcrError> {
        let bytes = tokio::fs::read(&document.path).await?;
        let file = Part::bytes(bytes)
            .file_name(document.name.clone())
            .mime_str("application/pdf")?;
        let form = Form::new()
            .text("job_id", job_id.to_string())
            .part("file", file);

        let response = self
            .client
            .post(format!("{}/jobs", self.api_url))
            .multipart(form)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Retrieve the current status snapshot of a job.
    ///
    /// Sends `GET /jobs/{id}` and maps the loose payload to a [`JobState`].
    pub async fn status(&self, job_id: JobId) -> Result<JobState, OcrError> {
        let response = self
            .client
            .get(format!("{}/jobs/{}", self.api_url, job_id))
            .send()
            .await?;

        let body: StatusResponse = Self::parse_response(response).await?;
        JobState::try_from(body)
    }

    /// Delete a job and its artifacts on the service.
    ///
    /// Sends `DELETE /jobs/{id}`. A 404 means it is already gone and is
    /// treated as success.
    pub async fn delete(&self, job_id: JobId) -> Result<(), OcrError> {
        let response = self
            .client
            .delete(format!("{}/jobs/{}", self.api_url, job_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(%job_id, "OCR job already deleted");
            return Ok(());
        }
        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`OcrError::Api`] containing
    /// the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, OcrError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(OcrError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, OcrError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), OcrError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StatusSource for OcrApi {
    async fn fetch_status(&self, job_id: JobId) -> Result<JobState, OcrError> {
        self.status(job_id).await
    }
}

#[async_trait::async_trait]
impl ResourceStore for OcrApi {
    async fn delete_resource(&self, job_id: JobId) -> Result<(), StoreError> {
        Ok(self.delete(job_id).await?)
    }
}

#[async_trait::async_trait]
impl DocumentSubmitter for OcrApi {
    async fn submit_document(
        &self,
        job_id: JobId,
        document: &SubmittedDocument,
    ) -> Result<(), OcrError> {
        self.submit(job_id, document).await
    }
}
