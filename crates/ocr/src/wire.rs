//! JSON shapes exchanged with the OCR service.
//!
//! The service reports status as a loose record where `result` and `error`
//! are optional regardless of status. [`StatusResponse`] is converted into
//! the tagged [`JobState`] here so inconsistent payloads are rejected at the
//! edge.

use ocrflow_core::job::{JobResult, JobState, PageText, MAX_PROGRESS};
use serde::Deserialize;

use crate::source::OcrError;

/// Body of `GET /jobs/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub progress: i64,
    #[serde(default)]
    pub progress_message: Option<String>,
    #[serde(default)]
    pub result: Option<ResultPayload>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultPayload {
    pub text: String,
    #[serde(default)]
    pub pages: Vec<PageText>,
}

impl TryFrom<StatusResponse> for JobState {
    type Error = OcrError;

    fn try_from(response: StatusResponse) -> Result<Self, Self::Error> {
        match response.status.as_str() {
            "processing" => {
                let progress = response.progress.clamp(0, i64::from(MAX_PROGRESS)) as u8;
                Ok(JobState::processing(
                    progress,
                    response.progress_message.unwrap_or_default(),
                ))
            }
            "completed" => {
                let result = response.result.ok_or_else(|| {
                    OcrError::InvalidSnapshot("completed status without a result".into())
                })?;
                Ok(JobState::Completed {
                    result: JobResult::new(result.text, result.pages),
                })
            }
            "error" => Ok(JobState::failed(
                response
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "conversion failed".into()),
            )),
            other => Err(OcrError::InvalidSnapshot(format!(
                "unknown status '{other}'"
            ))),
        }
    }
}
