//! Conversion job record and its state machine.
//!
//! A [`Job`] is created in [`JobState::Processing`] at upload time and moves
//! to exactly one terminal state ([`JobState::Completed`] or
//! [`JobState::Failed`]). [`Job::apply`] enforces the transition rules so
//! every writer goes through the same checks.

use serde::{Deserialize, Serialize};

use crate::text::TextStats;
use crate::types::{JobId, Timestamp};

/// Highest value a progress percentage may take.
pub const MAX_PROGRESS: u8 = 100;

/// Progress message attached to freshly uploaded jobs.
pub const UPLOADED_MESSAGE: &str = "Uploaded";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Flat status discriminant, used for logging and the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Text of a single page as returned by the OCR service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub page_number: u32,
    pub content: String,
}

/// Output of a completed conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub text: String,
    #[serde(default)]
    pub pages: Vec<PageText>,
    pub stats: TextStats,
}

impl JobResult {
    pub fn new(text: impl Into<String>, pages: Vec<PageText>) -> Self {
        let text = text.into();
        let stats = TextStats::from_text(&text);
        Self { text, pages, stats }
    }

    /// Replace the extracted text and recompute its statistics.
    pub fn replace_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.stats = TextStats::from_text(&self.text);
    }
}

/// Per-status job payload.
///
/// Each variant carries only the fields meaningful for that status, so a
/// completed job can never hold an error reason and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobState {
    Processing {
        progress: u8,
        #[serde(default)]
        progress_message: String,
    },
    Completed {
        result: JobResult,
    },
    #[serde(rename = "error")]
    Failed {
        reason: String,
    },
}

impl JobState {
    pub fn processing(progress: u8, message: impl Into<String>) -> Self {
        JobState::Processing {
            progress: progress.min(MAX_PROGRESS),
            progress_message: message.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        JobState::Failed {
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Processing { .. } => JobStatus::Processing,
            JobState::Completed { .. } => JobStatus::Completed,
            JobState::Failed { .. } => JobStatus::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Percentage shown to the user. Completed jobs report 100, failed 0.
    pub fn progress(&self) -> u8 {
        match self {
            JobState::Processing { progress, .. } => *progress,
            JobState::Completed { .. } => MAX_PROGRESS,
            JobState::Failed { .. } => 0,
        }
    }

    pub fn progress_message(&self) -> &str {
        match self {
            JobState::Processing {
                progress_message, ..
            } => progress_message,
            JobState::Completed { .. } => "Completed!",
            JobState::Failed { .. } => "Failed",
        }
    }

    fn clamped(self) -> Self {
        match self {
            JobState::Processing {
                progress,
                progress_message,
            } => JobState::Processing {
                progress: progress.min(MAX_PROGRESS),
                progress_message,
            },
            other => other,
        }
    }
}

/// Why [`Job::apply`] refused a new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UpdateRejection {
    #[error("job is already {status}")]
    AlreadyTerminal { status: JobStatus },

    #[error("progress would regress from {current} to {proposed}")]
    ProgressRegression { current: u8, proposed: u8 },
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Immutable metadata captured when a file is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub name: String,
    pub file_size: u64,
}

/// One PDF-to-text conversion tracked from upload until eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub file_size: u64,
    #[serde(flatten)]
    pub state: JobState,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Job {
    /// Create a job in the initial processing state.
    ///
    /// `expires_at` is fixed here and never recomputed.
    pub fn new(id: JobId, meta: FileMeta, retention: chrono::Duration, now: Timestamp) -> Self {
        Self {
            id,
            name: meta.name,
            file_size: meta.file_size,
            state: JobState::processing(0, UPLOADED_MESSAGE),
            created_at: now,
            expires_at: now + retention,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// A job is expired once `now` reaches `expires_at`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Move the job to `next` if the transition is allowed.
    ///
    /// Terminal jobs accept nothing. While processing, a snapshot with lower
    /// progress is refused; equal progress is accepted so the message can
    /// change.
    pub fn apply(&mut self, next: JobState) -> Result<(), UpdateRejection> {
        let next = next.clamped();
        match (&self.state, &next) {
            (current, _) if current.is_terminal() => Err(UpdateRejection::AlreadyTerminal {
                status: current.status(),
            }),
            (
                JobState::Processing {
                    progress: current, ..
                },
                JobState::Processing {
                    progress: proposed, ..
                },
            ) if proposed < current => Err(UpdateRejection::ProgressRegression {
                current: *current,
                proposed: *proposed,
            }),
            _ => {
                self.state = next;
                Ok(())
            }
        }
    }
}
