//! Message type constants for job lifecycle events.
//!
//! Used as the `type` field when job events are rendered as JSON for
//! clients and as the event name in structured logs.

/// A new job entered the registry.
pub const MSG_TYPE_JOB_REGISTERED: &str = "job_registered";

/// Progress update while the job is processing.
pub const MSG_TYPE_JOB_PROGRESS: &str = "job_progress";

/// Job completed successfully.
pub const MSG_TYPE_JOB_COMPLETED: &str = "job_completed";

/// Job failed with an error.
pub const MSG_TYPE_JOB_FAILED: &str = "job_failed";

/// Job was removed (manual deletion or eviction).
pub const MSG_TYPE_JOB_REMOVED: &str = "job_removed";
