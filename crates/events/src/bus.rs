//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`JobEvent`]s. The job
//! registry publishes one event per accepted mutation; the view driver and
//! any other observer subscribe. Share it via `Arc<EventBus>`.

use chrono::Utc;
use ocrflow_core::job_events::{
    MSG_TYPE_JOB_COMPLETED, MSG_TYPE_JOB_FAILED, MSG_TYPE_JOB_PROGRESS, MSG_TYPE_JOB_REGISTERED,
    MSG_TYPE_JOB_REMOVED,
};
use ocrflow_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// Why a job left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalReason {
    /// The user deleted it.
    Deleted,
    /// The eviction sweeper removed it after its retention window.
    Expired,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemovalReason::Deleted => f.write_str("deleted"),
            RemovalReason::Expired => f.write_str("expired"),
        }
    }
}

/// What happened to the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEventKind {
    Registered,
    Progress { progress: u8, message: String },
    Completed,
    Failed { reason: String },
    Removed { reason: RemovalReason },
}

/// A lifecycle event for a single job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: JobId,

    #[serde(flatten)]
    pub kind: JobEventKind,

    /// When the event was created (UTC).
    pub timestamp: Timestamp,
}

impl JobEvent {
    pub fn new(job_id: JobId, kind: JobEventKind) -> Self {
        Self {
            job_id,
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Message type name, matching the constants in
    /// [`ocrflow_core::job_events`].
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            JobEventKind::Registered => MSG_TYPE_JOB_REGISTERED,
            JobEventKind::Progress { .. } => MSG_TYPE_JOB_PROGRESS,
            JobEventKind::Completed => MSG_TYPE_JOB_COMPLETED,
            JobEventKind::Failed { .. } => MSG_TYPE_JOB_FAILED,
            JobEventKind::Removed { .. } => MSG_TYPE_JOB_REMOVED,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`JobEvent`].
///
/// # Usage
///
/// ```rust
/// use ocrflow_core::types::JobId;
/// use ocrflow_events::bus::{EventBus, JobEvent, JobEventKind};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobEvent::new(JobId::nil(), JobEventKind::Registered));
/// ```
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: JobEvent) {
        tracing::trace!(job_id = %event.job_id, event_type = event.event_type(), "Publishing job event");
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let job_id = JobId::new_v4();

        bus.publish(JobEvent::new(
            job_id,
            JobEventKind::Progress {
                progress: 42,
                message: "Page 3/7".into(),
            },
        ));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.job_id, job_id);
        assert_eq!(received.event_type(), MSG_TYPE_JOB_PROGRESS);
        assert_eq!(
            received.kind,
            JobEventKind::Progress {
                progress: 42,
                message: "Page 3/7".into()
            }
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let job_id = JobId::new_v4();

        bus.publish(JobEvent::new(job_id, JobEventKind::Completed));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.job_id, job_id);
        assert_eq!(e2.event_type(), MSG_TYPE_JOB_COMPLETED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(JobEvent::new(JobId::new_v4(), JobEventKind::Registered));
    }

    #[test]
    fn serializes_flat_with_type_tag() {
        let event = JobEvent::new(
            JobId::nil(),
            JobEventKind::Removed {
                reason: RemovalReason::Expired,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "removed");
        assert_eq!(json["reason"], "expired");
        assert!(json["timestamp"].is_string());
    }
}
