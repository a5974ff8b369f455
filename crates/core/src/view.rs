//! Navigation state machine for the editor UI.
//!
//! [`ViewController`] is pure: it never sleeps or spawns. Time-based
//! behaviour (the auto-advance grace delay) is driven from the outside by
//! calling [`ViewController::on_job_completed`] and, once the delay has
//! elapsed, [`ViewController::finish_auto_advance`].
//!
//! History is a single `previous` slot rather than a stack. A second
//! navigation before going back overwrites it.

use serde::{Deserialize, Serialize};

use crate::types::JobId;

/// Screens the user can be looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Upload,
    Processing,
    Editor,
    Batch,
    Stored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Completed,
    Failed,
}

/// Passive notice surfaced instead of a forced navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub job_id: JobId,
    pub kind: NotificationKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub current: View,
    pub previous: View,
    pub focused_job: Option<JobId>,
    pub notifications: Vec<Notification>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            current: View::Upload,
            previous: View::Upload,
            focused_job: None,
            notifications: Vec::new(),
        }
    }
}

/// What the caller should do after a focused job completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReaction {
    /// Wait for the grace delay, then call `finish_auto_advance`.
    ScheduleAdvance,
    /// The user is elsewhere; a notification was recorded.
    Notified,
    /// The job is not the focused one.
    Ignored,
}

#[derive(Debug, Default)]
pub struct ViewController {
    state: ViewState,
}

impl ViewController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn current(&self) -> View {
        self.state.current
    }

    pub fn focused_job(&self) -> Option<JobId> {
        self.state.focused_job
    }

    /// Switch to `view`, remembering the current one. Returns `false` when
    /// already there.
    pub fn navigate_to(&mut self, view: View) -> bool {
        if view == self.state.current {
            return false;
        }
        self.state.previous = self.state.current;
        self.state.current = view;
        true
    }

    /// Return to the previous view, or to `upload` when there is none.
    ///
    /// History resets to `upload` afterwards, so calling this twice in a
    /// row ends at `upload` and further calls are no-ops.
    pub fn go_back(&mut self) -> View {
        let target = if self.state.previous != self.state.current {
            self.state.previous
        } else {
            View::Upload
        };
        self.state.current = target;
        self.state.previous = View::Upload;
        target
    }

    pub fn focus(&mut self, job_id: JobId) {
        self.state.focused_job = Some(job_id);
    }

    pub fn clear_focus(&mut self) {
        self.state.focused_job = None;
    }

    /// React to `job_id` reaching `completed`.
    pub fn on_job_completed(&mut self, job_id: JobId) -> CompletionReaction {
        if self.state.focused_job != Some(job_id) {
            return CompletionReaction::Ignored;
        }
        if self.state.current == View::Processing {
            CompletionReaction::ScheduleAdvance
        } else {
            self.notify(job_id, NotificationKind::Completed, "Conversion completed");
            CompletionReaction::Notified
        }
    }

    /// Complete a scheduled auto-advance.
    ///
    /// Conditions are checked again: if the user left the processing view or
    /// changed focus during the grace delay, a notification is recorded
    /// instead. Returns `true` when the editor was opened.
    pub fn finish_auto_advance(&mut self, job_id: JobId) -> bool {
        if self.state.focused_job == Some(job_id) && self.state.current == View::Processing {
            self.navigate_to(View::Editor);
            true
        } else {
            self.notify(job_id, NotificationKind::Completed, "Conversion completed");
            false
        }
    }

    /// React to `job_id` failing. Only the focused job produces a notice.
    pub fn on_job_failed(&mut self, job_id: JobId, reason: &str) -> bool {
        if self.state.focused_job != Some(job_id) {
            return false;
        }
        self.notify(job_id, NotificationKind::Failed, reason);
        true
    }

    /// React to `job_id` leaving the registry.
    ///
    /// When it is the focused job the view is forced back to `upload` with
    /// no history, so nothing can navigate back to a removed job.
    pub fn on_job_removed(&mut self, job_id: JobId) -> bool {
        self.state.notifications.retain(|n| n.job_id != job_id);
        if self.state.focused_job != Some(job_id) {
            return false;
        }
        self.state.focused_job = None;
        self.state.current = View::Upload;
        self.state.previous = View::Upload;
        true
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.state.notifications)
    }

    fn notify(&mut self, job_id: JobId, kind: NotificationKind, message: &str) {
        self.state.notifications.push(Notification {
            job_id,
            kind,
            message: message.to_string(),
        });
    }
}
