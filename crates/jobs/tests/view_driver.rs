//! View driver reacting to registry events.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use ocrflow_core::job::JobState;
use ocrflow_core::view::{NotificationKind, View};
use ocrflow_events::RemovalReason;
use ocrflow_jobs::{JobRegistry, SharedView, ViewDriver};
use tokio_util::sync::CancellationToken;

const GRACE: Duration = Duration::from_secs(2);

/// Start a driver subscribed to the registry's bus.
fn start_driver(registry: &Arc<JobRegistry>) -> (SharedView, CancellationToken) {
    let driver = ViewDriver::new(Arc::clone(registry), GRACE);
    let view = driver.view();
    let cancel = CancellationToken::new();
    tokio::spawn(driver.run(registry.events().subscribe(), cancel.clone()));
    (view, cancel)
}

async fn current(view: &SharedView) -> View {
    view.lock().await.current()
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn focused_completion_opens_editor_after_grace() {
    let (registry, _) = registry();
    let (view, _cancel) = start_driver(&registry);
    let job = register_job(&registry).await;
    {
        let mut v = view.lock().await;
        v.focus(job.id);
        v.navigate_to(View::Processing);
    }

    registry.update(job.id, completed("text")).await.unwrap();

    tokio::time::sleep(GRACE - Duration::from_millis(100)).await;
    assert_eq!(current(&view).await, View::Processing);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(current(&view).await, View::Editor);
    assert!(view.lock().await.state().notifications.is_empty());
}

#[tokio::test(start_paused = true)]
async fn completion_while_elsewhere_only_notifies() {
    let (registry, _) = registry();
    let (view, _cancel) = start_driver(&registry);
    let job = register_job(&registry).await;
    {
        let mut v = view.lock().await;
        v.focus(job.id);
        v.navigate_to(View::Batch);
    }

    registry.update(job.id, completed("text")).await.unwrap();
    tokio::time::sleep(GRACE * 2).await;

    let v = view.lock().await;
    assert_eq!(v.current(), View::Batch);
    assert_eq!(v.state().notifications.len(), 1);
    assert_eq!(v.state().notifications[0].kind, NotificationKind::Completed);
}

#[tokio::test(start_paused = true)]
async fn leaving_processing_during_grace_cancels_navigation() {
    let (registry, _) = registry();
    let (view, _cancel) = start_driver(&registry);
    let job = register_job(&registry).await;
    {
        let mut v = view.lock().await;
        v.focus(job.id);
        v.navigate_to(View::Processing);
    }

    registry.update(job.id, completed("text")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    view.lock().await.navigate_to(View::Stored);
    tokio::time::sleep(GRACE).await;

    let v = view.lock().await;
    assert_eq!(v.current(), View::Stored);
    assert_eq!(v.state().notifications.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unfocused_completion_is_ignored() {
    let (registry, _) = registry();
    let (view, _cancel) = start_driver(&registry);
    let focused = register_job(&registry).await;
    let other = register_job(&registry).await;
    {
        let mut v = view.lock().await;
        v.focus(focused.id);
        v.navigate_to(View::Processing);
    }

    registry.update(other.id, completed("text")).await.unwrap();
    tokio::time::sleep(GRACE * 2).await;

    let v = view.lock().await;
    assert_eq!(v.current(), View::Processing);
    assert!(v.state().notifications.is_empty());
}

#[tokio::test(start_paused = true)]
async fn focused_failure_is_notified() {
    let (registry, _) = registry();
    let (view, _cancel) = start_driver(&registry);
    let job = register_job(&registry).await;
    {
        let mut v = view.lock().await;
        v.focus(job.id);
        v.navigate_to(View::Processing);
    }

    registry
        .update(job.id, JobState::failed("unreadable scan"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let v = view.lock().await;
    assert_eq!(v.current(), View::Processing);
    assert_eq!(v.state().notifications[0].kind, NotificationKind::Failed);
    assert_eq!(v.state().notifications[0].message, "unreadable scan");
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn focused_job_eviction_returns_to_upload() {
    let (registry, _) = registry();
    let (view, _cancel) = start_driver(&registry);
    let job = register_job(&registry).await;
    registry.update(job.id, completed("text")).await.unwrap();
    {
        let mut v = view.lock().await;
        v.focus(job.id);
        v.navigate_to(View::Editor);
    }

    registry.remove(job.id, RemovalReason::Expired).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut v = view.lock().await;
    assert_eq!(v.current(), View::Upload);
    assert_eq!(v.focused_job(), None);
    assert_eq!(v.go_back(), View::Upload);
}

#[tokio::test(start_paused = true)]
async fn removal_during_grace_cancels_auto_advance() {
    let (registry, _) = registry();
    let (view, _cancel) = start_driver(&registry);
    let job = register_job(&registry).await;
    {
        let mut v = view.lock().await;
        v.focus(job.id);
        v.navigate_to(View::Processing);
    }

    registry.update(job.id, completed("text")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    registry.remove(job.id, RemovalReason::Deleted).await;
    tokio::time::sleep(GRACE * 2).await;

    let v = view.lock().await;
    assert_eq!(v.current(), View::Upload);
    assert!(v.state().notifications.is_empty());
    assert!(registry.get(job.id).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn driver_stops_on_cancel() {
    let (registry, _) = registry();
    let driver = ViewDriver::new(Arc::clone(&registry), GRACE);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(driver.run(registry.events().subscribe(), cancel.clone()));

    cancel.cancel();
    handle.await.unwrap();
}
