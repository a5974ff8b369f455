use std::sync::Arc;

use ocrflow_jobs::{JobLifecycle, SharedView};
use ocrflow_ocr::LocalResourceStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Upload, delete and edit entry points; also owns the registry and
    /// the poller supervisor.
    pub lifecycle: Arc<JobLifecycle>,
    /// Navigation state driven by the view driver task.
    pub view: SharedView,
    /// Local storage, used to place incoming uploads.
    pub uploads: Arc<LocalResourceStore>,
}
