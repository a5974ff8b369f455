//! Handler for `/status`: a summary the UI polls to show connectivity.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    /// Jobs currently held by the registry.
    pub active_files: usize,
    /// Jobs with a running status poller.
    pub polling: usize,
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<DataResponse<StatusResponse>> {
    let active_files = state.lifecycle.registry().len().await;
    let polling = state.lifecycle.pollers().active_count().await;

    Json(DataResponse {
        data: StatusResponse {
            status: "connected",
            active_files,
            polling,
        },
    })
}
