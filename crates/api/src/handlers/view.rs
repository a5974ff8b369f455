//! Handlers for the `/view` resource.
//!
//! The view state itself is owned by the view driver; these handlers apply
//! user navigation to the same shared controller.

use axum::extract::State;
use axum::Json;
use ocrflow_core::error::CoreError;
use ocrflow_core::types::JobId;
use ocrflow_core::view::{Notification, View, ViewState};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub view: View,
}

#[derive(Debug, Deserialize)]
pub struct FocusRequest {
    pub job_id: JobId,
}

type ViewResponse = Json<DataResponse<ViewState>>;

/// GET /api/view
pub async fn get_view(State(state): State<AppState>) -> ViewResponse {
    let view = state.view.lock().await.state().clone();
    Json(DataResponse { data: view })
}

/// POST /api/view/navigate
pub async fn navigate(
    State(state): State<AppState>,
    Json(input): Json<NavigateRequest>,
) -> ViewResponse {
    let mut view = state.view.lock().await;
    view.navigate_to(input.view);
    Json(DataResponse {
        data: view.state().clone(),
    })
}

/// POST /api/view/back
pub async fn go_back(State(state): State<AppState>) -> ViewResponse {
    let mut view = state.view.lock().await;
    view.go_back();
    Json(DataResponse {
        data: view.state().clone(),
    })
}

/// POST /api/view/focus
///
/// Only jobs that are still registered can be focused.
///
/// The view lock is taken before the existence check. A removal that lands
/// after the check is applied by the view driver once the lock is released,
/// so focus cannot stick to a removed job.
pub async fn focus(
    State(state): State<AppState>,
    Json(input): Json<FocusRequest>,
) -> AppResult<ViewResponse> {
    let job_id = input.job_id;
    let mut view = state.view.lock().await;
    if !state.lifecycle.registry().contains(job_id).await {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }));
    }

    view.focus(job_id);
    Ok(Json(DataResponse {
        data: view.state().clone(),
    }))
}

/// DELETE /api/view/focus
pub async fn clear_focus(State(state): State<AppState>) -> ViewResponse {
    let mut view = state.view.lock().await;
    view.clear_focus();
    Json(DataResponse {
        data: view.state().clone(),
    })
}

/// DELETE /api/view/notifications
///
/// Returns the notifications that were pending.
pub async fn take_notifications(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<Notification>>> {
    let drained = state.view.lock().await.take_notifications();
    Json(DataResponse { data: drained })
}
