pub mod files;
pub mod health;
pub mod view;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /files                       list, upload one PDF
/// /files/batch                 upload several PDFs (POST)
/// /files/{id}                  get, delete
/// /files/{id}/pdf              uploaded PDF (GET)
/// /files/{id}/text             replace extracted text (PUT)
/// /files/{id}/correct          find-and-replace correction (POST)
///
/// /status                      registry / poller summary
///
/// /view                        current view state
/// /view/navigate               navigate (POST)
/// /view/back                   go back (POST)
/// /view/focus                  focus (POST), clear focus (DELETE)
/// /view/notifications          drain notifications (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/files", files::router())
        .route("/status", get(handlers::status::get_status))
        .nest("/view", view::router())
}
