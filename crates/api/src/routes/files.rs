//! Route definitions for the `/files` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::files;
use crate::state::AppState;

/// Routes mounted at `/files`.
///
/// ```text
/// GET    /                -> list_files
/// POST   /                -> upload_file
/// POST   /batch           -> upload_batch
/// GET    /{id}            -> get_file
/// DELETE /{id}            -> delete_file
/// GET    /{id}/pdf        -> get_pdf
/// PUT    /{id}/text       -> update_text
/// POST   /{id}/correct    -> correct_text
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(files::list_files).post(files::upload_file))
        .route("/batch", post(files::upload_batch))
        .route("/{id}", get(files::get_file).delete(files::delete_file))
        .route("/{id}/pdf", get(files::get_pdf))
        .route("/{id}/text", put(files::update_text))
        .route("/{id}/correct", post(files::correct_text))
}
