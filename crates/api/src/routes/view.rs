use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::view;
use crate::state::AppState;

/// Routes mounted at `/view`.
///
/// ```text
/// GET    /                -> get_view
/// POST   /navigate        -> navigate
/// POST   /back            -> go_back
/// POST   /focus           -> focus
/// DELETE /focus           -> clear_focus
/// DELETE /notifications   -> take_notifications
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(view::get_view))
        .route("/navigate", post(view::navigate))
        .route("/back", post(view::go_back))
        .route("/focus", post(view::focus).delete(view::clear_focus))
        .route("/notifications", delete(view::take_notifications))
}
