//! Worker protocol routes.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::extension;
use crate::state::AppState;

/// Routes used by external workers.
///
/// Only the video upload gets the raised body limit.
///
/// ```text
/// GET    /extension/poll                 -> poll
/// POST   /extension/complete             -> complete_video
/// POST   /extension/complete/chat        -> complete_chat
/// POST   /extension/error                -> report_error
/// ```
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/extension/poll", get(extension::poll))
        .route(
            "/extension/complete",
            post(extension::complete_video).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/extension/complete/chat", post(extension::complete_chat))
        .route("/extension/error", post(extension::report_error))
}
