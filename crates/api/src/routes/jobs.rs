use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// DELETE /                -> clear_jobs
/// GET    /next            -> next_job
/// GET    /{id}            -> get_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).delete(jobs::clear_jobs))
        .route("/next", get(jobs::next_job))
        .route("/{id}", get(jobs::get_job))
}
