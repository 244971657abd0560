pub mod chat;
pub mod extension;
pub mod health;
pub mod jobs;
pub mod videos;

use axum::Router;

use crate::state::AppState;

/// Build the full route tree.
///
/// Paths mirror the OpenAI API surface, so nothing is nested under a
/// version prefix of our own.
///
/// ```text
/// /health                                   service + store health
///
/// /v1/videos/generations                    create video job (POST)
/// /v1/videos/generations/{id}               video job status
/// /videos/{id}.mp4                          download artifact
///
/// /v1/chat/completions                      chat job + synchronous wait (POST)
///
/// /extension/poll                           claim next job (worker)
/// /extension/complete                       video upload (worker, multipart)
/// /extension/complete/chat                  chat result (worker)
/// /extension/error                          failure report (worker)
///
/// /jobs                                     list, clear (DELETE)
/// /jobs/next                                peek next pending job
/// /jobs/{id}                                get job
/// ```
pub fn app_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(videos::router())
        .merge(chat::router())
        .merge(extension::router(max_upload_bytes))
        .nest("/jobs", jobs::router())
}
