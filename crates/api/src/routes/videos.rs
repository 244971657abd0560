use axum::routing::{get, post};
use axum::Router;

use crate::handlers::videos;
use crate::state::AppState;

/// Video generation routes.
///
/// ```text
/// POST   /v1/videos/generations          -> create_generation
/// GET    /v1/videos/generations/{id}     -> get_generation
/// GET    /videos/{file_name}             -> download_video ({id}.mp4)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/videos/generations", post(videos::create_generation))
        .route("/v1/videos/generations/{id}", get(videos::get_generation))
        .route("/videos/{file_name}", get(videos::download_video))
}
