use axum::routing::post;
use axum::Router;

use crate::handlers::chat;
use crate::state::AppState;

/// ```text
/// POST   /v1/chat/completions            -> create_chat_completion
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/chat/completions", post(chat::create_chat_completion))
}
