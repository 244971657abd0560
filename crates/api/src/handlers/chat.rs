//! OpenAI-compatible chat completions bridged to external workers.
//!
//! The request is stored whole as the job payload, then the handler holds
//! the connection open until a worker reports a result, the job fails, or
//! the wait deadline passes.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use imagine_core::chat::{extract_user_prompt, finalize_content, wants_structured_reply};
use imagine_core::error::CoreError;
use imagine_db::models::job::CreateJob;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::wait::{wait_for_terminal, WaitOutcome};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const DEFAULT_CHAT_MODEL: &str = "grok-vision";

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_temperature() -> Option<f64> {
    Some(0.2)
}

fn default_max_tokens() -> Option<u32> {
    Some(512)
}

/// Body of `POST /v1/chat/completions`.
///
/// Unknown fields are kept so the worker sees the request as sent.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default = "default_chat_model")]
    pub model: String,
    pub messages: Vec<Value>,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f64>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,
    /// e.g. `{"type": "json_object"}`.
    #[serde(default)]
    pub response_format: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AssistantMessage {
    pub role: &'static str,
    pub content: String,
}

/// Token accounting is not tracked; always zero.
#[derive(Debug, Default, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// POST /v1/chat/completions
///
/// 500 `JOB_FAILED` when the worker reports an error or the job is swept,
/// 504 `TIMEOUT` when no result arrives before the wait deadline.
pub async fn create_chat_completion(
    State(state): State<AppState>,
    Json(request): Json<ChatCompletionRequest>,
) -> AppResult<Json<ChatCompletionResponse>> {
    if request.messages.is_empty() {
        return Err(CoreError::Validation("messages must not be empty".into()).into());
    }

    let prompt = extract_user_prompt(&request.messages);
    let structured = wants_structured_reply(request.response_format.as_ref());
    let payload = serde_json::to_value(&request)
        .map_err(|e| AppError::InternalError(format!("Failed to encode chat request: {e}")))?;

    let job = state
        .dispatcher()
        .submit(&CreateJob::chat(prompt, payload))
        .await?;

    let options = state.config.wait_options();
    let waited = wait_for_terminal(&state.pool, &state.event_bus, &job.id, &options).await?;

    match waited.outcome {
        WaitOutcome::Completed(done) => {
            let raw = done.text_response().unwrap_or_default();
            let content = finalize_content(raw, structured);
            tracing::info!(job_id = %done.id, structured, "Chat completion delivered");

            Ok(Json(ChatCompletionResponse {
                id: format!("chatcmpl-{}", done.id),
                object: "chat.completion",
                created: Utc::now().timestamp(),
                model: request.model,
                choices: vec![ChatChoice {
                    index: 0,
                    message: AssistantMessage {
                        role: "assistant",
                        content,
                    },
                    finish_reason: "stop",
                }],
                usage: Usage::default(),
            }))
        }
        WaitOutcome::Failed(failed) => Err(CoreError::JobFailed(
            failed.error.unwrap_or_else(|| "Chat job failed".to_string()),
        )
        .into()),
        WaitOutcome::TimedOut => Err(CoreError::Timeout(format!(
            "Timed out waiting for chat completion after {}s",
            options.deadline.as_secs()
        ))
        .into()),
    }
}
