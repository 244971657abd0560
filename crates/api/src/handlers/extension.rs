//! Worker-facing protocol endpoints.
//!
//! A worker polls for one job of a type, performs it out of process, and
//! reports exactly one outcome. Reports are only accepted while the job is
//! `processing`: unknown ids are 404, type mismatches 400 and late or
//! duplicate reports 409.

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use imagine_core::error::CoreError;
use imagine_db::models::status::{JobStatus, JobType};
use imagine_worker::protocol::{
    Ack, ChatCompleteRequest, ErrorReport, PollQuery, PolledJob, ANONYMOUS_CLIENT_ID,
    JOB_ID_FIELD, VIDEO_FIELD,
};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// GET /extension/poll?mode=video|chat&client_id=...
///
/// Sweeps stale jobs, then claims the oldest pending job of `mode`.
/// Returns 204 when there is nothing to do.
pub async fn poll(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> AppResult<Response> {
    let mode = query.mode.unwrap_or(JobType::Video);
    let client_id = query
        .client_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT_ID);

    let dispatcher = state.dispatcher();
    let Some(job) = dispatcher.poll(mode, client_id).await? else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let timeout_seconds = dispatcher.timeouts().for_type(job.job_type).as_secs();
    Ok(Json(PolledJob {
        client_id: job.client_id.unwrap_or_else(|| client_id.to_string()),
        job_id: job.id,
        job_type: job.job_type,
        prompt: job.prompt,
        image: job.image,
        request: job.request_payload,
        timeout_seconds,
    })
    .into_response())
}

// ---------------------------------------------------------------------------
// Video completion
// ---------------------------------------------------------------------------

/// POST /extension/complete
///
/// Multipart body with a `job_id` text field and a `video` file field.
/// The upload is staged under its own name and only published as the
/// artifact once its completion is recorded, so a losing or late upload
/// never replaces or removes the artifact of a finished job.
pub async fn complete_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<Ack>> {
    let mut job_id: Option<String> = None;
    let mut video: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some(JOB_ID_FIELD) => job_id = Some(field.text().await?.trim().to_string()),
            Some(VIDEO_FIELD) => video = Some(field.bytes().await?.to_vec()),
            _ => {}
        }
    }

    let job_id = job_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Missing '{JOB_ID_FIELD}' field")))?;
    let video = video.ok_or_else(|| AppError::BadRequest(format!("Missing '{VIDEO_FIELD}' file")))?;
    if video.is_empty() {
        return Err(AppError::BadRequest("Uploaded video is empty".into()));
    }

    let dispatcher = state.dispatcher();
    dispatcher
        .reportable(&job_id, Some(JobType::Video), JobStatus::Completed)
        .await?;

    let staged = state.storage.stage(&job_id, &video).await?;
    let result = state
        .storage
        .artifact_path(&job_id)?
        .to_string_lossy()
        .into_owned();

    if let Err(e) = dispatcher.complete(&job_id, JobType::Video, &result).await {
        // Another report won the job; its artifact stays as it is.
        state.storage.discard(staged).await;
        return Err(e);
    }
    state.storage.commit(staged).await?;

    tracing::info!(job_id = %job_id, bytes = video.len(), "Video uploaded");
    Ok(Json(Ack::ok(job_id)))
}

// ---------------------------------------------------------------------------
// Chat completion
// ---------------------------------------------------------------------------

/// POST /extension/complete/chat
pub async fn complete_chat(
    State(state): State<AppState>,
    Json(input): Json<ChatCompleteRequest>,
) -> AppResult<Json<Ack>> {
    state
        .dispatcher()
        .complete(&input.job_id, JobType::Chat, &input.content)
        .await?;
    Ok(Json(Ack::ok(input.job_id)))
}

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

/// POST /extension/error
pub async fn report_error(
    State(state): State<AppState>,
    Json(input): Json<ErrorReport>,
) -> AppResult<Json<Ack>> {
    let error = input.error.trim();
    if error.is_empty() {
        return Err(CoreError::Validation("error must not be empty".into()).into());
    }

    state.dispatcher().fail(&input.job_id, error).await?;
    Ok(Json(Ack::ok(input.job_id)))
}
