//! Handlers for the OpenAI-compatible video generation resource.
//!
//! Video jobs never block the caller: creation returns the job id at once
//! and the client polls the status endpoint until `video_url` appears.

use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use imagine_core::error::CoreError;
use imagine_core::storage::VIDEO_EXTENSION;
use imagine_db::models::job::{CreateJob, Job};
use imagine_db::models::status::{JobStatus, JobType};
use imagine_db::repositories::JobRepo;
use serde::{Deserialize, Serialize};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::config::ServerConfig;
use crate::error::AppResult;
use crate::state::AppState;

/// Model reported when the caller does not name one.
pub const DEFAULT_VIDEO_MODEL: &str = "grok";

fn default_video_model() -> String {
    DEFAULT_VIDEO_MODEL.to_string()
}

/// Body of `POST /v1/videos/generations`.
#[derive(Debug, Deserialize)]
pub struct VideoGenerationRequest {
    #[serde(default = "default_video_model")]
    pub model: String,
    pub prompt: String,
    /// Base64 encoded source image.
    pub image: Option<String>,
}

/// Status projection of a video job.
#[derive(Debug, Serialize)]
pub struct VideoGenerationResponse {
    pub id: String,
    pub object: &'static str,
    /// Unix timestamp of job creation.
    pub created: i64,
    pub model: String,
    pub status: JobStatus,
    /// Download URL, set only once the job is completed.
    pub video_url: Option<String>,
    pub error: Option<String>,
}

impl VideoGenerationResponse {
    fn from_job(job: Job, model: String, config: &ServerConfig) -> Self {
        let video_url = job.video_path().map(|_| config.video_url(&job.id));
        Self {
            object: "videos.generation",
            created: job.created_at.timestamp(),
            model,
            status: job.status,
            video_url,
            error: job.error,
            id: job.id,
        }
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /v1/videos/generations
///
/// Queue a video job. Returns immediately with the pending job.
pub async fn create_generation(
    State(state): State<AppState>,
    Json(input): Json<VideoGenerationRequest>,
) -> AppResult<impl IntoResponse> {
    let prompt = input.prompt.trim();
    if prompt.is_empty() {
        return Err(CoreError::Validation("prompt must not be empty".into()).into());
    }

    let job = state
        .dispatcher()
        .submit(&CreateJob::video(prompt, input.image))
        .await?;

    Ok(Json(VideoGenerationResponse::from_job(job, input.model, &state.config)))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /v1/videos/generations/{id}
///
/// Only video jobs are visible here; any other id is 404.
pub async fn get_generation(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::find_by_id(&state.pool, &job_id)
        .await?
        .filter(|job| job.job_type == JobType::Video)
        .ok_or_else(|| CoreError::NotFound {
            entity: "Video generation",
            id: job_id.clone(),
        })?;

    Ok(Json(VideoGenerationResponse::from_job(
        job,
        default_video_model(),
        &state.config,
    )))
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// GET /videos/{job_id}.mp4
///
/// Serves the stored artifact. Range requests are honoured.
pub async fn download_video(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    request: Request,
) -> AppResult<Response> {
    let not_found = || CoreError::NotFound {
        entity: "Video",
        id: file_name.clone(),
    };

    let job_id = file_name
        .strip_suffix(VIDEO_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .ok_or_else(not_found)?;

    let path = state.storage.path_for(job_id).await?.ok_or_else(not_found)?;

    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    Ok(response.into_response())
}
