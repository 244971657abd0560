//! Diagnostic handlers for the `/jobs` resource.
//!
//! Read-only views of the queue plus a bulk clear for operational reset.
//! Nothing here claims or transitions a job.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use imagine_core::error::CoreError;
use imagine_db::models::job::{Job, JobListQuery};
use imagine_db::models::status::JobType;
use imagine_db::repositories::JobRepo;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextJobQuery {
    pub job_type: Option<JobType>,
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /jobs
///
/// Newest first. Optional `status`, `job_type` and `limit` query parameters.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list(&state.pool, &params).await?;
    Ok(Json(JobListResponse {
        count: jobs.len(),
        jobs,
    }))
}

// ---------------------------------------------------------------------------
// Peek
// ---------------------------------------------------------------------------

/// GET /jobs/next
///
/// The job a worker would claim next. Inspection only; not claim-safe.
pub async fn next_job(
    State(state): State<AppState>,
    Query(params): Query<NextJobQuery>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::peek_next_pending(&state.pool, params.job_type).await?;
    Ok(Json(serde_json::json!({ "job": job })))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::find_by_id(&state.pool, &job_id)
        .await?
        .ok_or_else(|| CoreError::job_not_found(&job_id))?;
    Ok(Json(job))
}

// ---------------------------------------------------------------------------
// Clear
// ---------------------------------------------------------------------------

/// DELETE /jobs
///
/// Delete every job. Stored video files are left for the retention task.
pub async fn clear_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let deleted = JobRepo::clear_all(&state.pool).await?;
    tracing::warn!(deleted, "Cleared all jobs");
    Ok(Json(serde_json::json!({ "status": "ok", "deleted": deleted })))
}
