//! Job entity model and DTOs.

use std::time::Duration;

use imagine_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::{JobStatus, JobType};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: JobId,
    #[sqlx(rename = "job_type_id")]
    pub job_type: JobType,
    #[sqlx(rename = "status_id")]
    pub status: JobStatus,
    pub prompt: String,
    /// Base64 source image (video jobs only).
    pub image: Option<String>,
    /// Full original request (chat jobs only).
    pub request_payload: Option<serde_json::Value>,
    /// Worker that claimed the job.
    pub client_id: Option<String>,
    /// Artifact path for video jobs, inline text for chat jobs.
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Job {
    /// Stored artifact path of a completed video job.
    pub fn video_path(&self) -> Option<&str> {
        match (self.job_type, self.status) {
            (JobType::Video, JobStatus::Completed) => self.result.as_deref(),
            _ => None,
        }
    }

    /// Assistant text of a completed chat job.
    pub fn text_response(&self) -> Option<&str> {
        match (self.job_type, self.status) {
            (JobType::Chat, JobStatus::Completed) => self.result.as_deref(),
            _ => None,
        }
    }
}

/// DTO for inserting a new job.
#[derive(Debug, Clone)]
pub struct CreateJob {
    pub job_type: JobType,
    pub prompt: String,
    pub image: Option<String>,
    pub request_payload: Option<serde_json::Value>,
}

impl CreateJob {
    pub fn video(prompt: impl Into<String>, image: Option<String>) -> Self {
        Self {
            job_type: JobType::Video,
            prompt: prompt.into(),
            image,
            request_payload: None,
        }
    }

    pub fn chat(prompt: impl Into<String>, request_payload: serde_json::Value) -> Self {
        Self {
            job_type: JobType::Chat,
            prompt: prompt.into(),
            image: None,
            request_payload: Some(request_payload),
        }
    }
}

/// Filter for the diagnostic job listing (`GET /jobs`).
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
    pub job_type: Option<JobType>,
    /// Maximum number of results. Defaults to 100, capped at 1000.
    pub limit: Option<i64>,
}

/// Per-type processing deadlines used by the staleness sweep.
///
/// The deadline is measured from `created_at`, so time spent waiting in
/// the queue counts against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleTimeouts {
    pub video: Duration,
    pub chat: Duration,
}

impl StaleTimeouts {
    pub fn for_type(&self, job_type: JobType) -> Duration {
        match job_type {
            JobType::Video => self.video,
            JobType::Chat => self.chat,
        }
    }

    /// Error recorded on a job failed by the sweep.
    pub fn message_for(&self, job_type: JobType) -> String {
        format!(
            "{} timed out after {}s",
            job_type.label(),
            self.for_type(job_type).as_secs()
        )
    }
}

impl Default for StaleTimeouts {
    fn default() -> Self {
        Self {
            video: Duration::from_secs(300),
            chat: Duration::from_secs(60),
        }
    }
}

/// A job transitioned to `failed` by the staleness sweep.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SweptJob {
    pub id: JobId,
    #[sqlx(rename = "job_type_id")]
    pub job_type: JobType,
}
