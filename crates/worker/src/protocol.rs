//! Wire types of the worker protocol.
//!
//! A worker polls for one job of a given type, performs the work out of
//! process, and reports exactly one outcome by job id:
//!
//! ```text
//! GET  /extension/poll?mode=video|chat&client_id=..   -> 200 PolledJob | 204
//! POST /extension/complete        (multipart: job_id, video)
//! POST /extension/complete/chat   ChatCompleteRequest
//! POST /extension/error           ErrorReport
//! ```

use imagine_db::models::status::JobType;
use serde::{Deserialize, Serialize};

pub const POLL_PATH: &str = "/extension/poll";
pub const COMPLETE_VIDEO_PATH: &str = "/extension/complete";
pub const COMPLETE_CHAT_PATH: &str = "/extension/complete/chat";
pub const ERROR_PATH: &str = "/extension/error";

/// Multipart field carrying the job id on video completion.
pub const JOB_ID_FIELD: &str = "job_id";
/// Multipart field carrying the video bytes on video completion.
pub const VIDEO_FIELD: &str = "video";

/// Client id recorded when a poller does not identify itself.
pub const ANONYMOUS_CLIENT_ID: &str = "anonymous";

/// Query string of the poll endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollQuery {
    /// Job type to claim. Defaults to video.
    pub mode: Option<JobType>,
    pub client_id: Option<String>,
}

/// A job claimed by the polling worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolledJob {
    pub job_id: String,
    pub job_type: JobType,
    pub client_id: String,
    pub prompt: String,
    /// Base64 source image (video jobs).
    pub image: Option<String>,
    /// Original OpenAI-style request (chat jobs).
    pub request: Option<serde_json::Value>,
    /// Processing budget before the server fails the job as stale.
    pub timeout_seconds: u64,
}

/// Body of `POST /extension/complete/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompleteRequest {
    pub job_id: String,
    pub content: String,
}

/// Body of `POST /extension/error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub job_id: String,
    pub error: String,
}

/// Acknowledgement returned by every report endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
    pub job_id: String,
}

impl Ack {
    pub fn ok(job_id: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            job_id: job_id.into(),
        }
    }
}
