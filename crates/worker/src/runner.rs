//! Poll loop that hands claimed jobs to a [`JobHandler`].
//!
//! Each iteration claims at most one job, runs the handler, and reports
//! exactly one outcome for it. When the queue is empty the loop sleeps
//! for the poll interval plus a random jitter so a fleet of workers does
//! not poll in lockstep.

use std::time::Duration;

use async_trait::async_trait;
use imagine_db::models::status::JobType;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::client::{ExtensionClient, ExtensionClientError};
use crate::protocol::PolledJob;

/// Result of performing a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    /// Encoded video bytes for a video job.
    Video(Vec<u8>),
    /// Assistant text for a chat job.
    Text(String),
}

impl JobOutput {
    fn job_type(&self) -> JobType {
        match self {
            Self::Video(_) => JobType::Video,
            Self::Text(_) => JobType::Chat,
        }
    }
}

/// Performs the actual work for a claimed job.
///
/// An `Err` is reported to the server as the job's error message.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &PolledJob) -> Result<JobOutput, String>;
}

/// A single worker polling one job type.
pub struct Worker<H> {
    client: ExtensionClient,
    handler: H,
    mode: JobType,
    client_id: String,
    poll_interval: Duration,
    max_jitter: Duration,
}

impl<H: JobHandler> Worker<H> {
    pub fn new(client: ExtensionClient, handler: H, mode: JobType, client_id: impl Into<String>) -> Self {
        Self {
            client,
            handler,
            mode,
            client_id: client_id.into(),
            poll_interval: Duration::from_secs(2),
            max_jitter: Duration::from_millis(500),
        }
    }

    /// Base delay between polls of an empty queue.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Upper bound of the random delay added to each idle wait.
    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Poll until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            mode = %self.mode,
            client_id = %self.client_id,
            server = self.client.base_url(),
            "Worker started",
        );

        loop {
            let idle = match self.run_once().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    tracing::error!(error = %e, "Worker iteration failed");
                    true
                }
            };

            if !idle {
                if cancel.is_cancelled() {
                    break;
                }
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.idle_delay()) => {}
            }
        }

        tracing::info!(client_id = %self.client_id, "Worker stopped");
    }

    /// Claim and process at most one job.
    ///
    /// Returns the id of the processed job, or `None` when the queue was
    /// empty. A 409 on the report means the server already failed the job
    /// as stale; that is logged and not treated as an error.
    pub async fn run_once(&self) -> Result<Option<String>, ExtensionClientError> {
        let Some(job) = self.client.poll(self.mode, &self.client_id).await? else {
            return Ok(None);
        };
        tracing::info!(job_id = %job.job_id, job_type = %job.job_type, "Claimed job");

        let outcome = match self.handler.handle(&job).await {
            Ok(output) if output.job_type() != job.job_type => Err(format!(
                "handler produced {} output for a {} job",
                output.job_type(),
                job.job_type
            )),
            other => other,
        };

        let report = match outcome {
            Ok(JobOutput::Video(bytes)) => self.client.complete_video(&job.job_id, bytes).await,
            Ok(JobOutput::Text(text)) => self.client.complete_chat(&job.job_id, &text).await,
            Err(message) => {
                tracing::warn!(job_id = %job.job_id, error = %message, "Job failed");
                self.client.report_error(&job.job_id, &message).await
            }
        };

        match report {
            Ok(_) => {}
            Err(e) if e.is_conflict() => {
                tracing::warn!(job_id = %job.job_id, "Report rejected, job is no longer processing");
            }
            Err(e) => return Err(e),
        }

        Ok(Some(job.job_id))
    }

    fn idle_delay(&self) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.poll_interval + Duration::from_millis(jitter)
    }
}
