//! Dispatch state machine on top of [`JobRepo`].
//!
//! ```text
//! submit   (none)      -> pending
//! poll     pending     -> processing   (after an opportunistic sweep)
//! complete processing  -> completed
//! fail     processing  -> failed
//! sweep    processing  -> failed       (deadline exceeded)
//! ```
//!
//! Reports against a job that is no longer `processing` are rejected with
//! a conflict and never overwrite the terminal record.

use std::sync::Arc;

use imagine_core::error::CoreError;
use imagine_db::models::job::{CreateJob, Job, StaleTimeouts, SweptJob};
use imagine_db::models::status::{JobStatus, JobType};
use imagine_db::repositories::JobRepo;
use imagine_events::{EventBus, JobEvent, JobEventKind};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

/// Dispatch engine handle. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    pool: PgPool,
    event_bus: Arc<EventBus>,
    timeouts: StaleTimeouts,
}

impl Dispatcher {
    pub fn new(pool: PgPool, event_bus: Arc<EventBus>, timeouts: StaleTimeouts) -> Self {
        Self {
            pool,
            event_bus,
            timeouts,
        }
    }

    pub fn timeouts(&self) -> &StaleTimeouts {
        &self.timeouts
    }

    /// Insert a new pending job.
    pub async fn submit(&self, input: &CreateJob) -> AppResult<Job> {
        let job = JobRepo::create(&self.pool, input).await?;
        tracing::info!(job_id = %job.id, job_type = %job.job_type, "Job submitted");
        self.publish(&job.id, job.job_type, JobEventKind::Created);
        Ok(job)
    }

    /// Fail every processing job past its type's deadline.
    pub async fn sweep(&self) -> Result<Vec<SweptJob>, sqlx::Error> {
        let swept = JobRepo::sweep_stale(&self.pool, &self.timeouts).await?;
        for job in &swept {
            let error = self.timeouts.message_for(job.job_type);
            tracing::warn!(job_id = %job.id, job_type = %job.job_type, %error, "Job timed out");
            self.publish(&job.id, job.job_type, JobEventKind::TimedOut { error });
        }
        Ok(swept)
    }

    /// Sweep, then claim the oldest pending job of `job_type`.
    ///
    /// `None` covers both an empty queue and a lost claim race.
    pub async fn poll(&self, job_type: JobType, client_id: &str) -> AppResult<Option<Job>> {
        self.sweep().await?;

        let Some(job) = JobRepo::claim_next(&self.pool, job_type, client_id).await? else {
            tracing::debug!(%job_type, client_id, "No pending job to claim");
            return Ok(None);
        };

        tracing::info!(job_id = %job.id, %job_type, client_id, "Job claimed");
        self.publish(
            &job.id,
            job.job_type,
            JobEventKind::Claimed {
                client_id: client_id.to_string(),
            },
        );
        Ok(Some(job))
    }

    /// Look up a job that a worker is about to move into `next`.
    ///
    /// Fails with not-found for an unknown id, a validation error when the
    /// job is of a different type than the report, and a conflict when the
    /// job's current status cannot move into `next`.
    pub async fn reportable(
        &self,
        id: &str,
        job_type: Option<JobType>,
        next: JobStatus,
    ) -> AppResult<Job> {
        let job = JobRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::job_not_found(id))?;

        if let Some(expected) = job_type {
            if job.job_type != expected {
                return Err(CoreError::Validation(format!(
                    "Job {id} is a {} job, not {expected}",
                    job.job_type
                ))
                .into());
            }
        }

        if !job.status.can_transition_to(next) {
            return Err(not_processing(id, job.status));
        }
        Ok(job)
    }

    /// Record a worker's successful result.
    pub async fn complete(&self, id: &str, job_type: JobType, result: &str) -> AppResult<()> {
        let job = self
            .reportable(id, Some(job_type), JobStatus::Completed)
            .await?;

        if !JobRepo::complete(&self.pool, id, result).await? {
            // Lost a race with the sweep or a duplicate report.
            return Err(self.current_conflict(id).await);
        }

        tracing::info!(job_id = id, job_type = %job.job_type, "Job completed");
        self.publish(id, job.job_type, JobEventKind::Completed);
        Ok(())
    }

    /// Record a worker's failure report. No retry is scheduled.
    pub async fn fail(&self, id: &str, error: &str) -> AppResult<()> {
        let job = self.reportable(id, None, JobStatus::Failed).await?;

        if !JobRepo::fail(&self.pool, id, error).await? {
            return Err(self.current_conflict(id).await);
        }

        tracing::warn!(job_id = id, job_type = %job.job_type, error, "Job failed");
        self.publish(
            id,
            job.job_type,
            JobEventKind::Failed {
                error: error.to_string(),
            },
        );
        Ok(())
    }

    // ---- private helpers ----

    async fn current_conflict(&self, id: &str) -> AppError {
        match JobRepo::find_by_id(&self.pool, id).await {
            Ok(Some(job)) => not_processing(id, job.status),
            Ok(None) => CoreError::job_not_found(id).into(),
            Err(e) => e.into(),
        }
    }

    fn publish(&self, id: &str, job_type: JobType, kind: JobEventKind) {
        self.event_bus.publish(JobEvent::new(id, job_type, kind));
    }
}

fn not_processing(id: &str, status: JobStatus) -> AppError {
    CoreError::Conflict(format!("Job {id} is {status}, not processing")).into()
}
