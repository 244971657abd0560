//! Synchronous wait on an asynchronously processed job.
//!
//! The store is re-read every `poll_interval` until the job is terminal or
//! the overall deadline passes. Any event for the job on the [`EventBus`]
//! cuts the current sleep short, so a completion reported to this process
//! is observed immediately; reports handled elsewhere are still picked up
//! by the periodic read.
//!
//! A timed-out wait leaves the job untouched. It may still complete later
//! or be failed by the sweep.

use std::time::Duration;

use imagine_core::error::CoreError;
use imagine_db::models::job::Job;
use imagine_db::models::status::JobStatus;
use imagine_db::repositories::JobRepo;
use imagine_events::{EventBus, JobEvent};
use sqlx::PgPool;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::error::AppResult;

/// Timing of a synchronous wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Sleep between store reads.
    pub poll_interval: Duration,
    /// Overall deadline, measured from the start of the wait.
    pub deadline: Duration,
}

/// How a wait ended.
#[derive(Debug)]
pub enum WaitOutcome {
    Completed(Job),
    Failed(Job),
    /// The deadline passed while the job was still pending or processing.
    TimedOut,
}

/// Result of [`wait_for_terminal`].
#[derive(Debug)]
pub struct Waited {
    pub outcome: WaitOutcome,
    /// Distinct statuses observed, in order.
    pub observed: Vec<JobStatus>,
}

/// Wait until job `id` reaches a terminal status or `options.deadline`
/// elapses.
///
/// Fails with not-found if the job disappears (e.g. a bulk clear) while
/// being waited on.
pub async fn wait_for_terminal(
    pool: &PgPool,
    event_bus: &EventBus,
    id: &str,
    options: &WaitOptions,
) -> AppResult<Waited> {
    // Subscribe before the first read so no event between the two is lost.
    let mut events = event_bus.subscribe();
    let deadline = Instant::now() + options.deadline;
    let mut observed: Vec<JobStatus> = Vec::new();

    loop {
        let job = JobRepo::find_by_id(pool, id)
            .await?
            .ok_or_else(|| CoreError::job_not_found(id))?;

        if observed.last() != Some(&job.status) {
            tracing::debug!(job_id = id, status = %job.status, "Waiting on job");
            observed.push(job.status);
        }

        let outcome = match job.status {
            JobStatus::Completed => Some(WaitOutcome::Completed(job)),
            JobStatus::Failed => Some(WaitOutcome::Failed(job)),
            JobStatus::Pending | JobStatus::Processing => None,
        };
        if let Some(outcome) = outcome {
            return Ok(Waited { outcome, observed });
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(
                job_id = id,
                deadline_secs = options.deadline.as_secs(),
                "Gave up waiting on job",
            );
            return Ok(Waited {
                outcome: WaitOutcome::TimedOut,
                observed,
            });
        }

        let nap = options.poll_interval.min(deadline - now);
        tokio::select! {
            _ = tokio::time::sleep(nap) => {}
            _ = next_event_for(&mut events, id) => {}
        }
    }
}

/// Resolve on the next event about `id`, or when events were missed.
async fn next_event_for(events: &mut broadcast::Receiver<JobEvent>, id: &str) {
    loop {
        match events.recv().await {
            Ok(event) if event.job_id == id => return,
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => return,
            // Bus gone: fall back to interval polling only.
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}
