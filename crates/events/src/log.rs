//! Activity log subscriber.
//!
//! [`EventLogger`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes one structured tracing record per job event. It runs as a
//! long-lived background task and stops when the bus sender is dropped.

use tokio::sync::broadcast;

use crate::bus::{JobEvent, JobEventKind};

/// Background service that logs job lifecycle events.
pub struct EventLogger;

impl EventLogger {
    /// Run the logging loop until the channel is closed.
    pub async fn run(mut receiver: broadcast::Receiver<JobEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::record(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event logger shutting down");
                    break;
                }
            }
        }
    }

    fn record(event: &JobEvent) {
        let job_id = event.job_id.as_str();
        let job_type = event.job_type.name();
        match &event.kind {
            JobEventKind::Created => {
                tracing::info!(job_id, job_type, "job.created");
            }
            JobEventKind::Claimed { client_id } => {
                tracing::info!(job_id, job_type, client_id = %client_id, "job.claimed");
            }
            JobEventKind::Completed => {
                tracing::info!(job_id, job_type, "job.completed");
            }
            JobEventKind::Failed { error } => {
                tracing::warn!(job_id, job_type, error = %error, "job.failed");
            }
            JobEventKind::TimedOut { error } => {
                tracing::warn!(job_id, job_type, error = %error, "job.timed_out");
            }
        }
    }
}
