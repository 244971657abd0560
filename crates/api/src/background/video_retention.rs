//! Periodic cleanup of old video artifacts.
//!
//! Deletes stored videos older than the configured retention period. The
//! job rows are left alone; a completed job whose file was removed simply
//! 404s on download.

use std::sync::Arc;
use std::time::Duration;

use imagine_core::storage::VideoStorage;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Run the retention loop until `cancel` is triggered.
pub async fn run(storage: Arc<VideoStorage>, max_age_days: u64, cancel: CancellationToken) {
    let max_age = Duration::from_secs(max_age_days.saturating_mul(SECS_PER_DAY));

    tracing::info!(
        max_age_days,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        root = %storage.root().display(),
        "Video retention job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Video retention job stopping");
                break;
            }
            _ = interval.tick() => {
                match storage.remove_older_than(max_age).await {
                    Ok(0) => tracing::debug!("Video retention: nothing to purge"),
                    Ok(deleted) => tracing::info!(deleted, "Video retention: purged old videos"),
                    Err(e) => tracing::error!(error = %e, "Video retention: cleanup failed"),
                }
            }
        }
    }
}
