//! Periodic staleness sweep.
//!
//! Workers trigger a sweep on every poll; this task covers the case where
//! no worker polls at all, so stuck jobs still fail on time.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::dispatcher::Dispatcher;

/// Run the sweep every `interval` until `cancel` is triggered.
pub async fn run(dispatcher: Dispatcher, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        video_timeout_secs = dispatcher.timeouts().video.as_secs(),
        chat_timeout_secs = dispatcher.timeouts().chat.as_secs(),
        "Stale sweep job started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stale sweep job stopping");
                break;
            }
            _ = ticker.tick() => {
                match dispatcher.sweep().await {
                    Ok(swept) if !swept.is_empty() => {
                        tracing::info!(count = swept.len(), "Stale sweep: failed expired jobs");
                    }
                    Ok(_) => tracing::debug!("Stale sweep: nothing expired"),
                    Err(e) => tracing::error!(error = %e, "Stale sweep failed"),
                }
            }
        }
    }
}
