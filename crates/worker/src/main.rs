//! Reference worker that answers chat jobs by echoing the prompt.
//!
//! Useful for exercising a deployment end to end without a browser
//! extension attached. Video jobs are reported as errors.

use std::time::Duration;

use async_trait::async_trait;
use imagine_db::models::status::JobType;
use imagine_worker::protocol::PolledJob;
use imagine_worker::{ExtensionClient, JobHandler, JobOutput, Worker};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct EchoHandler;

#[async_trait]
impl JobHandler for EchoHandler {
    async fn handle(&self, job: &PolledJob) -> Result<JobOutput, String> {
        match job.job_type {
            JobType::Chat => Ok(JobOutput::Text(job.prompt.clone())),
            JobType::Video => Err("echo worker cannot render video".to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imagine_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server_url =
        std::env::var("WORKER_SERVER_URL").unwrap_or_else(|_| "http://localhost:8000".into());
    let mode: JobType = std::env::var("WORKER_MODE")
        .unwrap_or_else(|_| "chat".into())
        .parse()?;
    let client_id = std::env::var("WORKER_CLIENT_ID").unwrap_or_else(|_| "echo-worker".into());
    let poll_interval_ms: u64 = std::env::var("WORKER_POLL_INTERVAL_MS")
        .unwrap_or_else(|_| "2000".into())
        .parse()?;

    let worker = Worker::new(ExtensionClient::new(server_url), EchoHandler, mode, client_id)
        .with_poll_interval(Duration::from_millis(poll_interval_ms));

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, stopping worker");
        }
        shutdown.cancel();
    });

    worker.run(cancel).await;
    Ok(())
}
