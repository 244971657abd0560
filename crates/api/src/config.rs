use std::num::NonZeroU64;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use imagine_db::models::job::StaleTimeouts;

use crate::engine::wait::WaitOptions;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In production,
/// override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Prefix for synthesized `video_url`s, without a trailing slash.
    pub public_base_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`).
    pub request_timeout_secs: u64,
    /// Directory holding uploaded video artifacts.
    pub video_storage_path: PathBuf,
    /// Artifact retention in days. `0` disables cleanup.
    pub max_video_age_days: u64,
    /// Body limit for the artifact upload endpoint.
    pub max_upload_bytes: usize,
    /// Processing staleness timeout for video jobs.
    pub job_timeout_secs: u64,
    /// Processing staleness timeout for chat jobs.
    pub chat_job_timeout_secs: u64,
    /// Overall deadline of the synchronous chat wait.
    pub chat_completion_wait_secs: u64,
    /// Sleep between store reads while waiting on a chat job.
    pub chat_poll_interval_ms: u64,
    /// Period of the background stale sweep. `0` disables it.
    pub stale_sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                   |
    /// |--------------------------------|---------------------------|
    /// | `HOST`                         | `0.0.0.0`                 |
    /// | `PORT`                         | `8000`                    |
    /// | `PUBLIC_BASE_URL`              | `http://localhost:{PORT}` |
    /// | `CORS_ORIGINS`                 | `*`                       |
    /// | `REQUEST_TIMEOUT_SECS`         | `120`                     |
    /// | `VIDEO_STORAGE_PATH`           | `./videos`                |
    /// | `MAX_VIDEO_AGE_DAYS`           | `7`                       |
    /// | `MAX_UPLOAD_BYTES`             | `268435456`               |
    /// | `JOB_TIMEOUT_SECONDS`          | `300`                     |
    /// | `CHAT_JOB_TIMEOUT_SECONDS`     | `60`                      |
    /// | `CHAT_COMPLETION_WAIT_SECONDS` | `60`                      |
    /// | `CHAT_POLL_INTERVAL_MS`        | `1000`                    |
    /// | `STALE_SWEEP_INTERVAL_SECS`    | `30`                      |
    ///
    /// Panics on unparsable values, and on a zero `CHAT_POLL_INTERVAL_MS`,
    /// so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_or("PORT", 8000);

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into()),
        );

        let video_storage_path = std::env::var("VIDEO_STORAGE_PATH")
            .unwrap_or_else(|_| "./videos".into())
            .into();

        Self {
            host,
            port,
            public_base_url,
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 120),
            video_storage_path,
            max_video_age_days: env_or("MAX_VIDEO_AGE_DAYS", 7),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 256 * 1024 * 1024),
            job_timeout_secs: env_or("JOB_TIMEOUT_SECONDS", 300),
            chat_job_timeout_secs: env_or("CHAT_JOB_TIMEOUT_SECONDS", 60),
            chat_completion_wait_secs: env_or("CHAT_COMPLETION_WAIT_SECONDS", 60),
            chat_poll_interval_ms: env_nonzero_or("CHAT_POLL_INTERVAL_MS", 1000),
            stale_sweep_interval_secs: env_or("STALE_SWEEP_INTERVAL_SECS", 30),
        }
    }

    /// Per-type processing deadlines for the staleness sweep.
    pub fn stale_timeouts(&self) -> StaleTimeouts {
        StaleTimeouts {
            video: Duration::from_secs(self.job_timeout_secs),
            chat: Duration::from_secs(self.chat_job_timeout_secs),
        }
    }

    /// Timing of the synchronous chat wait.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            poll_interval: Duration::from_millis(self.chat_poll_interval_ms),
            deadline: Duration::from_secs(self.chat_completion_wait_secs),
        }
    }

    /// Public download URL of a video artifact.
    pub fn video_url(&self, job_id: &str) -> String {
        format!("{}/videos/{job_id}.mp4", self.public_base_url)
    }

    /// Whether CORS should accept any origin.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => default,
    }
}

/// Like [`env_or`], but a configured `0` is rejected.
fn env_nonzero_or(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => parse_nonzero(key, &raw),
        Err(_) => default,
    }
}

fn parse_nonzero(key: &str, raw: &str) -> u64 {
    parse_value::<NonZeroU64>(key, raw).get()
}

fn parse_value<T>(key: &str, raw: &str) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}"))
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
