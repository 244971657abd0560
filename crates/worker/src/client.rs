//! HTTP client for the worker-facing endpoints of the job server.
//!
//! Wraps poll, completion and error reporting using [`reqwest`].

use imagine_core::storage::{VIDEO_CONTENT_TYPE, VIDEO_EXTENSION};
use imagine_db::models::status::JobType;
use reqwest::StatusCode;

use crate::protocol::{
    Ack, ChatCompleteRequest, ErrorReport, PolledJob, COMPLETE_CHAT_PATH, COMPLETE_VIDEO_PATH,
    ERROR_PATH, JOB_ID_FIELD, POLL_PATH, VIDEO_FIELD,
};

/// HTTP client for a single job server.
#[derive(Clone)]
pub struct ExtensionClient {
    client: reqwest::Client,
    base_url: String,
}

/// Errors from the worker client.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionClientError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Job server error ({status}): {body}")]
    Api {
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ExtensionClientError {
    /// The server rejected a report because the job already left
    /// `processing` (swept, or reported twice).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == StatusCode::CONFLICT.as_u16())
    }
}

impl ExtensionClient {
    /// Create a client for the server at `base_url`, e.g. `http://host:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Claim the next pending job of `mode`.
    ///
    /// Returns `None` when the server answers 204 (nothing to do).
    pub async fn poll(
        &self,
        mode: JobType,
        client_id: &str,
    ) -> Result<Option<PolledJob>, ExtensionClientError> {
        let response = self
            .client
            .get(self.url(POLL_PATH))
            .query(&[("mode", mode.name()), ("client_id", client_id)])
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Self::parse_response(response).await.map(Some)
    }

    /// Upload the finished video for `job_id`.
    pub async fn complete_video(
        &self,
        job_id: &str,
        video: Vec<u8>,
    ) -> Result<Ack, ExtensionClientError> {
        let part = reqwest::multipart::Part::bytes(video)
            .file_name(format!("{job_id}.{VIDEO_EXTENSION}"))
            .mime_str(VIDEO_CONTENT_TYPE)?;
        let form = reqwest::multipart::Form::new()
            .text(JOB_ID_FIELD, job_id.to_string())
            .part(VIDEO_FIELD, part);

        let response = self
            .client
            .post(self.url(COMPLETE_VIDEO_PATH))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Report the assistant text for a chat job.
    pub async fn complete_chat(
        &self,
        job_id: &str,
        content: &str,
    ) -> Result<Ack, ExtensionClientError> {
        let body = ChatCompleteRequest {
            job_id: job_id.to_string(),
            content: content.to_string(),
        };
        let response = self
            .client
            .post(self.url(COMPLETE_CHAT_PATH))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Report that the job could not be performed.
    pub async fn report_error(&self, job_id: &str, error: &str) -> Result<Ack, ExtensionClientError> {
        let body = ErrorReport {
            job_id: job_id.to_string(),
            error: error.to_string(),
        };
        let response = self
            .client
            .post(self.url(ERROR_PATH))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Return the response unchanged on a success status, otherwise an
    /// [`ExtensionClientError::Api`] carrying the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ExtensionClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ExtensionClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ExtensionClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
