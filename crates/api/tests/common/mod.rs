#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use imagine_api::config::ServerConfig;
use imagine_api::router::build_app_router;
use imagine_api::state::AppState;
use imagine_core::storage::VideoStorage;
use imagine_events::EventBus;
use serde_json::Value;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

pub const MULTIPART_BOUNDARY: &str = "imagine-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
///
/// The chat wait is short so timeout paths finish quickly; processing
/// timeouts keep their production defaults.
pub fn test_config(videos: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_base_url: "http://test.local".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        video_storage_path: videos.path().to_path_buf(),
        max_video_age_days: 7,
        max_upload_bytes: 1024 * 1024,
        job_timeout_secs: 300,
        chat_job_timeout_secs: 60,
        chat_completion_wait_secs: 2,
        chat_poll_interval_ms: 50,
        stale_sweep_interval_secs: 0,
    }
}

/// Application under test plus the temp directory backing its storage.
pub struct TestApp {
    pub state: AppState,
    _videos: TempDir,
}

impl TestApp {
    /// A fresh router over the shared state, with the production
    /// middleware stack.
    pub fn router(&self) -> Router {
        build_app_router(self.state.clone(), &self.state.config)
    }

    pub fn pool(&self) -> &PgPool {
        &self.state.pool
    }
}

pub async fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with(pool, |_| {}).await
}

/// Like [`build_test_app`] but lets the test adjust the configuration.
pub async fn build_test_app_with(pool: PgPool, tweak: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let videos = tempfile::tempdir().unwrap();
    let mut config = test_config(&videos);
    tweak(&mut config);

    let storage = VideoStorage::new(&config.video_storage_path);
    storage.init().await.unwrap();

    let state = AppState {
        pool,
        config: Arc::new(config),
        storage: Arc::new(storage),
        event_bus: Arc::new(EventBus::default()),
    };

    TestApp {
        state,
        _videos: videos,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// A field of a `multipart/form-data` body.
pub enum FormField<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub fn multipart_body(fields: &[FormField<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        match field {
            FormField::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            FormField::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(app: Router, uri: &str, fields: &[FormField<'_>]) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields)))
        .unwrap();
    send(app, request).await
}

/// Upload `data` as the video of `job_id`.
pub async fn upload_video(app: Router, job_id: &str, data: &[u8]) -> Response<Body> {
    post_multipart(
        app,
        "/extension/complete",
        &[
            FormField::Text("job_id", job_id),
            FormField::File {
                name: "video",
                file_name: "clip.mp4",
                content_type: "video/mp4",
                data,
            },
        ],
    )
    .await
}

// ---------------------------------------------------------------------------
// Body helpers
// ---------------------------------------------------------------------------

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap()
}

/// Move a job's `created_at` back by `secs` seconds.
pub async fn age_job(pool: &PgPool, id: &str, secs: f64) {
    sqlx::query("UPDATE jobs SET created_at = created_at - make_interval(secs => $2) WHERE id = $1")
        .bind(id)
        .bind(secs)
        .execute(pool)
        .await
        .unwrap();
}
