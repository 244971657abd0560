//! HTTP tests for the video generation flow.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{age_job, body_bytes, body_json, get, post_json, upload_video};
use imagine_db::models::job::CreateJob;
use imagine_db::repositories::JobRepo;
use serde_json::json;
use sqlx::PgPool;

async fn create_video(app: &common::TestApp, prompt: &str) -> String {
    let response = post_json(
        app.router(),
        "/v1/videos/generations",
        json!({"prompt": prompt}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn claim_video(app: &common::TestApp) -> serde_json::Value {
    let response = get(app.router(), "/extension/poll?mode=video&client_id=tab-1").await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn create_returns_pending_generation(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = post_json(
        app.router(),
        "/v1/videos/generations",
        json!({"prompt": "sunset lake", "image": "aGVsbG8="}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["id"].as_str().unwrap().starts_with("job_"));
    assert_eq!(json["object"], "videos.generation");
    assert_eq!(json["model"], "grok");
    assert_eq!(json["status"], "pending");
    assert!(json["video_url"].is_null());
    assert!(json["error"].is_null());
    assert!(json["created"].is_i64());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn empty_prompt_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = post_json(app.router(), "/v1/videos/generations", json!({"prompt": "   "})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_generation_is_404(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = get(app.router(), "/v1/videos/generations/job_0000").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn chat_job_is_not_a_video_generation(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let chat = JobRepo::create(app.pool(), &CreateJob::chat("hello", json!({"messages": []})))
        .await
        .unwrap();

    let response = get(app.router(), &format!("/v1/videos/generations/{}", chat.id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Full lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn video_job_round_trip(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let id = create_video(&app, "sunset lake").await;

    let claimed = claim_video(&app).await;
    assert_eq!(claimed["job_id"], id.as_str());
    assert_eq!(claimed["job_type"], "video");
    assert_eq!(claimed["client_id"], "tab-1");
    assert_eq!(claimed["prompt"], "sunset lake");
    assert_eq!(claimed["timeout_seconds"], 300);

    let status = body_json(get(app.router(), &format!("/v1/videos/generations/{id}")).await).await;
    assert_eq!(status["status"], "processing");
    assert!(status["video_url"].is_null());

    let artifact: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
    let response = upload_video(app.router(), &id, &artifact).await;
    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["status"], "ok");
    assert_eq!(ack["job_id"], id.as_str());

    let status = body_json(get(app.router(), &format!("/v1/videos/generations/{id}")).await).await;
    assert_eq!(status["status"], "completed");
    assert_eq!(
        status["video_url"],
        format!("http://test.local/videos/{id}.mp4").as_str()
    );

    let download = get(app.router(), &format!("/videos/{id}.mp4")).await;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(download.headers().get("content-type").unwrap(), "video/mp4");
    assert_eq!(body_bytes(download).await, artifact);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn download_supports_range_requests(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let id = create_video(&app, "waves").await;
    claim_video(&app).await;
    let artifact: Vec<u8> = (0..100u8).collect();
    upload_video(app.router(), &id, &artifact).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/videos/{id}.mp4"))
        .header("range", "bytes=10-19")
        .body(Body::empty())
        .unwrap();
    let response = common::send(app.router(), request).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_bytes(response).await, artifact[10..20].to_vec());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn missing_video_is_404(pool: PgPool) {
    let app = common::build_test_app(pool).await;

    let response = get(app.router(), "/videos/job_0123abcd.mp4").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app.router(), "/videos/not-a-video.txt").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Staleness
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn abandoned_video_job_is_failed_by_the_sweep(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let id = create_video(&app, "slow render").await;
    claim_video(&app).await;

    // Past the 300s video deadline; the next poll sweeps it.
    age_job(app.pool(), &id, 301.0).await;
    let response = get(app.router(), "/extension/poll?mode=video").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let status = body_json(get(app.router(), &format!("/v1/videos/generations/{id}")).await).await;
    assert_eq!(status["status"], "failed");
    assert_eq!(status["error"], "Video generation timed out after 300s");
    assert!(status["video_url"].is_null());

    // The worker finishing late is rejected and nothing is stored.
    let response = upload_video(app.router(), &id, b"late bytes").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(app.state.storage.path_for(&id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn pending_video_job_is_not_swept(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let id = create_video(&app, "queued").await;
    age_job(app.pool(), &id, 10_000.0).await;

    // A chat poll sweeps but must leave the pending video job alone.
    let response = get(app.router(), "/extension/poll?mode=chat").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let status = body_json(get(app.router(), &format!("/v1/videos/generations/{id}")).await).await;
    assert_eq!(status["status"], "pending");
}
