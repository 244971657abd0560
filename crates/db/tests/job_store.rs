//! Integration tests for the job store: creation, claim semantics,
//! guarded status transitions, listing and bulk clear.

use std::collections::HashSet;

use assert_matches::assert_matches;
use imagine_db::models::job::{CreateJob, JobListQuery};
use imagine_db::models::status::{JobStatus, JobType};
use imagine_db::repositories::JobRepo;
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn video_job(pool: &PgPool, prompt: &str) -> String {
    JobRepo::create(pool, &CreateJob::video(prompt, None))
        .await
        .unwrap()
        .id
}

async fn chat_job(pool: &PgPool, prompt: &str) -> String {
    let payload = json!({"model": "grok-vision", "messages": [{"role": "user", "content": prompt}]});
    JobRepo::create(pool, &CreateJob::chat(prompt, payload))
        .await
        .unwrap()
        .id
}

/// Pin `created_at` to `secs_ago` seconds in the past.
async fn set_age(pool: &PgPool, id: &str, secs_ago: f64) {
    sqlx::query("UPDATE jobs SET created_at = NOW() - make_interval(secs => $2) WHERE id = $1")
        .bind(id)
        .bind(secs_ago)
        .execute(pool)
        .await
        .unwrap();
}

async fn status_of(pool: &PgPool, id: &str) -> JobStatus {
    JobRepo::find_by_id(pool, id).await.unwrap().unwrap().status
}

// ---------------------------------------------------------------------------
// Create / get
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn create_inserts_pending_job(pool: PgPool) {
    let job = JobRepo::create(&pool, &CreateJob::video("sunset lake", Some("aGVsbG8=".into())))
        .await
        .unwrap();

    assert!(job.id.starts_with("job_"));
    assert_eq!(job.job_type, JobType::Video);
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.prompt, "sunset lake");
    assert_eq!(job.image.as_deref(), Some("aGVsbG8="));
    assert!(job.client_id.is_none());
    assert!(job.result.is_none());
    assert!(job.error.is_none());
    assert!(job.completed_at.is_none());

    let fetched = JobRepo::find_by_id(&pool, &job.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, job.id);
    assert_eq!(fetched.created_at, job.created_at);
}

#[sqlx::test]
async fn chat_job_keeps_request_payload(pool: PgPool) {
    let id = chat_job(&pool, "what is 6 x 7?").await;
    let job = JobRepo::find_by_id(&pool, &id).await.unwrap().unwrap();

    assert_eq!(job.job_type, JobType::Chat);
    let payload = job.request_payload.unwrap();
    assert_eq!(payload["messages"][0]["content"], "what is 6 x 7?");
}

#[sqlx::test]
async fn get_unknown_id_returns_none(pool: PgPool) {
    assert!(JobRepo::find_by_id(&pool, "job_doesnotexist").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn claim_respects_fifo_within_type(pool: PgPool) {
    let first = video_job(&pool, "first").await;
    let second = video_job(&pool, "second").await;
    set_age(&pool, &first, 2.0).await;
    set_age(&pool, &second, 1.0).await;

    let a = JobRepo::claim_next(&pool, JobType::Video, "w1").await.unwrap().unwrap();
    let b = JobRepo::claim_next(&pool, JobType::Video, "w1").await.unwrap().unwrap();

    assert_eq!(a.id, first);
    assert_eq!(b.id, second);
    assert!(JobRepo::claim_next(&pool, JobType::Video, "w1").await.unwrap().is_none());
}

#[sqlx::test]
async fn claim_is_scoped_to_job_type(pool: PgPool) {
    let video = video_job(&pool, "clip").await;
    let chat = chat_job(&pool, "hello").await;

    let claimed = JobRepo::claim_next(&pool, JobType::Chat, "chat-worker")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(claimed.id, chat);
    assert_eq!(claimed.status, JobStatus::Processing);
    assert_eq!(claimed.client_id.as_deref(), Some("chat-worker"));
    assert_eq!(status_of(&pool, &video).await, JobStatus::Pending);
}

#[sqlx::test]
async fn claimed_job_is_never_handed_out_again(pool: PgPool) {
    let id = video_job(&pool, "once").await;

    let claimed = JobRepo::claim_next(&pool, JobType::Video, "w1").await.unwrap();
    assert_eq!(claimed.map(|j| j.id), Some(id));

    assert!(JobRepo::claim_next(&pool, JobType::Video, "w2").await.unwrap().is_none());
}

#[sqlx::test]
async fn concurrent_claims_hand_out_each_job_exactly_once(pool: PgPool) {
    const JOBS: usize = 5;
    const WORKERS: usize = 12;

    let mut created = HashSet::new();
    for i in 0..JOBS {
        created.insert(video_job(&pool, &format!("job {i}")).await);
    }
    let unrelated = chat_job(&pool, "not for video workers").await;

    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move {
                JobRepo::claim_next(&pool, JobType::Video, &format!("worker-{i}"))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut claimed = Vec::new();
    let mut empty = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Some(job) => claimed.push(job),
            None => empty += 1,
        }
    }

    assert_eq!(claimed.len(), JOBS);
    assert_eq!(empty, WORKERS - JOBS);

    let ids: HashSet<String> = claimed.iter().map(|j| j.id.clone()).collect();
    assert_eq!(ids, created, "each job claimed exactly once");

    let claimers: HashSet<String> = claimed.iter().filter_map(|j| j.client_id.clone()).collect();
    assert_eq!(claimers.len(), JOBS, "each claim went to a different worker");

    assert!(claimed.iter().all(|j| j.status == JobStatus::Processing));
    assert_eq!(status_of(&pool, &unrelated).await, JobStatus::Pending);
}

#[sqlx::test]
async fn peek_does_not_claim(pool: PgPool) {
    let id = chat_job(&pool, "peek").await;

    let peeked = JobRepo::peek_next_pending(&pool, Some(JobType::Chat)).await.unwrap().unwrap();
    assert_eq!(peeked.id, id);
    assert!(JobRepo::peek_next_pending(&pool, Some(JobType::Video)).await.unwrap().is_none());
    assert_eq!(JobRepo::peek_next_pending(&pool, None).await.unwrap().map(|j| j.id), Some(id.clone()));

    assert_eq!(status_of(&pool, &id).await, JobStatus::Pending);
    assert!(JobRepo::claim_next(&pool, JobType::Chat, "w").await.unwrap().is_some());
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn complete_records_result_and_completed_at(pool: PgPool) {
    let id = chat_job(&pool, "q").await;
    JobRepo::claim_next(&pool, JobType::Chat, "w").await.unwrap();

    assert!(JobRepo::complete(&pool, &id, "42").await.unwrap());

    let job = JobRepo::find_by_id(&pool, &id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result.as_deref(), Some("42"));
    assert_eq!(job.text_response(), Some("42"));
    assert!(job.error.is_none());
    assert!(job.completed_at.is_some());
}

#[sqlx::test]
async fn fail_records_error_only(pool: PgPool) {
    let id = video_job(&pool, "q").await;
    JobRepo::claim_next(&pool, JobType::Video, "w").await.unwrap();

    assert!(JobRepo::update_status(&pool, &id, JobStatus::Failed, Some("ignored"), Some("boom"))
        .await
        .unwrap());

    let job = JobRepo::find_by_id(&pool, &id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("boom"));
    assert!(job.result.is_none());
    assert!(job.completed_at.is_some());
}

#[sqlx::test]
async fn pending_job_cannot_skip_processing(pool: PgPool) {
    let id = video_job(&pool, "q").await;

    assert!(!JobRepo::complete(&pool, &id, "/videos/x.mp4").await.unwrap());
    assert!(!JobRepo::fail(&pool, &id, "nope").await.unwrap());
    assert_eq!(status_of(&pool, &id).await, JobStatus::Pending);
}

#[sqlx::test]
async fn terminal_jobs_are_immutable(pool: PgPool) {
    let id = chat_job(&pool, "q").await;
    JobRepo::claim_next(&pool, JobType::Chat, "w").await.unwrap();
    assert!(JobRepo::complete(&pool, &id, "first").await.unwrap());
    let before = JobRepo::find_by_id(&pool, &id).await.unwrap().unwrap();

    // Duplicate and late reports are rejected.
    assert!(!JobRepo::complete(&pool, &id, "second").await.unwrap());
    assert!(!JobRepo::fail(&pool, &id, "late failure").await.unwrap());
    for status in JobStatus::ALL {
        assert!(!JobRepo::update_status(&pool, &id, *status, Some("x"), Some("y")).await.unwrap());
    }

    let after = JobRepo::find_by_id(&pool, &id).await.unwrap().unwrap();
    assert_eq!(after.status, JobStatus::Completed);
    assert_eq!(after.result, before.result);
    assert_eq!(after.error, before.error);
    assert_eq!(after.completed_at, before.completed_at);
}

#[sqlx::test]
async fn update_unknown_job_reports_no_change(pool: PgPool) {
    assert!(!JobRepo::complete(&pool, "job_ffffffff", "x").await.unwrap());
}

// ---------------------------------------------------------------------------
// Listing / clear
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn list_is_newest_first_and_filterable(pool: PgPool) {
    let old = video_job(&pool, "old").await;
    let mid = chat_job(&pool, "mid").await;
    let new = video_job(&pool, "new").await;
    set_age(&pool, &old, 30.0).await;
    set_age(&pool, &mid, 20.0).await;
    set_age(&pool, &new, 10.0).await;
    JobRepo::claim_next(&pool, JobType::Video, "w").await.unwrap(); // claims `old`

    let all = JobRepo::list(&pool, &JobListQuery::default()).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec![new.as_str(), mid.as_str(), old.as_str()]);

    let pending = JobRepo::list(
        &pool,
        &JobListQuery {
            status: Some(JobStatus::Pending),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|j| j.status == JobStatus::Pending));

    let pending_video = JobRepo::list(
        &pool,
        &JobListQuery {
            status: Some(JobStatus::Pending),
            job_type: Some(JobType::Video),
            limit: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(pending_video.len(), 1);
    assert_eq!(pending_video[0].id, new);

    let limited = JobRepo::list(
        &pool,
        &JobListQuery {
            limit: Some(1),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, new);
}

#[sqlx::test]
async fn clear_all_deletes_everything(pool: PgPool) {
    video_job(&pool, "a").await;
    chat_job(&pool, "b").await;

    assert_eq!(JobRepo::clear_all(&pool).await.unwrap(), 2);
    assert!(JobRepo::list(&pool, &JobListQuery::default()).await.unwrap().is_empty());
    assert_matches!(JobRepo::peek_next_pending(&pool, None).await, Ok(None));
}
