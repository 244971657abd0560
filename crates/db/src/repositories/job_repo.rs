//! Repository for the `jobs` table.
//!
//! Every mutation is a single conditional statement scoped to the rows it
//! touches; no lock is held beyond the statement itself. Status literals
//! always come from [`JobStatus`] / [`JobType`].

use chrono::Utc;
use imagine_core::types::new_job_id;
use sqlx::PgPool;

use crate::models::job::{CreateJob, Job, JobListQuery, StaleTimeouts, SweptJob};
use crate::models::status::{JobStatus, JobType, StatusId};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type_id, status_id, prompt, image, request_payload, \
    client_id, result, error, created_at, completed_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 1000;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 100;

/// Provides the job store operations.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new `pending` job with a freshly generated id.
    pub async fn create(pool: &PgPool, input: &CreateJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (id, job_type_id, status_id, prompt, image, request_payload) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(new_job_id())
            .bind(input.job_type)
            .bind(JobStatus::Pending)
            .bind(&input.prompt)
            .bind(&input.image)
            .bind(&input.request_payload)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its id.
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Oldest pending job, optionally restricted to one type.
    ///
    /// Read-only and NOT claim-safe: two callers can observe the same row.
    /// Dispatch must go through [`JobRepo::claim_next`].
    pub async fn peek_next_pending(
        pool: &PgPool,
        job_type: Option<JobType>,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id = $1 AND ($2::SMALLINT IS NULL OR job_type_id = $2) \
             ORDER BY created_at ASC, id ASC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Pending)
            .bind(job_type)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the oldest pending job of `job_type` for a worker.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` inside a single `UPDATE` so
    /// concurrent claimers never receive the same row; a claimer that finds
    /// every candidate locked moves on to the next one, and `None` means no
    /// pending job of that type was available.
    pub async fn claim_next(
        pool: &PgPool,
        job_type: JobType,
        client_id: &str,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $1, client_id = $2 \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE status_id = $3 AND job_type_id = $4 \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Processing)
            .bind(client_id)
            .bind(JobStatus::Pending)
            .bind(job_type)
            .fetch_optional(pool)
            .await
    }

    /// Move a job to `status`, recording `result` or `error` as appropriate.
    ///
    /// The write only applies when the row's current status is a legal
    /// predecessor of `status` (see [`JobStatus::predecessors`]), so a
    /// terminal job is never overwritten. `result` is stored only for
    /// `completed`, `error` only for `failed`, and `completed_at` is set
    /// for both.
    ///
    /// Returns `false` when the job does not exist or was not in a state
    /// that allows the transition.
    pub async fn update_status(
        pool: &PgPool,
        id: &str,
        status: JobStatus,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let (result, error) = match status {
            JobStatus::Completed => (result, None),
            JobStatus::Failed => (None, error),
            JobStatus::Pending | JobStatus::Processing => (None, None),
        };
        let allowed_from: Vec<StatusId> = status.predecessors().iter().map(|s| s.id()).collect();

        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, result = $3, error = $4, \
                 completed_at = CASE WHEN $5 THEN NOW() ELSE completed_at END \
             WHERE id = $1 AND status_id = ANY($6)",
        )
        .bind(id)
        .bind(status)
        .bind(result)
        .bind(error)
        .bind(status.is_terminal())
        .bind(&allowed_from)
        .execute(pool)
        .await?;

        Ok(outcome.rows_affected() > 0)
    }

    /// Mark a processing job as completed with its result.
    pub async fn complete(pool: &PgPool, id: &str, result: &str) -> Result<bool, sqlx::Error> {
        Self::update_status(pool, id, JobStatus::Completed, Some(result), None).await
    }

    /// Mark a processing job as failed. No automatic retry is performed.
    pub async fn fail(pool: &PgPool, id: &str, error: &str) -> Result<bool, sqlx::Error> {
        Self::update_status(pool, id, JobStatus::Failed, None, Some(error)).await
    }

    /// List jobs newest first, with optional status/type filters.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> Result<Vec<Job>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.status.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }

        if params.job_type.is_some() {
            conditions.push(format!("job_type_id = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${bind_idx}"
        );

        let mut q = sqlx::query_as::<_, Job>(&query);

        if let Some(status) = params.status {
            q = q.bind(status);
        }
        if let Some(job_type) = params.job_type {
            q = q.bind(job_type);
        }

        q.bind(limit).fetch_all(pool).await
    }

    /// Fail every `processing` job that has outlived its type's deadline.
    ///
    /// The deadline is measured from `created_at`. Each type is handled by
    /// one conditional `UPDATE` (`status = processing AND created_at <
    /// cutoff`), so a job completed or failed concurrently is left alone
    /// and a second sweep with no intervening change touches nothing.
    pub async fn sweep_stale(
        pool: &PgPool,
        timeouts: &StaleTimeouts,
    ) -> Result<Vec<SweptJob>, sqlx::Error> {
        let mut swept = Vec::new();

        for &job_type in JobType::ALL {
            let timeout = timeouts.for_type(job_type);
            let Some(cutoff) = chrono::Duration::from_std(timeout)
                .ok()
                .and_then(|age| Utc::now().checked_sub_signed(age))
            else {
                continue;
            };

            let rows = sqlx::query_as::<_, SweptJob>(
                "UPDATE jobs \
                 SET status_id = $1, error = $2, result = NULL, completed_at = NOW() \
                 WHERE status_id = $3 AND job_type_id = $4 AND created_at < $5 \
                 RETURNING id, job_type_id",
            )
            .bind(JobStatus::Failed)
            .bind(timeouts.message_for(job_type))
            .bind(JobStatus::Processing)
            .bind(job_type)
            .bind(cutoff)
            .fetch_all(pool)
            .await?;

            if !rows.is_empty() {
                tracing::warn!(
                    %job_type,
                    count = rows.len(),
                    timeout_secs = timeout.as_secs(),
                    "Failed stale processing jobs",
                );
            }
            swept.extend(rows);
        }

        Ok(swept)
    }

    /// Delete every job. Returns the number of rows removed.
    pub async fn clear_all(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let outcome = sqlx::query("DELETE FROM jobs").execute(pool).await?;
        Ok(outcome.rows_affected())
    }
}
