//! Durable broadcast queue (spec.md §4.5 C6). No message-broker crate
//! exists anywhere in this workspace's dependency stack, so the queue is a
//! Postgres table: `enqueue` inserts a pending job, `claim_next` uses
//! `FOR UPDATE SKIP LOCKED` so multiple server processes competing for
//! work never double-claim the same job.

use crate::models::{BroadcastJobRow, JobStatus};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

const MAX_ATTEMPTS: i32 = 3;
const BACKOFF_BASE_SECS: i64 = 5;

fn row_to_job(row: sqlx::postgres::PgRow) -> BroadcastJobRow {
    let status_raw: String = row.get("status");
    BroadcastJobRow {
        id: row.get("id"),
        broadcast_id: row.get("broadcast_id"),
        status: JobStatus::parse(&status_raw).unwrap_or(JobStatus::Failed),
        attempts: row.get("attempts"),
        next_attempt_at: row.get("next_attempt_at"),
    }
}

pub async fn enqueue(pool: &PgPool, broadcast_id: Uuid) -> Result<Uuid, sqlx::Error> {
    let row = sqlx::query(
        "INSERT INTO broadcast_jobs (broadcast_id, status, next_attempt_at) \
         VALUES ($1, 'pending', now()) RETURNING id",
    )
    .bind(broadcast_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

/// True if a job for this broadcast is pending or in flight (queueing tick
/// uses this to avoid double-enqueueing; spec.md §4.5).
pub async fn has_inflight_job(pool: &PgPool, broadcast_id: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        "SELECT EXISTS(SELECT 1 FROM broadcast_jobs WHERE broadcast_id = $1 \
         AND status IN ('pending', 'processing')) AS exists",
    )
    .bind(broadcast_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get::<bool, _>("exists"))
}

/// Claim one due job for this worker pool, skipping rows locked by other
/// workers/processes rather than blocking on them.
pub async fn claim_next(pool: &PgPool) -> Result<Option<BroadcastJobRow>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query(
        "SELECT id, broadcast_id, status, attempts, next_attempt_at FROM broadcast_jobs \
         WHERE status = 'pending' AND next_attempt_at <= now() \
         ORDER BY next_attempt_at ASC LIMIT 1 FOR UPDATE SKIP LOCKED",
    )
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        tx.commit().await?;
        return Ok(None);
    };
    let job = row_to_job(row);

    sqlx::query("UPDATE broadcast_jobs SET status = 'processing', updated_at = now() WHERE id = $1")
        .bind(job.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(Some(job))
}

pub async fn complete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE broadcast_jobs SET status = 'completed', updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Retry policy (spec.md §4.5): up to 3 attempts, exponential backoff base 5s.
pub async fn fail_and_maybe_retry(
    pool: &PgPool,
    id: Uuid,
    attempts_so_far: i32,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let attempts = attempts_so_far + 1;
    if attempts >= MAX_ATTEMPTS {
        sqlx::query(
            "UPDATE broadcast_jobs SET status = 'failed', attempts = $1, updated_at = now() \
             WHERE id = $2",
        )
        .bind(attempts)
        .bind(id)
        .execute(pool)
        .await?;
    } else {
        let backoff = BACKOFF_BASE_SECS * 2i64.pow(attempts as u32 - 1);
        let next_attempt_at = now + chrono::Duration::seconds(backoff);
        sqlx::query(
            "UPDATE broadcast_jobs SET status = 'pending', attempts = $1, \
             next_attempt_at = $2, updated_at = now() WHERE id = $3",
        )
        .bind(attempts)
        .bind(next_attempt_at)
        .bind(id)
        .execute(pool)
        .await?;
    }
    Ok(())
}
