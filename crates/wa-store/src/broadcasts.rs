//! Broadcast repository (spec.md §3 "Broadcast", §4.5, §8 P5).

use crate::models::{BroadcastRow, BroadcastStatus};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

fn row_to_broadcast(row: sqlx::postgres::PgRow) -> BroadcastRow {
    let status_raw: String = row.get("status");
    BroadcastRow {
        id: row.get("id"),
        user_id: row.get("user_id"),
        device_id: row.get("device_id"),
        name: row.get("name"),
        message_template: row.get("message_template"),
        media_url: row.get("media_url"),
        media_type: row.get("media_type"),
        recipients: row.get("recipients"),
        delay_mode: row.get("delay_mode"),
        base_delay_ms: row.get("base_delay_ms"),
        batch_size: row.get("batch_size"),
        pause_between_batches_ms: row.get("pause_between_batches_ms"),
        randomize: row.get("randomize"),
        scheduled_at: row.get("scheduled_at"),
        status: BroadcastStatus::parse(&status_raw).unwrap_or(BroadcastStatus::Failed),
        sent_count: row.get("sent_count"),
        failed_count: row.get("failed_count"),
        updated_at: row.get("updated_at"),
    }
}

const COLUMNS: &str = "id, user_id, device_id, name, message_template, media_url, media_type, \
     recipients, delay_mode, base_delay_ms, batch_size, pause_between_batches_ms, randomize, \
     scheduled_at, status, sent_count, failed_count, updated_at";

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<BroadcastRow>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM broadcasts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_broadcast))
}

/// Only the status column, for the worker's per-recipient cancellation
/// check (spec.md §5 "Cancellation / timeouts").
pub async fn current_status(pool: &PgPool, id: Uuid) -> Result<Option<BroadcastStatus>, sqlx::Error> {
    let row = sqlx::query("SELECT status FROM broadcasts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| {
        let raw: String = r.get("status");
        BroadcastStatus::parse(&raw).unwrap_or(BroadcastStatus::Failed)
    }))
}

/// Scheduler promotion source (spec.md §4.5 C8): drafts whose time has come.
pub async fn list_due_drafts(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query("SELECT id FROM broadcasts WHERE status = 'draft' AND scheduled_at <= $1")
        .bind(now)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("id")).collect())
}

/// Atomic draft -> processing transition, keyed on (id, status=draft) so
/// two servers racing the scheduler tick cannot both enqueue the same
/// broadcast (spec.md §4.5).
pub async fn try_promote_to_processing(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE broadcasts SET status = 'processing', updated_at = now() \
         WHERE id = $1 AND status = 'draft'",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Queueing tick source (spec.md §4.5): processing broadcasts to re-check.
pub async fn list_processing(pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query("SELECT id FROM broadcasts WHERE status = 'processing'")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("id")).collect())
}

/// Counters only increase (spec.md P5); this adds to both atomically.
pub async fn add_counters(
    pool: &PgPool,
    id: Uuid,
    sent_delta: i32,
    failed_delta: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE broadcasts SET sent_count = sent_count + $1, failed_count = failed_count + $2, \
         updated_at = now() WHERE id = $3",
    )
    .bind(sent_delta)
    .bind(failed_delta)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_status(pool: &PgPool, id: Uuid, status: BroadcastStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE broadcasts SET status = $1, updated_at = now() WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
