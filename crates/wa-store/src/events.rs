//! Connection event log (spec.md §6 "log tables for device connection
//! events and server actions"). Write-only from the core's perspective;
//! read by observability tooling out of this workspace's scope.

use sqlx::PgPool;
use uuid::Uuid;

pub async fn log_connection_event(
    pool: &PgPool,
    device_id: Uuid,
    event_type: &str,
    detail: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO device_connection_events (device_id, event_type, detail) VALUES ($1, $2, $3)",
    )
    .bind(device_id)
    .bind(event_type)
    .bind(detail)
    .execute(pool)
    .await?;
    Ok(())
}
