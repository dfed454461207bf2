//! Device repository (spec.md §3 "Device", §4.2-§4.4).

use crate::models::{ConnectionMethod, DeviceRow, DeviceStatus};
use sqlx::{PgPool, Row};
use uuid::Uuid;

fn row_to_device(row: sqlx::postgres::PgRow) -> DeviceRow {
    let status_raw: String = row.get("status");
    let method_raw: String = row.get("connection_method");
    DeviceRow {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        status: DeviceStatus::parse(&status_raw).unwrap_or(DeviceStatus::Error),
        connection_method: ConnectionMethod::parse(&method_raw).unwrap_or(ConnectionMethod::Qr),
        pairing_phone: row.get("pairing_phone"),
        qr_code: row.get("qr_code"),
        pairing_code: row.get("pairing_code"),
        bound_phone: row.get("bound_phone"),
        last_connected_at: row.get("last_connected_at"),
        session_blob: row.get("session_blob"),
        assigned_server_id: row.get("assigned_server_id"),
        error_message: row.get("error_message"),
        updated_at: row.get("updated_at"),
    }
}

const DEVICE_COLUMNS: &str = "id, user_id, name, status, connection_method, pairing_phone, \
     qr_code, pairing_code, bound_phone, last_connected_at, session_blob, \
     assigned_server_id, error_message, updated_at";

pub async fn create_device(
    pool: &PgPool,
    user_id: &str,
    name: &str,
    method: ConnectionMethod,
    pairing_phone: Option<&str>,
) -> Result<DeviceRow, sqlx::Error> {
    let row = sqlx::query(&format!(
        "INSERT INTO devices (user_id, name, status, connection_method, pairing_phone) \
         VALUES ($1, $2, 'disconnected', $3, $4) RETURNING {DEVICE_COLUMNS}"
    ))
    .bind(user_id)
    .bind(name)
    .bind(method.as_str())
    .bind(pairing_phone)
    .fetch_one(pool)
    .await?;
    Ok(row_to_device(row))
}

pub async fn get_device(pool: &PgPool, id: Uuid) -> Result<Option<DeviceRow>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_device))
}

/// Supervisor step 1: devices currently connecting or connected.
pub async fn list_active(pool: &PgPool) -> Result<Vec<DeviceRow>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {DEVICE_COLUMNS} FROM devices WHERE status IN ('connecting', 'connected')"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(row_to_device).collect())
}

/// Ownership validation (spec.md §4.2): always re-read, never cache.
pub async fn read_assigned_server(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT assigned_server_id FROM devices WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.and_then(|r| r.get("assigned_server_id")))
}

/// The atomic claim (spec.md §4.2): succeeds only if nobody beat us to it.
pub async fn claim_device(pool: &PgPool, id: Uuid, server_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE devices SET assigned_server_id = $1, updated_at = now() \
         WHERE id = $2 AND assigned_server_id IS NULL",
    )
    .bind(server_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Release assignment on reaper action or logout (assignment "preserved"
/// otherwise per spec.md's ownership lifecycle paragraph).
pub async fn clear_assignment(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE devices SET assigned_server_id = NULL, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_status(pool: &PgPool, id: Uuid, status: DeviceStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE devices SET status = $1, updated_at = now() WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// QR mode (spec.md §4.4): each refresh overwrites the prior payload and
/// clears any pairing code.
pub async fn save_qr(pool: &PgPool, id: Uuid, qr_code: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE devices SET qr_code = $1, pairing_code = NULL, updated_at = now() WHERE id = $2",
    )
    .bind(qr_code)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Pairing mode (spec.md §4.4): single-shot code, status chosen per the
/// open question resolved in DESIGN.md (waiting_pairing).
pub async fn save_pairing_code(pool: &PgPool, id: Uuid, code: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE devices SET pairing_code = $1, qr_code = NULL, status = 'waiting_pairing', \
         updated_at = now() WHERE id = $2",
    )
    .bind(code)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Authenticated transition (spec.md §4.4): bind phone, clear transient
/// fields, stamp connection time and persist the flushed session blob.
pub async fn mark_authenticated(
    pool: &PgPool,
    id: Uuid,
    bound_phone: &str,
    session_blob: serde_json::Value,
    server_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE devices SET status = 'connected', qr_code = NULL, pairing_code = NULL, \
         bound_phone = $1, session_blob = $2, assigned_server_id = $3, \
         last_connected_at = now(), error_message = NULL, updated_at = now() \
         WHERE id = $4",
    )
    .bind(bound_phone)
    .bind(session_blob)
    .bind(server_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn save_session_blob(
    pool: &PgPool,
    id: Uuid,
    session_blob: serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE devices SET session_blob = $1, updated_at = now() WHERE id = $2")
        .bind(session_blob)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// loggedOut: wipe credentials and phone, terminal, no relaunch.
pub async fn wipe_logged_out(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE devices SET status = 'disconnected', bound_phone = NULL, session_blob = NULL, \
         qr_code = NULL, pairing_code = NULL, error_message = NULL, updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Auth failure (401/405): wipe credentials/QR/pairing, reconnect fresh.
pub async fn wipe_auth_failure(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE devices SET status = 'connecting', session_blob = NULL, qr_code = NULL, \
         pairing_code = NULL, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_error(pool: &PgPool, id: Uuid, message: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE devices SET status = 'error', error_message = $1, updated_at = now() WHERE id = $2")
        .bind(message)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Supervisor step 5 / P8: devices stuck in status=connecting for >120s.
pub async fn find_stuck_connecting(
    pool: &PgPool,
    server_id: &str,
    older_than_seconds: i64,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id FROM devices WHERE assigned_server_id = $1 AND status = 'connecting' \
         AND updated_at < now() - make_interval(secs => $2)",
    )
    .bind(server_id)
    .bind(older_than_seconds as f64)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.get("id")).collect())
}

pub async fn gc_stuck_connecting(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE devices SET status = 'disconnected', qr_code = NULL, pairing_code = NULL, \
         session_blob = NULL, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Reaper (spec.md §4.2 failure model): reassign devices whose owning
/// server has gone stale, by clearing `assigned_server_id`.
pub async fn reap_devices_of_stale_servers(
    pool: &PgPool,
    stale_after_seconds: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE devices SET assigned_server_id = NULL, updated_at = now() \
         WHERE assigned_server_id IN ( \
             SELECT id FROM backend_servers \
             WHERE is_healthy = FALSE \
                OR last_health_check < now() - make_interval(secs => $1) \
         )",
    )
    .bind(stale_after_seconds as f64)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
