//! Backend-server repository (spec.md §3 "Server", §4.2).

use crate::models::ServerRow;
use sqlx::{PgPool, Row};

fn row_to_server(row: sqlx::postgres::PgRow) -> ServerRow {
    ServerRow {
        id: row.get("id"),
        url: row.get("url"),
        region: row.get("region"),
        priority: row.get("priority"),
        max_capacity: row.get("max_capacity"),
        is_active: row.get("is_active"),
        is_healthy: row.get("is_healthy"),
        last_health_check: row.get("last_health_check"),
        current_load: row.get("current_load"),
    }
}

const SERVER_SELECT: &str = "SELECT s.id, s.url, s.region, s.priority, s.max_capacity, \
     s.is_active, s.is_healthy, s.last_health_check, \
     (SELECT COUNT(*) FROM devices d WHERE d.assigned_server_id = s.id) AS current_load \
     FROM backend_servers s";

/// Boot-time registration (spec.md §4.2): upsert this server's row active.
pub async fn register(
    pool: &PgPool,
    id: &str,
    url: &str,
    region: &str,
    priority: i32,
    max_capacity: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO backend_servers (id, url, region, priority, max_capacity, is_active, is_healthy, last_health_check) \
         VALUES ($1, $2, $3, $4, $5, TRUE, TRUE, now()) \
         ON CONFLICT (id) DO UPDATE SET url = $2, region = $3, priority = $4, max_capacity = $5, \
             is_active = TRUE, last_health_check = now()",
    )
    .bind(id)
    .bind(url)
    .bind(region)
    .bind(priority)
    .bind(max_capacity)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_inactive(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE backend_servers SET is_active = FALSE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Health tick (spec.md §4.2): refreshed every 60s.
pub async fn refresh_health(pool: &PgPool, id: &str, healthy: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE backend_servers SET is_healthy = $1, last_health_check = now() WHERE id = $2")
        .bind(healthy)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get(pool: &PgPool, id: &str) -> Result<Option<ServerRow>, sqlx::Error> {
    let row = sqlx::query(&format!("{SERVER_SELECT} WHERE s.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_server))
}

/// Best-server selection (spec.md §4.2): healthy, active, under capacity,
/// ordered priority desc, load asc, id asc. The source's "response time
/// asc" tiebreak is dropped — nothing in this workspace measures it (see
/// DESIGN.md).
pub async fn select_candidates(pool: &PgPool) -> Result<Vec<ServerRow>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "{SERVER_SELECT} \
         WHERE s.is_active AND s.is_healthy \
           AND (SELECT COUNT(*) FROM devices d WHERE d.assigned_server_id = s.id) < s.max_capacity \
         ORDER BY s.priority DESC, current_load ASC, s.id ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(row_to_server).collect())
}

pub async fn log_action(
    pool: &PgPool,
    server_id: &str,
    action: &str,
    detail: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO server_action_logs (server_id, action, detail) VALUES ($1, $2, $3)")
        .bind(server_id)
        .bind(action)
        .bind(detail)
        .execute(pool)
        .await?;
    Ok(())
}
