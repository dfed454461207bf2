//! Device Supervisor (spec.md §4.3, C4): the 10s reconciliation loop. Sole
//! writer of the in-process socket map; spawns and tears down Connection
//! Manager tasks.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;
use wa_baileys::ProtocolClient;
use wa_cache::Cache;

use crate::config::STUCK_CONNECTING_SECS;
use crate::connection_manager::{self, ConnectionManagerCtx};
use crate::socket_map::SocketMap;

#[derive(Clone)]
pub struct SupervisorCtx {
    pub pool: PgPool,
    pub cache: Arc<dyn Cache>,
    pub protocol: Arc<dyn ProtocolClient>,
    pub server_id: String,
    pub sockets: SocketMap,
}

/// Tracks which devices already have a spawned Connection Manager task, so
/// a steady-state tick never double-spawns one (spec.md §4.3 idempotence).
#[derive(Clone, Default)]
struct Running {
    inner: Arc<Mutex<HashSet<Uuid>>>,
}

impl Running {
    async fn try_claim(&self, id: Uuid) -> bool {
        self.inner.lock().await.insert(id)
    }

    async fn release(&self, id: Uuid) {
        self.inner.lock().await.remove(&id);
    }

    async fn contains(&self, id: Uuid) -> bool {
        self.inner.lock().await.contains(&id)
    }
}

pub async fn run_forever(ctx: SupervisorCtx) {
    let running = Running::default();
    let mut interval = tokio::time::interval(crate::config::SUPERVISOR_TICK);
    loop {
        interval.tick().await;
        if let Err(err) = tick(&ctx, &running).await {
            tracing::warn!(error = %err, "supervisor tick failed");
        }
    }
}

async fn tick(ctx: &SupervisorCtx, running: &Running) -> Result<(), sqlx::Error> {
    let devices = wa_store::devices::list_active(&ctx.pool).await?;

    let mut mine_ids: HashSet<Uuid> = HashSet::new();

    for device in &devices {
        match device.assigned_server_id.as_deref() {
            None => {
                if device.status == wa_store::DeviceStatus::Connecting
                    && wa_store::devices::claim_device(&ctx.pool, device.id, &ctx.server_id).await?
                {
                    mine_ids.insert(device.id);
                    spawn_if_absent(ctx, running, device).await;
                }
            }
            Some(owner) if owner == ctx.server_id => {
                mine_ids.insert(device.id);
                spawn_if_absent(ctx, running, device).await;
            }
            Some(_) => {}
        }
    }

    for device in &devices {
        if mine_ids.contains(&device.id) {
            continue;
        }
        if running.contains(device.id).await {
            ctx.sockets.remove(device.id).await;
            running.release(device.id).await;
        }
    }

    let stuck = wa_store::devices::find_stuck_connecting(
        &ctx.pool,
        &ctx.server_id,
        STUCK_CONNECTING_SECS,
    )
    .await?;
    for device_id in stuck {
        wa_store::devices::gc_stuck_connecting(&ctx.pool, device_id).await?;
        ctx.sockets.remove(device_id).await;
        running.release(device_id).await;
    }

    Ok(())
}

async fn spawn_if_absent(ctx: &SupervisorCtx, running: &Running, device: &wa_store::models::DeviceRow) {
    if !running.try_claim(device.id).await {
        return;
    }
    let recovery = device
        .session_blob
        .as_ref()
        .and_then(|v| v.get("registered"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let cm_ctx = ConnectionManagerCtx {
        pool: ctx.pool.clone(),
        cache: ctx.cache.clone(),
        protocol: ctx.protocol.clone(),
        server_id: ctx.server_id.clone(),
        sockets: ctx.sockets.clone(),
    };
    let running = running.clone();
    let device_id = device.id;
    spawn_and_release_on_exit(device_id, cm_ctx, recovery, running);
}

fn spawn_and_release_on_exit(
    device_id: Uuid,
    cm_ctx: ConnectionManagerCtx,
    recovery: bool,
    running: Running,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        connection_manager::run(device_id, cm_ctx, recovery).await;
        running.release(device_id).await;
    })
}

/// Health tick (spec.md §4.2): refresh `last_health_check` every 60s.
pub async fn run_health_forever(pool: PgPool, server_id: String) {
    let mut interval = tokio::time::interval(crate::config::HEALTH_TICK);
    loop {
        interval.tick().await;
        if let Err(err) = wa_store::servers::refresh_health(&pool, &server_id, true).await {
            tracing::warn!(error = %err, "health tick failed");
        }
    }
}

/// Reaper (spec.md §4.2 failure model): reassign devices of stale servers.
pub async fn run_reaper_forever(pool: PgPool, stale_after_seconds: i64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        match wa_store::devices::reap_devices_of_stale_servers(&pool, stale_after_seconds).await {
            Ok(count) if count > 0 => tracing::info!(count, "reaper released stale device assignments"),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "reaper tick failed"),
        }
    }
}
