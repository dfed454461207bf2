//! Connection Manager (spec.md §4.4, C5): owns one device's protocol
//! socket end to end. Spawned by the Device Supervisor, one task per live
//! device; tears itself down on terminal disconnects or loss of ownership.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;
use wa_baileys::{
    Browser, ConnectionState, ProtocolClient, SocketError, SocketEvent, SocketTimeouts, WaSocket,
};
use wa_cache::Cache;
use wa_protocol::DisconnectReason;
use wa_store::{ConnectionMethod, DeviceStatus};

use crate::credentials::PgAuthState;
use crate::socket_map::SocketMap;

const WIRE_VERSION: [u32; 3] = [2, 3000, 0];
const PAIRING_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct ConnectionManagerCtx {
    pub pool: PgPool,
    pub cache: Arc<dyn Cache>,
    pub protocol: Arc<dyn ProtocolClient>,
    pub server_id: String,
    pub sockets: SocketMap,
}

fn browser_identity() -> Browser {
    Browser {
        name: "WaFleet".to_owned(),
        platform: "Linux".to_owned(),
        version: "1.0.0".to_owned(),
    }
}

/// Drives one device until it reaches a terminal state or this server loses
/// ownership of it. `recovery` starts true when the supervisor believes
/// valid credentials already exist (spec.md §4.4 "Recovery mode").
pub async fn run(device_id: Uuid, ctx: ConnectionManagerCtx, mut recovery: bool) {
    let mut pairing_requested = false;

    loop {
        let Ok(Some(device)) = wa_store::devices::get_device(&ctx.pool, device_id).await else {
            return;
        };
        if device.assigned_server_id.as_deref() != Some(ctx.server_id.as_str()) {
            return;
        }
        if device.status == DeviceStatus::Disconnected {
            return;
        }

        let auth_state = PgAuthState::load(ctx.pool.clone(), device_id).await;
        let (socket, mut events) = ctx
            .protocol
            .make_socket(WIRE_VERSION, auth_state.clone(), browser_identity(), SocketTimeouts::default())
            .await;

        ctx.sockets.insert(device_id, socket.clone()).await;

        let mut relaunch: Option<(Duration, bool)> = None;
        let mut terminal = false;

        while let Some(event) = events.recv().await {
            match event {
                SocketEvent::ConnectionUpdate(update) => {
                    if let Some(qr) = &update.qr {
                        if device.connection_method == ConnectionMethod::Qr && !recovery {
                            let _ = wa_store::devices::save_qr(&ctx.pool, device_id, qr).await;
                            ctx.cache
                                .set(
                                    &wa_cache::keys::qr(&device_id.to_string()),
                                    serde_json::json!(qr),
                                    wa_cache::QR_TTL,
                                )
                                .await;
                        }
                    }

                    match update.connection {
                        ConnectionState::Connecting => {
                            let should_pair = device.connection_method == ConnectionMethod::Pairing
                                && !recovery
                                && !pairing_requested
                                && update.qr.is_none();
                            if should_pair {
                                pairing_requested = true;
                                if let Some(phone) = device.pairing_phone.clone() {
                                    request_pairing_code(&ctx, device_id, &socket, &phone).await;
                                }
                            }
                        }
                        ConnectionState::Open => {
                            let creds = auth_state.load_creds().await;
                            let bound_phone = creds
                                .me
                                .as_ref()
                                .map(|m| m.id.user.clone())
                                .unwrap_or_default();
                            let blob = serde_json::json!({"registered": creds.registered});
                            let _ = wa_store::devices::mark_authenticated(
                                &ctx.pool,
                                device_id,
                                &bound_phone,
                                blob,
                                &ctx.server_id,
                            )
                            .await;
                            let _ = wa_store::events::log_connection_event(
                                &ctx.pool,
                                device_id,
                                "authenticated",
                                None,
                            )
                            .await;
                        }
                        ConnectionState::Close => {
                            if let Some(info) = &update.last_disconnect {
                                let reason = DisconnectReason::classify(info.code);
                                relaunch = apply_disconnect(&ctx, device_id, reason, &mut terminal).await;
                            } else {
                                terminal = true;
                            }
                            socket.end().await;
                            ctx.sockets.remove(device_id).await;
                            break;
                        }
                    }
                }
                SocketEvent::CredsUpdate(creds) => {
                    auth_state.save_creds(&creds).await;
                }
                SocketEvent::MessagesUpsert(_) => {
                    // Message archival lives outside this system (spec.md §1).
                }
            }
        }

        if terminal {
            return;
        }
        match relaunch {
            Some((delay, next_recovery)) => {
                tokio::time::sleep(delay).await;
                recovery = next_recovery;
                pairing_requested = false;
            }
            None => return,
        }
    }
}

async fn apply_disconnect(
    ctx: &ConnectionManagerCtx,
    device_id: Uuid,
    reason: DisconnectReason,
    terminal: &mut bool,
) -> Option<(Duration, bool)> {
    match reason {
        DisconnectReason::RestartRequired => reason.relaunch_delay().map(|d| (d, true)),
        DisconnectReason::AuthFailure => {
            let _ = wa_store::devices::wipe_auth_failure(&ctx.pool, device_id).await;
            reason.relaunch_delay().map(|d| (d, false))
        }
        DisconnectReason::LoggedOut => {
            let _ = wa_store::devices::wipe_logged_out(&ctx.pool, device_id).await;
            *terminal = true;
            None
        }
        DisconnectReason::Transient(_) => {
            let registered = PgAuthState::load(ctx.pool.clone(), device_id)
                .await
                .load_creds()
                .await
                .registered;
            reason.relaunch_delay().map(|d| (d, registered))
        }
    }
}

/// Pairing-code request with retry (spec.md §4.4 failure policy): up to 3
/// attempts, backoff 2s/4s/6s; a rate-limit response aborts retries.
async fn request_pairing_code(
    ctx: &ConnectionManagerCtx,
    device_id: Uuid,
    socket: &Arc<dyn WaSocket>,
    phone: &str,
) {
    let Ok(normalized) = wa_protocol::normalize_phone(phone) else {
        let _ = wa_store::devices::mark_error(&ctx.pool, device_id, "invalid pairing phone number").await;
        return;
    };

    for attempt in 1..=PAIRING_MAX_ATTEMPTS {
        match socket.request_pairing_code(&normalized).await {
            Ok(raw) => {
                let formatted = wa_protocol::format_pairing_code(&raw).unwrap_or(raw);
                let _ = wa_store::devices::save_pairing_code(&ctx.pool, device_id, &formatted).await;
                ctx.cache
                    .set(
                        &wa_cache::keys::pairing(&device_id.to_string()),
                        serde_json::json!(formatted),
                        wa_cache::PAIRING_TTL,
                    )
                    .await;
                return;
            }
            Err(SocketError::RateLimited) => {
                let _ = wa_store::devices::mark_error(
                    &ctx.pool,
                    device_id,
                    "rate limited requesting pairing code, try again later",
                )
                .await;
                return;
            }
            Err(SocketError::AlreadyRegistered) => {
                let _ = wa_store::devices::mark_error(
                    &ctx.pool,
                    device_id,
                    "pairing code cannot be issued for already-registered credentials",
                )
                .await;
                return;
            }
            Err(err) if attempt < PAIRING_MAX_ATTEMPTS => {
                tracing::warn!(device_id = %device_id, attempt, error = %err, "pairing code request failed, retrying");
                tokio::time::sleep(Duration::from_secs(2 * attempt as u64)).await;
            }
            Err(err) => {
                let _ = wa_store::devices::mark_error(&ctx.pool, device_id, &err.to_string()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wa_baileys::{Creds, MockClient};
    use wa_cache::InMemoryCache;

    fn ctx(pool: PgPool, protocol: Arc<dyn ProtocolClient>) -> ConnectionManagerCtx {
        ConnectionManagerCtx {
            pool,
            cache: Arc::new(InMemoryCache::new()),
            protocol,
            server_id: "backend-test".to_owned(),
            sockets: SocketMap::new(),
        }
    }

    #[tokio::test]
    async fn manager_returns_immediately_for_unknown_device() {
        let pool = wa_test_utils::lazy_pool();
        let client: Arc<dyn ProtocolClient> = Arc::new(MockClient::new());
        let c = ctx(pool, client);
        // No device row exists for this id, so `get_device` errors against
        // the lazy pool and the loop returns without panicking.
        let result = tokio::time::timeout(Duration::from_millis(200), run(Uuid::new_v4(), c, false)).await;
        assert!(result.is_ok());
    }

    #[test]
    fn disconnect_policy_picks_relaunch_delay_matching_classification() {
        assert_eq!(
            DisconnectReason::classify(515).relaunch_delay(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            DisconnectReason::classify(401).relaunch_delay(),
            Some(Duration::from_millis(1000))
        );
        assert_eq!(DisconnectReason::classify(440).relaunch_delay(), None);
    }

    #[test]
    fn creds_fresh_starts_unregistered() {
        assert!(!Creds::fresh().registered);
    }
}
