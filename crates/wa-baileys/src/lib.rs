//! The WhatsApp Web protocol library, modeled as a black box (spec.md §1,
//! §6). This crate only states the capability contract the rest of the
//! workspace consumes — `connect`/`makeSocket`, `requestPairingCode`,
//! `sendMessage`, `logout`, `end`, `groupFetchAllParticipating`,
//! `onWhatsApp`, plus the `connection.update` / `creds.update` /
//! `messages.upsert` event streams — and a scriptable in-memory mock of it.
//! Implementing the real wire protocol is explicitly out of scope.

mod creds;
mod mock;

pub use creds::{Creds, MeInfo};
pub use mock::{MockClient, MockHandle};

use async_trait::async_trait;
use std::collections::HashMap;
use wa_protocol::Jid;

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket is not connected")]
    NotConnected,
    #[error("credentials are already registered; pairing code cannot be issued")]
    AlreadyRegistered,
    #[error("rate limited, retry after cooldown")]
    RateLimited,
    #[error("transport error: {0}")]
    Transport(String),
}

/// The keyed-map half of the credential interface (spec.md §4.1): batch
/// `get(type, ids)` and `set(map[type][id])` over pre-keys, sessions,
/// sender keys, app-state-sync keys, etc.
#[async_trait]
pub trait SignalKeyStore: Send + Sync {
    async fn get(&self, key_type: &str, ids: &[String]) -> HashMap<String, serde_json::Value>;
    async fn set(&self, data: HashMap<String, HashMap<String, Option<serde_json::Value>>>);
}

/// The credential surface the library mutates directly (spec.md §4.1).
#[async_trait]
pub trait AuthState: Send + Sync {
    async fn load_creds(&self) -> Creds;
    async fn save_creds(&self, creds: &Creds);
    fn keys(&self) -> &dyn SignalKeyStore;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectInfo {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUpdate {
    pub connection: ConnectionState,
    pub qr: Option<String>,
    pub last_disconnect: Option<DisconnectInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub from: Jid,
    pub text: Option<String>,
}

/// Everything the library can hand back over a socket's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    ConnectionUpdate(ConnectionUpdate),
    CredsUpdate(Creds),
    MessagesUpsert(Vec<IncomingMessage>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub jid: Jid,
    pub subject: String,
}

/// One device's live protocol socket (spec.md §4.4's "Connection Manager
/// owns a single device's protocol socket").
#[async_trait]
pub trait WaSocket: Send + Sync {
    async fn request_pairing_code(&self, phone: &str) -> Result<String, SocketError>;
    async fn send_message(&self, jid: &Jid, content: MessageContent) -> Result<(), SocketError>;
    async fn group_fetch_all_participating(&self) -> Result<Vec<GroupInfo>, SocketError>;
    async fn on_whatsapp(&self, jid: &Jid) -> Result<bool, SocketError>;
    async fn logout(&self) -> Result<(), SocketError>;
    async fn end(&self);
}

/// Browser identity string the library sends during the handshake.
#[derive(Debug, Clone)]
pub struct Browser {
    pub name: String,
    pub platform: String,
    pub version: String,
}

/// Per-socket timeouts (spec.md §5): handshake 60s, keep-alive 10s.
#[derive(Debug, Clone, Copy)]
pub struct SocketTimeouts {
    pub handshake: std::time::Duration,
    pub keep_alive: std::time::Duration,
}

impl Default for SocketTimeouts {
    fn default() -> Self {
        Self {
            handshake: std::time::Duration::from_secs(60),
            keep_alive: std::time::Duration::from_secs(10),
        }
    }
}

/// The library's entry point: `makeSocket(version, authState, browser,
/// timeouts)`, returning a live socket plus its event stream.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn make_socket(
        &self,
        wire_version: [u32; 3],
        auth_state: std::sync::Arc<dyn AuthState>,
        browser: Browser,
        timeouts: SocketTimeouts,
    ) -> (
        std::sync::Arc<dyn WaSocket>,
        tokio::sync::mpsc::UnboundedReceiver<SocketEvent>,
    );
}
