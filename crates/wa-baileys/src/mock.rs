//! A scriptable in-memory stand-in for the protocol library, used by
//! Connection Manager tests and integration tests elsewhere in the
//! workspace. Each `make_socket` call records a [`MockHandle`] the test can
//! use to push events and inspect outgoing sends, in call order.

use crate::{
    AuthState, Browser, ConnectionUpdate, GroupInfo, MessageContent, ProtocolClient, SocketError,
    SocketEvent, SocketTimeouts, WaSocket,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use wa_protocol::Jid;

#[derive(Clone)]
pub struct MockHandle {
    event_tx: mpsc::UnboundedSender<SocketEvent>,
    inner: Arc<Mutex<MockSocketState>>,
}

#[derive(Default)]
struct MockSocketState {
    sent: Vec<(Jid, MessageContent)>,
    pairing_requests: Vec<String>,
    pairing_script: VecDeque<Result<String, SocketError>>,
    groups: Vec<GroupInfo>,
    ended: bool,
}

impl MockHandle {
    pub fn push_connection_update(&self, update: ConnectionUpdate) {
        let _ = self.event_tx.send(SocketEvent::ConnectionUpdate(update));
    }

    pub fn push_creds_update(&self, creds: crate::Creds) {
        let _ = self.event_tx.send(SocketEvent::CredsUpdate(creds));
    }

    pub fn sent_messages(&self) -> Vec<(Jid, MessageContent)> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn pairing_request_count(&self) -> usize {
        self.inner.lock().unwrap().pairing_requests.len()
    }

    /// Queue a response for the next `request_pairing_code` call. If the
    /// queue is empty, calls succeed with a fixed fake code.
    pub fn script_pairing_response(&self, result: Result<String, SocketError>) {
        self.inner.lock().unwrap().pairing_script.push_back(result);
    }

    pub fn set_groups(&self, groups: Vec<GroupInfo>) {
        self.inner.lock().unwrap().groups = groups;
    }

    pub fn is_ended(&self) -> bool {
        self.inner.lock().unwrap().ended
    }
}

struct MockSocket {
    registered_at_make: bool,
    inner: Arc<Mutex<MockSocketState>>,
}

#[async_trait]
impl WaSocket for MockSocket {
    async fn request_pairing_code(&self, phone: &str) -> Result<String, SocketError> {
        if self.registered_at_make {
            return Err(SocketError::AlreadyRegistered);
        }
        let mut state = self.inner.lock().unwrap();
        state.pairing_requests.push(phone.to_owned());
        state
            .pairing_script
            .pop_front()
            .unwrap_or_else(|| Ok("ABCD1234".to_owned()))
    }

    async fn send_message(&self, jid: &Jid, content: MessageContent) -> Result<(), SocketError> {
        self.inner.lock().unwrap().sent.push((jid.clone(), content));
        Ok(())
    }

    async fn group_fetch_all_participating(&self) -> Result<Vec<GroupInfo>, SocketError> {
        Ok(self.inner.lock().unwrap().groups.clone())
    }

    async fn on_whatsapp(&self, _jid: &Jid) -> Result<bool, SocketError> {
        Ok(true)
    }

    async fn logout(&self) -> Result<(), SocketError> {
        Ok(())
    }

    async fn end(&self) {
        self.inner.lock().unwrap().ended = true;
    }
}

/// `ProtocolClient` impl that hands out mock sockets instead of opening a
/// real WhatsApp Web connection. `handles()` returns every socket created
/// so far, in creation order.
#[derive(Clone, Default)]
pub struct MockClient {
    handles: Arc<Mutex<Vec<MockHandle>>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handles(&self) -> Vec<MockHandle> {
        self.handles.lock().unwrap().clone()
    }

    pub fn last_handle(&self) -> Option<MockHandle> {
        self.handles.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ProtocolClient for MockClient {
    async fn make_socket(
        &self,
        _wire_version: [u32; 3],
        auth_state: Arc<dyn AuthState>,
        _browser: Browser,
        _timeouts: SocketTimeouts,
    ) -> (Arc<dyn WaSocket>, mpsc::UnboundedReceiver<SocketEvent>) {
        let creds = auth_state.load_creds().await;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Mutex::new(MockSocketState::default()));
        let socket: Arc<dyn WaSocket> = Arc::new(MockSocket {
            registered_at_make: creds.registered,
            inner: inner.clone(),
        });
        self.handles.lock().unwrap().push(MockHandle {
            event_tx,
            inner,
        });
        (socket, event_rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectionState, Creds};
    use std::collections::HashMap;

    struct NoopKeys;

    #[async_trait]
    impl crate::SignalKeyStore for NoopKeys {
        async fn get(&self, _t: &str, _ids: &[String]) -> HashMap<String, serde_json::Value> {
            HashMap::new()
        }
        async fn set(&self, _d: HashMap<String, HashMap<String, Option<serde_json::Value>>>) {}
    }

    struct FixedAuthState {
        creds: Creds,
        keys: NoopKeys,
    }

    impl FixedAuthState {
        fn new(creds: Creds) -> Self {
            Self { creds, keys: NoopKeys }
        }
    }

    #[async_trait]
    impl AuthState for FixedAuthState {
        async fn load_creds(&self) -> Creds {
            self.creds.clone()
        }
        async fn save_creds(&self, _creds: &Creds) {}
        fn keys(&self) -> &dyn crate::SignalKeyStore {
            &self.keys
        }
    }

    #[tokio::test]
    async fn unregistered_creds_allow_pairing_requests() {
        let client = MockClient::new();
        let (socket, _rx) = client
            .make_socket(
                [2, 3000, 0],
                Arc::new(FixedAuthState::new(Creds::fresh())),
                Browser {
                    name: "Chrome".into(),
                    platform: "Linux".into(),
                    version: "1.0".into(),
                },
                SocketTimeouts::default(),
            )
            .await;

        let code = socket.request_pairing_code("628111000111").await.unwrap();
        assert_eq!(code.len(), 8);
        assert_eq!(client.last_handle().unwrap().pairing_request_count(), 1);
    }

    #[tokio::test]
    async fn registered_creds_refuse_pairing_requests() {
        let client = MockClient::new();
        let mut creds = Creds::fresh();
        creds.registered = true;
        let (socket, _rx) = client
            .make_socket(
                [2, 3000, 0],
                Arc::new(FixedAuthState::new(creds)),
                Browser {
                    name: "Chrome".into(),
                    platform: "Linux".into(),
                    version: "1.0".into(),
                },
                SocketTimeouts::default(),
            )
            .await;

        assert!(matches!(
            socket.request_pairing_code("628111000111").await,
            Err(SocketError::AlreadyRegistered)
        ));
    }

    #[tokio::test]
    async fn handle_can_push_connection_events() {
        let client = MockClient::new();
        let (_socket, mut rx) = client
            .make_socket(
                [2, 3000, 0],
                Arc::new(FixedAuthState::new(Creds::fresh())),
                Browser {
                    name: "Chrome".into(),
                    platform: "Linux".into(),
                    version: "1.0".into(),
                },
                SocketTimeouts::default(),
            )
            .await;

        let handle = client.last_handle().unwrap();
        handle.push_connection_update(ConnectionUpdate {
            connection: ConnectionState::Open,
            qr: None,
            last_disconnect: None,
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            SocketEvent::ConnectionUpdate(ConnectionUpdate {
                connection: ConnectionState::Open,
                ..
            })
        ));
    }
}
