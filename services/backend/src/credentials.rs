//! Auth State Adapter (spec.md §4.1, C1-C2): presents the protocol
//! library's two-surface credential interface, backed by the device row's
//! session blob column. Mutations are flushed in full on every write; the
//! in-memory copy stays authoritative if a flush fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use wa_baileys::{AuthState, Creds, SignalKeyStore};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Blob {
    #[serde(default)]
    creds: Creds,
    #[serde(default)]
    keys: HashMap<String, HashMap<String, serde_json::Value>>,
}

/// Backed by a single device row. One instance per live Connection Manager.
pub struct PgAuthState {
    pool: PgPool,
    device_id: Uuid,
    blob: RwLock<Blob>,
}

impl PgAuthState {
    /// Loads the current session blob, or starts fresh (`registered=false`)
    /// if the column is empty or unparseable (spec.md §4.1 corruption rule).
    pub async fn load(pool: PgPool, device_id: Uuid) -> Arc<Self> {
        let stored = wa_store::devices::get_device(&pool, device_id)
            .await
            .ok()
            .flatten()
            .and_then(|row| row.session_blob);

        let blob = match stored {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
                tracing::warn!(device_id = %device_id, error = %err, "session blob unparseable, starting fresh");
                Blob::default()
            }),
            None => Blob::default(),
        };

        Arc::new(Self {
            pool,
            device_id,
            blob: RwLock::new(blob),
        })
    }

    async fn flush(&self) {
        let snapshot = self.blob.read().await.clone();
        match serde_json::to_value(&snapshot) {
            Ok(value) => {
                if let Err(err) =
                    wa_store::devices::save_session_blob(&self.pool, self.device_id, value).await
                {
                    tracing::warn!(device_id = %self.device_id, error = %err, "failed to flush credential blob");
                }
            }
            Err(err) => {
                tracing::warn!(device_id = %self.device_id, error = %err, "failed to serialize credential blob");
            }
        }
    }
}

#[async_trait]
impl AuthState for PgAuthState {
    async fn load_creds(&self) -> Creds {
        self.blob.read().await.creds.clone()
    }

    async fn save_creds(&self, creds: &Creds) {
        {
            self.blob.write().await.creds = creds.clone();
        }
        self.flush().await;
    }

    fn keys(&self) -> &dyn SignalKeyStore {
        self
    }
}

#[async_trait]
impl SignalKeyStore for PgAuthState {
    async fn get(&self, key_type: &str, ids: &[String]) -> HashMap<String, serde_json::Value> {
        let blob = self.blob.read().await;
        let Some(map) = blob.keys.get(key_type) else {
            return HashMap::new();
        };
        ids.iter()
            .filter_map(|id| map.get(id).map(|v| (id.clone(), v.clone())))
            .collect()
    }

    async fn set(&self, data: HashMap<String, HashMap<String, Option<serde_json::Value>>>) {
        {
            let mut blob = self.blob.write().await;
            for (key_type, entries) in data {
                let map = blob.keys.entry(key_type).or_default();
                for (id, value) in entries {
                    match value {
                        Some(v) => {
                            map.insert(id, v);
                        }
                        None => {
                            map.remove(&id);
                        }
                    }
                }
            }
        }
        self.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wa_baileys::MeInfo;
    use wa_protocol::Jid;

    #[tokio::test]
    async fn fresh_load_from_empty_pool_row_is_unregistered() {
        let pool = wa_test_utils::lazy_pool();
        let state = PgAuthState::load(pool, Uuid::new_v4()).await;
        assert!(!state.load_creds().await.registered);
    }

    #[tokio::test]
    async fn key_store_set_then_get_round_trips_and_none_deletes() {
        let pool = wa_test_utils::lazy_pool();
        let state = PgAuthState::load(pool, Uuid::new_v4()).await;

        let mut entries = HashMap::new();
        entries.insert("1".to_owned(), Some(serde_json::json!({"pub": "abc"})));
        let mut data = HashMap::new();
        data.insert("pre-key".to_owned(), entries);
        // flush() will fail to reach a real database; the in-memory blob
        // still updates first, which is what this test exercises.
        let _ = tokio::time::timeout(std::time::Duration::from_millis(50), state.set(data)).await;

        let got = state.get("pre-key", &["1".to_owned()]).await;
        assert_eq!(got.get("1"), Some(&serde_json::json!({"pub": "abc"})));

        let mut deletion = HashMap::new();
        deletion.insert("1".to_owned(), None);
        let mut data = HashMap::new();
        data.insert("pre-key".to_owned(), deletion);
        let _ = tokio::time::timeout(std::time::Duration::from_millis(50), state.set(data)).await;
        assert!(state.get("pre-key", &["1".to_owned()]).await.is_empty());
    }

    #[test]
    fn blob_round_trips_through_json_with_me_info() {
        let mut creds = Creds::fresh();
        creds.registered = true;
        creds.me = Some(MeInfo {
            id: Jid::individual("628111000111"),
            name: Some("Alice".to_owned()),
        });
        let blob = Blob { creds, keys: HashMap::new() };
        let value = serde_json::to_value(&blob).unwrap();
        let back: Blob = serde_json::from_value(value).unwrap();
        assert_eq!(back.creds, blob.creds);
    }
}
