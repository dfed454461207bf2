//! Key-value cache trait (spec.md §6 cache keys) plus an in-process TTL
//! implementation. The real cache is out of scope: only the interface this
//! workspace needs is specified, so this crate exists to give that
//! interface a shape and a stand-in good enough to drive the rest of the
//! backend in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<serde_json::Value>;
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration);
    async fn invalidate(&self, key: &str);
}

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// In-process TTL cache. Good enough for a single backend process; a real
/// deployment would point this trait at a shared cache instead.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            _ => None,
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        self.entries.write().await.insert(
            key.to_owned(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

/// Namespaced cache key builders (spec.md §6).
pub mod keys {
    pub fn qr(device_id: &str) -> String {
        format!("qr:{device_id}")
    }

    pub fn pairing(device_id: &str) -> String {
        format!("pairing:{device_id}")
    }

    pub fn contacts_list(user_id: &str) -> String {
        format!("contacts:{user_id}:list")
    }

    pub fn contact(user_id: &str, phone: &str) -> String {
        format!("contact:{user_id}:{phone}")
    }
}

/// TTLs named in spec.md §4.4/§6: QR and pairing payloads are transient.
pub const QR_TTL: Duration = Duration::from_secs(600);
pub const PAIRING_TTL: Duration = Duration::from_secs(600);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let cache = InMemoryCache::new();
        cache
            .set("qr:d1", serde_json::json!("payload"), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("qr:d1").await, Some(serde_json::json!("payload")));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let cache = InMemoryCache::new();
        cache
            .set("qr:d1", serde_json::json!("payload"), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("qr:d1").await, None);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = InMemoryCache::new();
        cache
            .set("settings:u1", serde_json::json!({"a": 1}), Duration::from_secs(60))
            .await;
        cache.invalidate("settings:u1").await;
        assert_eq!(cache.get("settings:u1").await, None);
    }

    #[test]
    fn key_builders_match_spec_namespacing() {
        assert_eq!(keys::qr("d1"), "qr:d1");
        assert_eq!(keys::pairing("d1"), "pairing:d1");
        assert_eq!(keys::contacts_list("u1"), "contacts:u1:list");
        assert_eq!(keys::contact("u1", "628111000111"), "contact:u1:628111000111");
    }
}
