//! The in-process device-to-socket map (spec.md §5 "shared resources"):
//! single-writer discipline, the supervisor is the only inserter/remover,
//! the worker pool only reads.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use wa_baileys::WaSocket;

#[derive(Clone, Default)]
pub struct SocketMap {
    inner: Arc<RwLock<HashMap<Uuid, Arc<dyn WaSocket>>>>,
}

impl SocketMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, device_id: Uuid, socket: Arc<dyn WaSocket>) {
        self.inner.write().await.insert(device_id, socket);
    }

    pub async fn remove(&self, device_id: Uuid) {
        self.inner.write().await.remove(&device_id);
    }

    pub async fn get(&self, device_id: Uuid) -> Option<Arc<dyn WaSocket>> {
        self.inner.read().await.get(&device_id).cloned()
    }

    pub async fn contains(&self, device_id: Uuid) -> bool {
        self.inner.read().await.contains_key(&device_id)
    }

    pub async fn device_ids(&self) -> Vec<Uuid> {
        self.inner.read().await.keys().copied().collect()
    }
}
