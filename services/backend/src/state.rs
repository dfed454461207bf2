use std::sync::Arc;

use sqlx::PgPool;
use wa_baileys::ProtocolClient;
use wa_cache::Cache;

use crate::http::auth::RateLimiter;
use crate::socket_map::SocketMap;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Arc<dyn Cache>,
    pub protocol: Arc<dyn ProtocolClient>,
    pub sockets: SocketMap,
    pub server_id: String,
    pub api_key: String,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        cache: Arc<dyn Cache>,
        protocol: Arc<dyn ProtocolClient>,
        sockets: SocketMap,
        server_id: String,
        api_key: String,
    ) -> Self {
        Self {
            pool,
            cache,
            protocol,
            sockets,
            server_id,
            api_key,
            rate_limiter: RateLimiter::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wa_baileys::MockClient;
    use wa_cache::InMemoryCache;

    #[tokio::test]
    async fn state_constructs_with_in_memory_collaborators() {
        let pool = wa_test_utils::lazy_pool();
        let state = AppState::new(
            pool,
            Arc::new(InMemoryCache::new()),
            Arc::new(MockClient::new()),
            SocketMap::new(),
            "backend-test".to_owned(),
            "test-key".to_owned(),
        );
        assert_eq!(state.server_id, "backend-test");
        assert!(state.sockets.device_ids().await.is_empty());
    }
}
