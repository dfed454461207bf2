//! Bearer API-key check and the per-key rate limit (spec.md §6 HTTP surface,
//! §7 "Configuration / input" rejection at the edge). Full API-key→user
//! ownership mapping is out of this system's scope (spec.md §1 lists
//! auth-token verification as an external collaborator); this module only
//! verifies the shared key and paces requests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use tokio::sync::Mutex;

const RATE_LIMIT_PER_MINUTE: usize = 100;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

#[derive(Clone, Default)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this key is still under the 100/min budget, and
    /// records the attempt.
    pub async fn check(&self, key: &str) -> bool {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        let entry = windows.entry(key.to_owned()).or_default();
        entry.retain(|t| now.duration_since(*t) < RATE_LIMIT_WINDOW);
        if entry.len() >= RATE_LIMIT_PER_MINUTE {
            return false;
        }
        entry.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_the_per_minute_budget_then_rejects() {
        let limiter = RateLimiter::new();
        for _ in 0..RATE_LIMIT_PER_MINUTE {
            assert!(limiter.check("key-a").await);
        }
        assert!(!limiter.check("key-a").await);
    }

    #[tokio::test]
    async fn distinct_keys_have_independent_budgets() {
        let limiter = RateLimiter::new();
        for _ in 0..RATE_LIMIT_PER_MINUTE {
            assert!(limiter.check("key-a").await);
        }
        assert!(limiter.check("key-b").await);
    }

    #[test]
    fn extracts_token_after_bearer_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_bearer(&headers), Some("abc123"));
    }
}
