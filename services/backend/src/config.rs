//! Environment-driven configuration (spec.md §6 "Environment").

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub log_level: String,
    pub server_id: Option<String>,
    pub server_region: String,
    pub server_url: String,
    pub server_priority: i32,
    pub server_max_capacity: i32,
    pub api_key: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),
            server_id: env::var("SERVER_ID").ok(),
            server_region: env::var("SERVER_REGION").unwrap_or_else(|_| "default".to_owned()),
            server_url: env::var("SERVER_URL")
                .unwrap_or_else(|_| format!("http://{}", env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()))),
            server_priority: env::var("SERVER_PRIORITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            server_max_capacity: env::var("SERVER_MAX_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            api_key: env::var("API_KEY").expect("API_KEY must be set"),
        }
    }
}

pub const SUPERVISOR_TICK: Duration = Duration::from_secs(10);
pub const HEALTH_TICK: Duration = Duration::from_secs(60);
pub const SCHEDULER_TICK: Duration = Duration::from_secs(30);
pub const QUEUEING_TICK: Duration = Duration::from_secs(15);
pub const STUCK_CONNECTING_SECS: i64 = 120;
/// Reaper threshold (spec.md §9 open question, resolved in DESIGN.md): a
/// server is stale once its health tick hasn't landed for 3 missed ticks.
pub const STALE_SERVER_SECS: i64 = 180;
pub const WORKER_CONCURRENCY: usize = 5;
