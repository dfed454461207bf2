//! Row types and the small string-backed enums spec.md §3 defines. These
//! are stored as plain TEXT columns (see migrations/0001_init.sql) and
//! parsed at the repository boundary, mirroring how the rest of this
//! workspace treats the database as the source of truth rather than
//! generating Rust types from it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Disconnected,
    Connecting,
    WaitingPairing,
    Connected,
    Error,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Disconnected => "disconnected",
            DeviceStatus::Connecting => "connecting",
            DeviceStatus::WaitingPairing => "waiting_pairing",
            DeviceStatus::Connected => "connected",
            DeviceStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "disconnected" => DeviceStatus::Disconnected,
            "connecting" => DeviceStatus::Connecting,
            "waiting_pairing" => DeviceStatus::WaitingPairing,
            "connected" => DeviceStatus::Connected,
            "error" => DeviceStatus::Error,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMethod {
    Qr,
    Pairing,
}

impl ConnectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionMethod::Qr => "qr",
            ConnectionMethod::Pairing => "pairing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "qr" => ConnectionMethod::Qr,
            "pairing" => ConnectionMethod::Pairing,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastStatus {
    Draft,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl BroadcastStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BroadcastStatus::Draft => "draft",
            BroadcastStatus::Processing => "processing",
            BroadcastStatus::Completed => "completed",
            BroadcastStatus::Failed => "failed",
            BroadcastStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "draft" => BroadcastStatus::Draft,
            "processing" => BroadcastStatus::Processing,
            "completed" => BroadcastStatus::Completed,
            "failed" => BroadcastStatus::Failed,
            "cancelled" => BroadcastStatus::Cancelled,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => JobStatus::Pending,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DeviceRow {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub status: DeviceStatus,
    pub connection_method: ConnectionMethod,
    pub pairing_phone: Option<String>,
    pub qr_code: Option<String>,
    pub pairing_code: Option<String>,
    pub bound_phone: Option<String>,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub session_blob: Option<serde_json::Value>,
    pub assigned_server_id: Option<String>,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ServerRow {
    pub id: String,
    pub url: String,
    pub region: String,
    pub priority: i32,
    pub max_capacity: i32,
    pub is_active: bool,
    pub is_healthy: bool,
    pub last_health_check: DateTime<Utc>,
    pub current_load: i64,
}

#[derive(Debug, Clone)]
pub struct BroadcastRow {
    pub id: Uuid,
    pub user_id: String,
    pub device_id: Uuid,
    pub name: String,
    pub message_template: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub recipients: serde_json::Value,
    pub delay_mode: String,
    pub base_delay_ms: Option<i32>,
    pub batch_size: i32,
    pub pause_between_batches_ms: i32,
    pub randomize: bool,
    pub scheduled_at: DateTime<Utc>,
    pub status: BroadcastStatus,
    pub sent_count: i32,
    pub failed_count: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BroadcastJobRow {
    pub id: Uuid,
    pub broadcast_id: Uuid,
    pub status: JobStatus,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
}
