//! Relational persistence for devices, servers, broadcasts, and the
//! durable broadcast queue (spec.md §3, §6). The datastore itself is out
//! of scope; this crate is the repository layer sitting on top of it,
//! using runtime-checked `sqlx::query` (not the `query!`/`query_as!`
//! macros, which need a live database or offline cache at build time).

pub mod broadcasts;
pub mod db;
pub mod devices;
pub mod events;
pub mod models;
pub mod queue;
pub mod servers;

pub use models::{BroadcastStatus, ConnectionMethod, DeviceStatus, JobStatus};
