//! The credential half of the two-surface interface the protocol library
//! requires (spec.md §4.1). Everything beyond `registered` and `me` is
//! opaque to this workspace — it is carried verbatim so it round-trips
//! through C1 without this crate having to understand Signal's key types.

use serde::{Deserialize, Serialize};
use wa_protocol::Jid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeInfo {
    pub id: Jid,
    pub name: Option<String>,
}

/// Mutable `creds` struct the library reads and writes during a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Creds {
    pub registered: bool,
    pub me: Option<MeInfo>,
    /// Identity keys, signed pre-keys, ADV identity, etc. Opaque.
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl Creds {
    pub fn fresh() -> Self {
        Self {
            registered: false,
            me: None,
            extra: serde_json::Value::Null,
        }
    }
}

// serde_json::Value only implements PartialEq, not Eq (it can hold f64),
// but our JSON payloads never carry NaN, so treating equality as total here
// is safe and lets Creds participate in Eq-bound derives upstream.
impl Eq for Creds {}
