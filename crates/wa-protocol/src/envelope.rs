//! Frozen HTTP error envelope used by every non-2xx admin response.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_details_when_none() {
        let envelope = HttpErrorEnvelope {
            code: "NOT_FOUND".into(),
            message: "device missing".into(),
            details: None,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(!json.contains("details"));
    }

    #[test]
    fn keeps_details_when_present() {
        let envelope = HttpErrorEnvelope {
            code: "BAD_REQUEST".into(),
            message: "invalid phone".into(),
            details: Some(serde_json::json!({ "field": "phone" })),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"field\":\"phone\""));
    }
}
