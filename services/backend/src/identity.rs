//! Server identity derivation (spec.md §4.2): explicit config wins, else a
//! hostname-derived value, else a process-lifetime-random fallback.

use rand::Rng;

const RESERVED: &[&str] = &["admin", "root", "system", "null"];

fn is_valid(id: &str) -> bool {
    let len_ok = (3..=128).contains(&id.len());
    let chars_ok = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-');
    len_ok && chars_ok && !RESERVED.contains(&id)
}

pub fn derive_server_id(explicit: Option<&str>) -> String {
    if let Some(id) = explicit {
        if is_valid(id) {
            return id.to_owned();
        }
        tracing::warn!(id, "configured SERVER_ID is invalid, falling back");
    }

    if let Ok(hostname) = hostname_from_env() {
        let candidate: String = hostname
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect();
        if is_valid(&candidate) {
            return candidate;
        }
    }

    let mut rng = rand::thread_rng();
    let suffix: String = (0..12)
        .map(|_| {
            let c = rng.gen_range(0..36);
            std::char::from_digit(c, 36).unwrap()
        })
        .collect();
    format!("backend-{suffix}")
}

fn hostname_from_env() -> Result<String, std::env::VarError> {
    std::env::var("HOSTNAME")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_valid_id_is_kept() {
        assert_eq!(derive_server_id(Some("backend-eu-1")), "backend-eu-1");
    }

    #[test]
    fn reserved_tokens_are_rejected() {
        assert_ne!(derive_server_id(Some("admin")), "admin");
    }

    #[test]
    fn too_short_id_is_rejected() {
        assert_ne!(derive_server_id(Some("ab")), "ab");
    }

    #[test]
    fn random_fallback_matches_identity_pattern() {
        let id = derive_server_id(None);
        assert!(id.len() >= 3 && id.len() <= 128);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'));
    }
}
