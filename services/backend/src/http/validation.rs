//! Input validation at the HTTP edge (spec.md §7 "Configuration / input"):
//! malformed phone, oversize message, unsafe media URL are rejected here,
//! before anything touches a socket.

use std::net::IpAddr;

pub const MAX_MESSAGE_LEN: usize = 10_000;

pub fn validate_message_length(message: &str) -> Result<(), String> {
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(format!("message exceeds {MAX_MESSAGE_LEN} characters"));
    }
    Ok(())
}

fn is_private_or_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

/// Only http(s) schemes, resolving to a non-private address (spec.md §6
/// "media-URL safety (no private IPs, no non-http(s) schemes)").
pub async fn validate_media_url(raw: &str) -> Result<(), String> {
    let url = reqwest::Url::parse(raw).map_err(|_| "media URL is not a valid URL".to_owned())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err("media URL must use http or https".to_owned());
    }
    let host = url.host_str().ok_or_else(|| "media URL has no host".to_owned())?;

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_or_local(ip) {
            return Err("media URL resolves to a private address".to_owned());
        }
        return Ok(());
    }

    let port = url.port_or_known_default().unwrap_or(443);
    match tokio::net::lookup_host((host, port)).await {
        Ok(addrs) => {
            for addr in addrs {
                if is_private_or_local(addr.ip()) {
                    return Err("media URL resolves to a private address".to_owned());
                }
            }
            Ok(())
        }
        Err(_) => Err("media URL host could not be resolved".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_within_limit_is_accepted() {
        assert!(validate_message_length(&"a".repeat(10_000)).is_ok());
    }

    #[test]
    fn message_over_limit_is_rejected() {
        assert!(validate_message_length(&"a".repeat(10_001)).is_err());
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        assert!(validate_media_url("ftp://example.com/file").await.is_err());
    }

    #[tokio::test]
    async fn rejects_literal_private_ip() {
        assert!(validate_media_url("http://192.168.1.5/image.png").await.is_err());
    }

    #[tokio::test]
    async fn rejects_loopback_literal() {
        assert!(validate_media_url("http://127.0.0.1/image.png").await.is_err());
    }
}
