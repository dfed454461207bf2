//! Disconnect-code classification (spec.md §4.4, §7 taxonomy #2).
//!
//! The protocol library is a black box (spec.md §6): it hands back a
//! numeric status code and a message on every `connection.update` close
//! event. The codes below are the illustrative ones spec.md names; the
//! library's actual enum may use different values, so this mapping is the
//! single place that would need updating to match a real client.

/// The four closing branches the Connection Manager state machine (C5)
/// distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Code 515: keep credentials, relaunch shortly.
    RestartRequired,
    /// Codes 401/405: wipe credentials, QR, pairing; relaunch fresh.
    AuthFailure,
    /// Explicit logout: wipe credentials and phone, never relaunch.
    LoggedOut,
    /// Anything else: relaunch in recovery mode if credentials exist, else
    /// fresh, after a short delay.
    Transient(u16),
}

impl DisconnectReason {
    pub fn classify(code: u16) -> Self {
        match code {
            515 => DisconnectReason::RestartRequired,
            401 | 405 => DisconnectReason::AuthFailure,
            440 => DisconnectReason::LoggedOut,
            other => DisconnectReason::Transient(other),
        }
    }

    /// Delay before relaunching, per the branch in spec.md §4.4.
    pub fn relaunch_delay(self) -> Option<std::time::Duration> {
        use std::time::Duration;
        match self {
            DisconnectReason::RestartRequired => Some(Duration::from_millis(1500)),
            DisconnectReason::AuthFailure => Some(Duration::from_millis(1000)),
            DisconnectReason::LoggedOut => None,
            DisconnectReason::Transient(_) => Some(Duration::from_millis(500)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_codes() {
        assert_eq!(DisconnectReason::classify(515), DisconnectReason::RestartRequired);
        assert_eq!(DisconnectReason::classify(401), DisconnectReason::AuthFailure);
        assert_eq!(DisconnectReason::classify(405), DisconnectReason::AuthFailure);
        assert_eq!(DisconnectReason::classify(440), DisconnectReason::LoggedOut);
        assert_eq!(DisconnectReason::classify(428), DisconnectReason::Transient(428));
    }

    #[test]
    fn logged_out_never_relaunches() {
        assert!(DisconnectReason::LoggedOut.relaunch_delay().is_none());
        assert!(DisconnectReason::RestartRequired.relaunch_delay().is_some());
    }
}
