//! WhatsApp addressing (spec.md GLOSSARY: "JID").

use std::fmt;
use std::str::FromStr;

pub const USER_SERVER: &str = "s.whatsapp.net";
pub const GROUP_SERVER: &str = "g.us";

/// A resolved WhatsApp recipient address: `<digits>@s.whatsapp.net` for an
/// individual, `<digits>@g.us` for a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    pub user: String,
    pub kind: JidKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JidKind {
    Individual,
    Group,
}

impl Jid {
    pub fn individual(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            kind: JidKind::Individual,
        }
    }

    pub fn group(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            kind: JidKind::Group,
        }
    }

    pub fn server(&self) -> &'static str {
        match self.kind {
            JidKind::Individual => USER_SERVER,
            JidKind::Group => GROUP_SERVER,
        }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid JID '{0}'")]
pub struct JidParseError(String);

impl FromStr for Jid {
    type Err = JidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user, server) = s
            .split_once('@')
            .ok_or_else(|| JidParseError(s.to_owned()))?;
        if user.is_empty() || !user.chars().all(|c| c.is_ascii_digit()) {
            return Err(JidParseError(s.to_owned()));
        }
        let kind = match server {
            USER_SERVER => JidKind::Individual,
            GROUP_SERVER => JidKind::Group,
            _ => return Err(JidParseError(s.to_owned())),
        };
        Ok(Jid {
            user: user.to_owned(),
            kind,
        })
    }
}

impl serde::Serialize for Jid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Jid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Jid::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn individual_display_and_parse_roundtrip() {
        let j = Jid::individual("628111000111");
        let s = j.to_string();
        assert_eq!(s, "628111000111@s.whatsapp.net");
        assert_eq!(s.parse::<Jid>().unwrap(), j);
    }

    #[test]
    fn group_display_and_parse_roundtrip() {
        let j = Jid::group("123456789");
        let s = j.to_string();
        assert_eq!(s, "123456789@g.us");
        assert_eq!(s.parse::<Jid>().unwrap(), j);
    }

    #[test]
    fn rejects_non_digit_user_and_unknown_server() {
        assert!("abc@s.whatsapp.net".parse::<Jid>().is_err());
        assert!("123@example.com".parse::<Jid>().is_err());
        assert!("nouser".parse::<Jid>().is_err());
    }
}
