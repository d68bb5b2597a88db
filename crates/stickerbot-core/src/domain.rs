use std::fmt;

use crate::{errors::Error, Result};

/// Sender / participant id as the transport reports it (may carry decorations).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

/// Chat id (private chat or group) as the transport reports it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub String);

/// Transport message id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

/// A stable reference to a delivered message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical identity of a person, independent of session/device suffixes and
/// phone-number formatting.
///
/// Accepted shapes:
/// - `5511999999999@s.whatsapp.net`, `5511999999999:12@s.whatsapp.net`
/// - `+55 (11) 99999-9999`
/// - `123456789` (Telegram numeric ids)
/// - `SomeHandle` (compared case-insensitively)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalId {
    user: String,
    server: Option<String>,
}

impl CanonicalId {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        // `@handle` is a handle, not `<empty>@server`.
        let trimmed = raw.trim_start_matches('@');
        let (local, server) = match trimmed.split_once('@') {
            Some((l, s)) => (l, Some(s.trim().to_lowercase()).filter(|s| !s.is_empty())),
            None => (trimmed, None),
        };

        // Multi-device ids append `:<device>` to the local part.
        let local = local.split(':').next().unwrap_or("").trim();

        let digits: String = local
            .chars()
            .filter(|c| !matches!(c, '+' | ' ' | '-' | '(' | ')' | '.'))
            .collect();

        let user = if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            digits
        } else {
            local.to_lowercase()
        };

        if user.is_empty() || user.chars().any(char::is_whitespace) {
            return Err(Error::InvalidIdentity(raw.to_string()));
        }

        Ok(Self { user, server })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// Same person, ignoring the server part when either side lacks one.
    pub fn same_identity(&self, other: &CanonicalId) -> bool {
        if self.user != other.user {
            return false;
        }
        match (&self.server, &other.server) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Convenience for comparing a raw transport id against this identity.
    pub fn matches(&self, raw: &UserId) -> bool {
        CanonicalId::parse(&raw.0)
            .map(|other| self.same_identity(&other))
            .unwrap_or(false)
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.server {
            Some(server) => write!(f, "{}@{}", self.user, server),
            None => f.write_str(&self.user),
        }
    }
}
