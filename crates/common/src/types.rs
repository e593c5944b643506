use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ── Presence ────────────────────────────────────────────────────────────────

/// Availability states, roughly the XMPP show values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Available,
    Busy,
    Away,
    ExtendedAway,
    Unavailable,
}

/// The local user's availability, session-wide: one current value pushed to
/// every connected backend when it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub state: PresenceState,
    /// Free-form status line ("out for lunch").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Presence {
    pub fn available() -> Self {
        Self {
            state: PresenceState::Available,
            status: None,
        }
    }

    pub fn new(state: PresenceState, status: Option<String>) -> Self {
        Self { state, status }
    }

    pub fn is_online(&self) -> bool {
        self.state != PresenceState::Unavailable
    }
}

impl Default for Presence {
    fn default() -> Self {
        Self::available()
    }
}

// ── Contact ─────────────────────────────────────────────────────────────────

/// A remote party, scoped to the backend that produced it.
///
/// The id is the backend's bare identifier for the party (e.g. a JID);
/// equality of contacts is equality of ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Last presence the backend reported for this contact, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
}

impl Contact {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            groups: Vec::new(),
            presence: None,
        }
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    pub fn is_online(&self) -> bool {
        self.presence.as_ref().is_some_and(Presence::is_online)
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Contact {}

// ── Message ─────────────────────────────────────────────────────────────────

/// A chat message, inbound or outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Recipient identifier (outbound) — resolved to a backend by the session.
    pub to: String,
    /// Sender identifier (inbound); `None` on locally composed messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Milliseconds since the epoch.
    pub timestamp: u64,
}

impl Message {
    /// A new outbound message to the given recipient id.
    pub fn to(recipient: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: recipient.into(),
            from: None,
            body: body.into(),
            subject: None,
            timestamp: now_ms(),
        }
    }

    /// A new inbound message as reported by a backend.
    pub fn from(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: recipient.into(),
            from: Some(sender.into()),
            body: body.into(),
            subject: None,
            timestamp: now_ms(),
        }
    }
}

// ── Vcard / version ─────────────────────────────────────────────────────────

/// Personal details published alongside an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vcard {
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
}

/// Client software identification, as answered to a version query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_equality_is_by_id() {
        let a = Contact::new("juliet@example.org", "Juliet");
        let b = Contact::new("juliet@example.org", "J.");
        let c = Contact::new("romeo@example.org", "Romeo");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn presence_online() {
        assert!(Presence::available().is_online());
        assert!(!Presence::new(PresenceState::Unavailable, None).is_online());
        assert!(Presence::new(PresenceState::Away, Some("brb".into())).is_online());
    }

    #[test]
    fn outbound_message_has_no_sender() {
        let m = Message::to("juliet@example.org", "hi");
        assert!(m.from.is_none());
        assert_eq!(m.to, "juliet@example.org");
        assert!(m.timestamp > 0);
    }
}
