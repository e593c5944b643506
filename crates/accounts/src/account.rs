use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque account key. Accounts are compared by this key, never by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Wire protocol an account speaks. The backend factory maps each kind to a
/// concrete `ProtocolBackend` constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    Jabber,
    /// In-process echo backend, used by the CLI demo and tests.
    Loopback,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jabber => f.write_str("jabber"),
            Self::Loopback => f.write_str("loopback"),
        }
    }
}

/// One configured identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Human-readable label shown in account lists.
    pub name: String,
    pub protocol: ProtocolKind,
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Stored password; when absent the session's password provider is asked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Whether `connect(all, startup=true)` should include this account.
    #[serde(default = "default_true")]
    pub auto_connect: bool,
    #[serde(default)]
    pub use_ssl: bool,
}

fn default_port() -> u16 {
    5222
}

fn default_true() -> bool {
    true
}

impl Account {
    pub fn new(id: impl Into<AccountId>, name: impl Into<String>, protocol: ProtocolKind) -> Self {
        let id = id.into();
        Self {
            id,
            name: name.into(),
            protocol,
            server: String::new(),
            port: default_port(),
            username: String::new(),
            resource: None,
            password: None,
            auto_connect: true,
            use_ssl: false,
        }
    }

    pub fn with_server(mut self, server: impl Into<String>, port: u16) -> Self {
        self.server = server.into();
        self.port = port;
        self
    }

    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}
