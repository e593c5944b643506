use std::{collections::HashMap, sync::Arc, time::Instant};

use tracing::warn;

use {
    gossip_accounts::{Account, AccountId},
    gossip_common::{Contact, Presence},
    gossip_protocol::ProtocolBackend,
};

/// A registered account/backend pair. The session's registry entry holds the
/// only strong reference set to the backend.
#[derive(Clone)]
pub(crate) struct RegisteredBackend {
    pub account: Account,
    pub backend: Arc<dyn ProtocolBackend>,
}

/// Mutable session state, guarded by one lock in the session.
///
/// Invariants:
/// - `active` and `registry` always have the same membership; `active`
///   preserves insertion order for broadcast operations.
/// - `connected` moves only on logged-in/logged-out events; an underflow is
///   a bookkeeping bug and is reported, not clamped away silently.
pub(crate) struct SessionState {
    pub registry: HashMap<AccountId, RegisteredBackend>,
    pub active: Vec<AccountId>,
    pub connected: u32,
    pub connecting: u32,
    /// Per-account login timestamps; present only while logged in.
    pub timers: HashMap<AccountId, Instant>,
    /// Aggregate roster across all backends, newest first. This is the
    /// session-visible strong reference to every known contact.
    pub contacts: Vec<Contact>,
    pub presence: Presence,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
            active: Vec::new(),
            connected: 0,
            connecting: 0,
            timers: HashMap::new(),
            contacts: Vec::new(),
            presence: Presence::default(),
        }
    }

    /// Registry entries in insertion order.
    pub fn entries(&self) -> Vec<RegisteredBackend> {
        self.active
            .iter()
            .filter_map(|id| self.registry.get(id).cloned())
            .collect()
    }

    /// Entries whose backend currently reports connected.
    pub fn connected_entries(&self) -> Vec<RegisteredBackend> {
        self.entries()
            .into_iter()
            .filter(|e| e.backend.is_connected())
            .collect()
    }

    /// First entry (insertion order) whose backend claims the contact id.
    pub fn owner_of(&self, contact_id: &str) -> Option<RegisteredBackend> {
        self.entries()
            .into_iter()
            .find(|e| e.backend.find_contact(contact_id).is_some())
    }

    pub fn decrement_connecting(&mut self) {
        self.connecting = self.connecting.saturating_sub(1);
    }

    /// Decrement the connected counter, reporting (and skipping) underflow.
    /// Returns true when this was the one-to-zero transition.
    pub fn decrement_connected(&mut self, account: &AccountId) -> bool {
        if self.connected == 0 {
            warn!(%account, "connected counter underflow, logged-out without logged-in");
            return false;
        }
        self.connected -= 1;
        self.connected == 0
    }
}
