//! Backend event aggregation.
//!
//! Every backend's event stream funnels into `Session::dispatch`, which
//! updates the counters/timers/roster and relays a session-level event.
//! Per-backend ordering is preserved (FIFO pump per backend); ordering
//! between backends is unspecified.

use std::time::Instant;

use tracing::{debug, info, warn};

use {
    gossip_accounts::{Account, AccountId},
    gossip_common::{Contact, ProtocolError},
    gossip_protocol::{ChatroomEvent, ProtocolEvent},
};

use crate::{core::Session, events::SessionEvent};

impl Session {
    /// Apply one backend event to the session state and relay it.
    ///
    /// Events for accounts no longer in the registry are dropped with a
    /// warning: a pump can still be draining its queue after the account
    /// was removed.
    pub async fn dispatch(&self, account_id: &AccountId, event: ProtocolEvent) {
        let Some(account) = self.entry(account_id).await.map(|e| e.account) else {
            warn!(account = %account_id, ?event, "event from unregistered account dropped");
            return;
        };

        match event {
            ProtocolEvent::LoggedIn => self.on_logged_in(account).await,
            ProtocolEvent::LoggedOut => self.on_logged_out(account).await,
            ProtocolEvent::Error(error) => self.on_error(account, error).await,
            ProtocolEvent::Message(message) => self.emit(SessionEvent::NewMessage(message)),
            ProtocolEvent::ContactAdded(contact) => self.on_contact_added(contact).await,
            ProtocolEvent::ContactUpdated(contact) => self.on_contact_updated(contact).await,
            ProtocolEvent::ContactPresence(contact) => self.on_contact_presence(contact).await,
            ProtocolEvent::ContactRemoved(contact) => self.on_contact_removed(contact).await,
            ProtocolEvent::Composing {
                contact_id,
                composing,
            } => self.emit(SessionEvent::Composing {
                contact_id,
                composing,
            }),
            ProtocolEvent::Chatroom(event) => self.on_chatroom(account, event),
        }
    }

    async fn on_logged_in(&self, account: Account) {
        let first = {
            let mut state = self.state.write().await;
            state.timers.insert(account.id.clone(), Instant::now());
            state.connected += 1;
            state.decrement_connecting();
            state.connected == 1
        };
        info!(account = %account.id, "logged in");
        self.emit(SessionEvent::ProtocolConnected(account));
        if first {
            self.emit(SessionEvent::Connected);
        }
    }

    async fn on_logged_out(&self, account: Account) {
        let last = {
            let mut state = self.state.write().await;
            state.timers.remove(&account.id);
            state.decrement_connecting();
            state.decrement_connected(&account.id)
        };
        info!(account = %account.id, "logged out");
        self.emit(SessionEvent::ProtocolDisconnected(account));
        if last {
            self.emit(SessionEvent::Disconnected);
        }
    }

    async fn on_error(&self, account: Account, error: ProtocolError) {
        // A failed login attempt is no longer in flight.
        self.state.write().await.decrement_connecting();
        warn!(account = %account.id, %error, "protocol error");
        self.emit(SessionEvent::ProtocolError { account, error });
    }

    async fn on_contact_added(&self, contact: Contact) {
        debug!(contact = %contact.id, "contact added");
        self.state.write().await.contacts.insert(0, contact.clone());
        self.emit(SessionEvent::ContactAdded(contact));
    }

    async fn on_contact_updated(&self, contact: Contact) {
        let mut state = self.state.write().await;
        if let Some(existing) = state.contacts.iter_mut().find(|c| c.id == contact.id) {
            *existing = contact.clone();
        }
        drop(state);
        self.emit(SessionEvent::ContactUpdated(contact));
    }

    async fn on_contact_presence(&self, contact: Contact) {
        let mut state = self.state.write().await;
        if let Some(existing) = state.contacts.iter_mut().find(|c| c.id == contact.id) {
            existing.presence = contact.presence.clone();
        }
        drop(state);
        self.emit(SessionEvent::ContactPresenceUpdated(contact));
    }

    async fn on_contact_removed(&self, contact: Contact) {
        // Relay first: observers must still be able to see the contact in
        // the aggregate roster during the removal notification.
        self.emit(SessionEvent::ContactRemoved(contact.clone()));
        let mut state = self.state.write().await;
        if let Some(pos) = state.contacts.iter().position(|c| c.id == contact.id) {
            state.contacts.remove(pos);
        }
    }

    fn on_chatroom(&self, account: Account, event: ChatroomEvent) {
        self.emit(SessionEvent::Chatroom { account, event });
    }
}
