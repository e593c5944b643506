use std::{sync::Arc, time::Duration};

use {
    tokio::sync::{RwLock, broadcast, mpsc},
    tracing::{debug, warn},
};

use {
    gossip_accounts::{Account, AccountEvent, AccountId, AccountManager},
    gossip_common::{Contact, Presence},
    gossip_protocol::{
        BackendContext, BackendFactory, ChatroomProvider, FileTransferProvider, PasswordProvider,
        ProtocolBackend, ProtocolEvent,
    },
};

use crate::{
    error::SessionError,
    events::{AccountCounts, SessionEvent},
    passwords::PasswordRelay,
    state::{RegisteredBackend, SessionState},
};

/// The session core: single coordination point between zero-or-more active
/// protocol backends and the rest of the application.
///
/// Owns one backend per account (mirrored from the bound
/// [`AccountManager`]), aggregates their connection state and contacts, and
/// routes outbound requests to the right backend. Observers subscribe to
/// [`SessionEvent`]s; backends feed their event streams into
/// `Session::dispatch`, which serializes all state mutation.
pub struct Session {
    manager: Arc<AccountManager>,
    factory: BackendFactory,
    pub(crate) state: RwLock<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    passwords: Arc<PasswordRelay>,
}

impl Session {
    /// Create a session bound 1:1 to an account manager: every current
    /// account is registered, and add/remove notifications are mirrored into
    /// the registry for the life of the session.
    pub async fn new(manager: Arc<AccountManager>, factory: BackendFactory) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let session = Arc::new(Self {
            manager,
            factory,
            state: RwLock::new(SessionState::new()),
            events,
            passwords: Arc::new(PasswordRelay::new()),
        });

        for account in session.manager.accounts().await {
            if let Err(e) = session.add_account(&account).await {
                warn!(account = %account.id, error = %e, "could not register account");
            }
        }
        session.spawn_mirror();
        session
    }

    /// Subscribe to session-wide events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Install a password provider (e.g. an interactive prompt). Takes
    /// effect for all backends, including already-registered ones.
    pub fn set_password_provider(&self, provider: Arc<dyn PasswordProvider>) {
        self.passwords.set(provider);
    }

    pub fn account_manager(&self) -> &Arc<AccountManager> {
        &self.manager
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }

    // ── Registry ────────────────────────────────────────────────────────────

    /// Register an account and construct its backend. Idempotent: returns
    /// `Ok(false)` without side effects when the account is already
    /// registered, `Ok(true)` when a backend was newly constructed.
    pub async fn add_account(self: &Arc<Self>, account: &Account) -> Result<bool, SessionError> {
        if self.state.read().await.registry.contains_key(&account.id) {
            return Ok(false);
        }

        let backend = self.factory.create(account.protocol).ok_or_else(|| {
            warn!(account = %account.id, protocol = %account.protocol, "no backend for protocol");
            SessionError::UnknownProtocol(account.protocol)
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let context = BackendContext::new(
            account.clone(),
            tx,
            Arc::clone(&self.passwords) as Arc<dyn PasswordProvider>,
        );
        backend.setup(context).await;

        {
            let mut state = self.state.write().await;
            if state.registry.contains_key(&account.id) {
                return Ok(false);
            }
            state.active.push(account.id.clone());
            state.registry.insert(account.id.clone(), RegisteredBackend {
                account: account.clone(),
                backend,
            });
        }
        self.spawn_pump(account.id.clone(), rx);
        debug!(account = %account.id, "account registered");
        Ok(true)
    }

    /// Drop an account's backend from the registry and active list. Does not
    /// force a logout first; absent accounts are a no-op.
    pub async fn remove_account(&self, id: &AccountId) -> bool {
        let mut state = self.state.write().await;
        if state.registry.remove(id).is_none() {
            return false;
        }
        state.active.retain(|a| a != id);
        state.timers.remove(id);
        debug!(account = %id, "account unregistered");
        true
    }

    /// The backend registered for an account, if any.
    pub async fn backend(&self, id: &AccountId) -> Option<Arc<dyn ProtocolBackend>> {
        self.state
            .read()
            .await
            .registry
            .get(id)
            .map(|e| Arc::clone(&e.backend))
    }

    pub(crate) async fn entry(&self, id: &AccountId) -> Option<RegisteredBackend> {
        self.state.read().await.registry.get(id).cloned()
    }

    // ── Connection lifecycle ────────────────────────────────────────────────

    /// Log in one account, or every registered account when `account` is
    /// `None`. On the bulk path, `startup` skips accounts not marked for
    /// auto-connect; an explicitly requested account always connects.
    /// Already-connected backends are left alone.
    pub async fn connect(&self, account: Option<&AccountId>, startup: bool) {
        self.emit(SessionEvent::Connecting);

        let targets = match account {
            Some(id) => match self.entry(id).await {
                Some(entry) => vec![entry],
                None => {
                    warn!(account = %id, "connect requested for unknown account");
                    return;
                },
            },
            None => self.state.read().await.entries(),
        };

        for entry in targets {
            if entry.backend.is_connected() {
                continue;
            }
            if account.is_none() && startup && !entry.account.auto_connect {
                debug!(account = %entry.account.id, "skipping, auto-connect disabled");
                continue;
            }
            self.emit(SessionEvent::ProtocolConnecting(entry.account.clone()));
            self.state.write().await.connecting += 1;
            entry.backend.login().await;
        }
    }

    /// Log out one account, or every registered account when `None`.
    pub async fn disconnect(&self, account: Option<&AccountId>) {
        self.emit(SessionEvent::Disconnecting);

        let targets = match account {
            Some(id) => match self.entry(id).await {
                Some(entry) => vec![entry],
                None => {
                    warn!(account = %id, "disconnect requested for unknown account");
                    return;
                },
            },
            None => self.state.read().await.entries(),
        };

        for entry in targets {
            self.emit(SessionEvent::ProtocolDisconnecting(entry.account.clone()));
            entry.backend.logout().await;
        }
    }

    /// Whether one account (or, with `None`, any account) is connected.
    pub async fn is_connected(&self, account: Option<&AccountId>) -> bool {
        match account {
            Some(id) => self
                .entry(id)
                .await
                .is_some_and(|e| e.backend.is_connected()),
            None => self.state.read().await.connected > 0,
        }
    }

    /// Aggregate tally. Connected/disconnected are recomputed by polling
    /// each backend; connecting is the tracked in-flight login count.
    pub async fn count_accounts(&self) -> AccountCounts {
        let state = self.state.read().await;
        let total = state.active.len();
        let connected = state
            .entries()
            .iter()
            .filter(|e| e.backend.is_connected())
            .count();
        AccountCounts {
            connected,
            connecting: state.connecting as usize,
            disconnected: total - connected,
        }
    }

    /// Time since the account logged in; zero when it is not logged in.
    pub async fn connected_time(&self, id: &AccountId) -> Duration {
        self.state
            .read()
            .await
            .timers
            .get(id)
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    // ── Lookups ─────────────────────────────────────────────────────────────

    /// The account whose backend claims this contact, scanning the registry
    /// in insertion order (first match wins if backends disagree).
    pub async fn find_account(&self, contact: &Contact) -> Option<Account> {
        self.state
            .read()
            .await
            .owner_of(&contact.id)
            .map(|e| e.account)
    }

    /// First backend's match for a contact id, in insertion order.
    pub async fn find_contact(&self, contact_id: &str) -> Option<Contact> {
        self.state
            .read()
            .await
            .entries()
            .iter()
            .find_map(|e| e.backend.find_contact(contact_id))
    }

    // ── Query surface (pure reads) ──────────────────────────────────────────

    /// Registered accounts in insertion order.
    pub async fn accounts(&self) -> Vec<Account> {
        self.state
            .read()
            .await
            .entries()
            .into_iter()
            .map(|e| e.account)
            .collect()
    }

    /// The aggregate roster across all backends, newest first.
    pub async fn contacts(&self) -> Vec<Contact> {
        self.state.read().await.contacts.clone()
    }

    /// One backend's roster snapshot.
    pub async fn contacts_by_account(&self, id: &AccountId) -> Vec<Contact> {
        match self.entry(id).await {
            Some(entry) => entry.backend.contacts(),
            None => Vec::new(),
        }
    }

    /// Distinct roster group names across all known contacts, sorted.
    pub async fn groups(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut groups: Vec<String> = state
            .contacts
            .iter()
            .flat_map(|c| c.groups.iter().cloned())
            .collect();
        groups.sort();
        groups.dedup();
        groups
    }

    /// The local user as seen by one account's backend.
    pub async fn own_contact(&self, id: &AccountId) -> Option<Contact> {
        self.entry(id).await.and_then(|e| e.backend.own_contact())
    }

    /// Display name for the local user on one account, falling back to the
    /// account's label.
    pub async fn nickname(&self, id: &AccountId) -> Option<String> {
        let entry = self.entry(id).await?;
        Some(
            entry
                .backend
                .own_contact()
                .map(|c| c.name)
                .unwrap_or(entry.account.name),
        )
    }

    /// The current session-wide presence.
    pub async fn presence(&self) -> Presence {
        self.state.read().await.presence.clone()
    }

    /// The resource currently active for a contact on one account.
    pub async fn active_resource(&self, id: &AccountId, contact_id: &str) -> Option<String> {
        self.entry(id)
            .await
            .and_then(|e| e.backend.active_resource(contact_id))
    }

    /// The account's multi-user chat capability, if its backend has one.
    pub async fn chatroom_provider(&self, id: &AccountId) -> Option<Arc<dyn ChatroomProvider>> {
        self.entry(id).await.and_then(|e| e.backend.chatroom_provider())
    }

    /// The account's file transfer capability, if its backend has one.
    /// Keyed by account id, like every other registry lookup.
    pub async fn ft_provider(&self, id: &AccountId) -> Option<Arc<dyn FileTransferProvider>> {
        self.entry(id).await.and_then(|e| e.backend.ft_provider())
    }

    // ── Background tasks ────────────────────────────────────────────────────

    /// Mirror account manager notifications into the registry.
    fn spawn_mirror(self: &Arc<Self>) {
        let mut rx = self.manager.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "account notifications lagged");
                        continue;
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(session) = weak.upgrade() else { break };
                match event {
                    AccountEvent::Added(account) => {
                        if let Err(e) = session.add_account(&account).await {
                            warn!(account = %account.id, error = %e, "could not mirror account");
                        }
                    },
                    AccountEvent::Removed(account) => {
                        session.remove_account(&account.id).await;
                    },
                }
            }
        });
    }

    /// Drain one backend's event stream into the dispatcher. Ends when the
    /// backend (all senders) is dropped or the session goes away.
    fn spawn_pump(
        self: &Arc<Self>,
        account_id: AccountId,
        mut rx: mpsc::UnboundedReceiver<ProtocolEvent>,
    ) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(session) = weak.upgrade() else { break };
                session.dispatch(&account_id, event).await;
            }
        });
    }
}
