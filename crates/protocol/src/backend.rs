use std::sync::Arc;

use {async_trait::async_trait, tokio::sync::mpsc};

use gossip_accounts::Account;
use gossip_common::{Contact, Message, Presence, ProtocolError, Vcard, VersionInfo};

use crate::{chatroom::ChatroomProvider, event::ProtocolEvent, ft::FileTransferProvider};

// ── Password provider ───────────────────────────────────────────────────────

/// Answers password requests from backends that need credentials at login.
///
/// This replaces the old synchronous "get-password" signal: a backend asks
/// through its [`BackendContext`] and awaits the answer like any other
/// suspension point, instead of re-entering the event bus.
#[async_trait]
pub trait PasswordProvider: Send + Sync {
    /// Return the password for the account, or `None` to abort the login.
    async fn request_password(&self, account: &Account) -> Option<String>;
}

/// Default provider: answer from the account's stored password.
pub struct StoredPassword;

#[async_trait]
impl PasswordProvider for StoredPassword {
    async fn request_password(&self, account: &Account) -> Option<String> {
        account.password.clone()
    }
}

// ── Backend context ─────────────────────────────────────────────────────────

/// Everything a backend needs from its host: the account it is bound to, a
/// sender for its event stream, and the password provider.
///
/// Handed to the backend once at [`ProtocolBackend::setup`]. Cloneable so a
/// backend can share it with its capability adapters.
#[derive(Clone)]
pub struct BackendContext {
    account: Account,
    events: mpsc::UnboundedSender<ProtocolEvent>,
    passwords: Arc<dyn PasswordProvider>,
}

impl BackendContext {
    pub fn new(
        account: Account,
        events: mpsc::UnboundedSender<ProtocolEvent>,
        passwords: Arc<dyn PasswordProvider>,
    ) -> Self {
        Self {
            account,
            events,
            passwords,
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Report an event to the session. Silently dropped once the session is
    /// gone; a backend outliving its session has nothing left to notify.
    pub fn emit(&self, event: ProtocolEvent) {
        let _ = self.events.send(event);
    }

    pub async fn request_password(&self) -> Option<String> {
        self.passwords.request_password(&self.account).await
    }
}

// ── Protocol backend ────────────────────────────────────────────────────────

/// One live connection-and-capability implementation for a single account.
///
/// Lifecycle: constructed by the factory, bound to an account via `setup`,
/// then driven through login/logout. All long operations suspend instead of
/// blocking; failures surface either as typed `Err` values or as
/// [`ProtocolEvent::Error`] on the event stream, never as panics.
///
/// `is_connected` must be accurate at all times — the session polls it when
/// computing aggregate connected/disconnected counts.
#[async_trait]
pub trait ProtocolBackend: Send + Sync {
    /// Bind this backend to an account. Called exactly once, before any
    /// other operation.
    async fn setup(&self, context: BackendContext);

    /// Start logging in. Non-blocking; the outcome arrives later as a
    /// `LoggedIn` or `Error` event.
    async fn login(&self);

    /// Start logging out. Non-blocking; completion arrives as `LoggedOut`.
    async fn logout(&self);

    fn is_connected(&self) -> bool;

    async fn send_message(&self, message: &Message);

    async fn send_composing(&self, contact_id: &str, composing: bool);

    async fn set_presence(&self, presence: &Presence);

    /// Fetch a vcard; `None` means the account's own.
    async fn vcard(&self, contact_id: Option<&str>) -> Result<Vcard, ProtocolError>;

    async fn set_vcard(&self, vcard: &Vcard) -> Result<(), ProtocolError>;

    async fn version(&self, contact_id: &str) -> Result<VersionInfo, ProtocolError>;

    /// Register a new account with the server, optionally publishing a
    /// vcard alongside.
    async fn register_account(&self, vcard: Option<&Vcard>) -> Result<(), ProtocolError>;

    /// Cancel an in-flight registration. No-op when nothing is in flight.
    async fn register_cancel(&self) {}

    // Contact CRUD.
    async fn add_contact(&self, id: &str, name: &str, group: Option<&str>, message: Option<&str>);

    async fn update_contact(&self, contact: &Contact);

    async fn remove_contact(&self, contact_id: &str);

    /// Rename a roster group on this backend.
    async fn rename_group(&self, group: &str, new_name: &str);

    /// Roster lookup; also the ownership probe the session uses to decide
    /// which backend a contact belongs to.
    fn find_contact(&self, contact_id: &str) -> Option<Contact>;

    /// Snapshot of this backend's whole roster.
    fn contacts(&self) -> Vec<Contact>;

    /// The local user as seen by this backend.
    fn own_contact(&self) -> Option<Contact>;

    /// The resource/device currently active for a contact, if the protocol
    /// has such a notion.
    fn active_resource(&self, _contact_id: &str) -> Option<String> {
        None
    }

    /// Multi-user chat capability, if this backend has one.
    fn chatroom_provider(&self) -> Option<Arc<dyn ChatroomProvider>> {
        None
    }

    /// File transfer capability, if this backend has one.
    fn ft_provider(&self) -> Option<Arc<dyn FileTransferProvider>> {
        None
    }
}
