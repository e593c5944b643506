//! Scripted backend for session tests: records every call, reports exactly
//! the connection state the test sets, and lets tests inject events through
//! the real context channel.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;

use {
    gossip_accounts::{Account, ProtocolKind},
    gossip_common::{Contact, Message, Presence, ProtocolError, Vcard, VersionInfo},
    gossip_protocol::{BackendContext, BackendFactory, ProtocolBackend, ProtocolEvent},
};

#[derive(Default)]
pub(crate) struct MockBackend {
    connected: AtomicBool,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub fail_set_vcard: AtomicBool,
    pub sent: Mutex<Vec<Message>>,
    pub presences: Mutex<Vec<Presence>>,
    pub composing: Mutex<Vec<(String, bool)>>,
    pub roster: Mutex<Vec<Contact>>,
    context: Mutex<Option<BackendContext>>,
}

impl MockBackend {
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn add_to_roster(&self, contact: Contact) {
        if let Ok(mut roster) = self.roster.lock() {
            roster.push(contact);
        }
    }

    /// Push an event through the real backend→session channel.
    pub fn inject(&self, event: ProtocolEvent) {
        let ctx = self.context.lock().ok().and_then(|c| c.clone());
        if let Some(ctx) = ctx {
            ctx.emit(event);
        }
    }

    pub async fn request_password(&self) -> Option<String> {
        let ctx = self.context.lock().ok().and_then(|c| c.clone())?;
        ctx.request_password().await
    }
}

#[async_trait]
impl ProtocolBackend for MockBackend {
    async fn setup(&self, context: BackendContext) {
        if let Ok(mut slot) = self.context.lock() {
            *slot = Some(context);
        }
    }

    async fn login(&self) {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn logout(&self) {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_message(&self, message: &Message) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
    }

    async fn send_composing(&self, contact_id: &str, composing: bool) {
        if let Ok(mut calls) = self.composing.lock() {
            calls.push((contact_id.to_string(), composing));
        }
    }

    async fn set_presence(&self, presence: &Presence) {
        if let Ok(mut presences) = self.presences.lock() {
            presences.push(presence.clone());
        }
    }

    async fn vcard(&self, contact_id: Option<&str>) -> Result<Vcard, ProtocolError> {
        Ok(Vcard {
            name: contact_id.map(str::to_string),
            ..Vcard::default()
        })
    }

    async fn set_vcard(&self, _vcard: &Vcard) -> Result<(), ProtocolError> {
        if self.fail_set_vcard.load(Ordering::SeqCst) {
            Err(ProtocolError::Other("scripted failure".into()))
        } else {
            Ok(())
        }
    }

    async fn version(&self, _contact_id: &str) -> Result<VersionInfo, ProtocolError> {
        Ok(VersionInfo {
            name: "mock".into(),
            version: "0.0".into(),
            os: None,
        })
    }

    async fn register_account(&self, _vcard: Option<&Vcard>) -> Result<(), ProtocolError> {
        Ok(())
    }

    async fn add_contact(
        &self,
        _id: &str,
        _name: &str,
        _group: Option<&str>,
        _message: Option<&str>,
    ) {
    }

    async fn update_contact(&self, _contact: &Contact) {}

    async fn remove_contact(&self, _contact_id: &str) {}

    async fn rename_group(&self, _group: &str, _new_name: &str) {}

    fn find_contact(&self, contact_id: &str) -> Option<Contact> {
        self.roster
            .lock()
            .ok()
            .and_then(|r| r.iter().find(|c| c.id == contact_id).cloned())
    }

    fn contacts(&self) -> Vec<Contact> {
        self.roster.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn own_contact(&self) -> Option<Contact> {
        None
    }
}

pub(crate) type CreatedMocks = Arc<Mutex<Vec<Arc<MockBackend>>>>;

/// A factory producing mock backends for the `jabber` kind, plus the list of
/// every instance it constructed (in construction order).
pub(crate) fn mock_factory() -> (BackendFactory, CreatedMocks) {
    let created: CreatedMocks = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&created);
    let mut factory = BackendFactory::new();
    factory.register(ProtocolKind::Jabber, move || {
        let backend = Arc::new(MockBackend::default());
        if let Ok(mut list) = sink.lock() {
            list.push(Arc::clone(&backend));
        }
        backend as Arc<dyn ProtocolBackend>
    });
    (factory, created)
}

pub(crate) fn jabber_account(id: &str, auto_connect: bool) -> Account {
    Account::new(id, id, ProtocolKind::Jabber)
        .with_server("example.org", 5222)
        .with_auto_connect(auto_connect)
}

/// A session over mock backends, pre-seeded with the given accounts.
pub(crate) async fn mock_session(
    accounts: Vec<Account>,
) -> (Arc<crate::core::Session>, CreatedMocks) {
    let (factory, created) = mock_factory();
    let manager = Arc::new(gossip_accounts::AccountManager::with_accounts(accounts));
    let session = crate::core::Session::new(manager, factory).await;
    (session, created)
}

/// Drain everything currently queued on an event subscription.
pub(crate) fn drain(
    rx: &mut tokio::sync::broadcast::Receiver<crate::events::SessionEvent>,
) -> Vec<crate::events::SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
