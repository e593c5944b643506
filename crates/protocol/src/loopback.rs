//! In-process echo backend.
//!
//! Implements the full backend contract without any network: messages are
//! echoed back from the recipient, chatroom joins succeed immediately.
//! The CLI uses it as the `loopback` protocol; integration tests use it to
//! exercise the session end to end.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

use {async_trait::async_trait, tracing::debug};

use gossip_common::{Contact, Message, Presence, ProtocolError, Vcard, VersionInfo};

use crate::{
    backend::{BackendContext, ProtocolBackend},
    chatroom::{Chatroom, ChatroomEvent, ChatroomId, ChatroomJoinResult, ChatroomProvider},
    event::ProtocolEvent,
};

#[derive(Default)]
struct LoopbackState {
    context: Option<BackendContext>,
    roster: Vec<Contact>,
    own: Option<Contact>,
    vcard: Vcard,
    presence: Presence,
}

pub struct LoopbackBackend {
    connected: AtomicBool,
    state: RwLock<LoopbackState>,
    chatrooms: Arc<LoopbackChatrooms>,
}

impl Default for LoopbackBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            state: RwLock::new(LoopbackState::default()),
            chatrooms: Arc::new(LoopbackChatrooms::new()),
        }
    }

    fn context(&self) -> Option<BackendContext> {
        self.state.read().ok().and_then(|s| s.context.clone())
    }

    fn emit(&self, event: ProtocolEvent) {
        if let Some(ctx) = self.context() {
            ctx.emit(event);
        }
    }

    fn own_id(&self) -> String {
        self.state
            .read()
            .ok()
            .and_then(|s| s.own.as_ref().map(|c| c.id.clone()))
            .unwrap_or_default()
    }

    /// Make sure the recipient exists in the roster, announcing it when new.
    fn ensure_peer(&self, id: &str) -> Contact {
        let mut added = None;
        let contact = {
            let mut state = match self.state.write() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            match state.roster.iter().find(|c| c.id == id) {
                Some(c) => c.clone(),
                None => {
                    let contact =
                        Contact::new(id, id).with_groups(vec!["Loopback".to_string()]);
                    state.roster.insert(0, contact.clone());
                    added = Some(contact.clone());
                    contact
                },
            }
        };
        if let Some(contact) = added {
            self.emit(ProtocolEvent::ContactAdded(contact));
        }
        contact
    }
}

#[async_trait]
impl ProtocolBackend for LoopbackBackend {
    async fn setup(&self, context: BackendContext) {
        let account = context.account().clone();
        let own_id = if account.username.is_empty() {
            account.id.to_string()
        } else {
            format!("{}@{}", account.username, account.server)
        };
        self.chatrooms.bind(context.clone());
        if let Ok(mut state) = self.state.write() {
            state.own = Some(Contact::new(own_id, account.name.clone()));
            state.context = Some(context);
        }
    }

    async fn login(&self) {
        if self.connected.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(own = %self.own_id(), "loopback login");
        self.emit(ProtocolEvent::LoggedIn);
    }

    async fn logout(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        debug!(own = %self.own_id(), "loopback logout");
        self.emit(ProtocolEvent::LoggedOut);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_message(&self, message: &Message) {
        if !self.is_connected() {
            return;
        }
        self.ensure_peer(&message.to);
        // Echo the message back from the recipient.
        let echo = Message::from(message.to.clone(), self.own_id(), message.body.clone());
        self.emit(ProtocolEvent::Message(echo));
    }

    async fn send_composing(&self, contact_id: &str, composing: bool) {
        if !self.is_connected() {
            return;
        }
        // The echo peer starts "typing" whenever we do.
        self.emit(ProtocolEvent::Composing {
            contact_id: contact_id.to_string(),
            composing,
        });
    }

    async fn set_presence(&self, presence: &Presence) {
        if let Ok(mut state) = self.state.write() {
            state.presence = presence.clone();
        }
    }

    async fn vcard(&self, contact_id: Option<&str>) -> Result<Vcard, ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NoConnection);
        }
        match contact_id {
            None => Ok(self.state.read().map(|s| s.vcard.clone()).unwrap_or_default()),
            Some(id) => Ok(Vcard {
                name: Some(id.to_string()),
                ..Vcard::default()
            }),
        }
    }

    async fn set_vcard(&self, vcard: &Vcard) -> Result<(), ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NoConnection);
        }
        if let Ok(mut state) = self.state.write() {
            state.vcard = vcard.clone();
        }
        Ok(())
    }

    async fn version(&self, _contact_id: &str) -> Result<VersionInfo, ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NoConnection);
        }
        Ok(VersionInfo {
            name: "gossip-loopback".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            os: Some(std::env::consts::OS.to_string()),
        })
    }

    async fn register_account(&self, _vcard: Option<&Vcard>) -> Result<(), ProtocolError> {
        // Nothing to register against; local accounts always exist.
        Ok(())
    }

    async fn add_contact(&self, id: &str, name: &str, group: Option<&str>, _message: Option<&str>) {
        let contact = Contact::new(id, name)
            .with_groups(group.map(|g| vec![g.to_string()]).unwrap_or_default());
        if let Ok(mut state) = self.state.write() {
            if state.roster.iter().any(|c| c.id == id) {
                return;
            }
            state.roster.insert(0, contact.clone());
        }
        self.emit(ProtocolEvent::ContactAdded(contact));
    }

    async fn update_contact(&self, contact: &Contact) {
        let mut updated = false;
        if let Ok(mut state) = self.state.write() {
            if let Some(existing) = state.roster.iter_mut().find(|c| c.id == contact.id) {
                *existing = contact.clone();
                updated = true;
            }
        }
        if updated {
            self.emit(ProtocolEvent::ContactUpdated(contact.clone()));
        }
    }

    async fn remove_contact(&self, contact_id: &str) {
        let removed = self.state.write().ok().and_then(|mut state| {
            let pos = state.roster.iter().position(|c| c.id == contact_id)?;
            Some(state.roster.remove(pos))
        });
        if let Some(contact) = removed {
            self.emit(ProtocolEvent::ContactRemoved(contact));
        }
    }

    async fn rename_group(&self, group: &str, new_name: &str) {
        let mut changed = Vec::new();
        if let Ok(mut state) = self.state.write() {
            for contact in state.roster.iter_mut() {
                if let Some(g) = contact.groups.iter_mut().find(|g| *g == group) {
                    *g = new_name.to_string();
                    changed.push(contact.clone());
                }
            }
        }
        for contact in changed {
            self.emit(ProtocolEvent::ContactUpdated(contact));
        }
    }

    fn find_contact(&self, contact_id: &str) -> Option<Contact> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.roster.iter().find(|c| c.id == contact_id).cloned())
    }

    fn contacts(&self) -> Vec<Contact> {
        self.state.read().map(|s| s.roster.clone()).unwrap_or_default()
    }

    fn own_contact(&self) -> Option<Contact> {
        self.state.read().ok().and_then(|s| s.own.clone())
    }

    fn active_resource(&self, _contact_id: &str) -> Option<String> {
        self.is_connected().then(|| "loopback".to_string())
    }

    fn chatroom_provider(&self) -> Option<Arc<dyn ChatroomProvider>> {
        Some(Arc::clone(&self.chatrooms) as Arc<dyn ChatroomProvider>)
    }
}

// ── Loopback chatrooms ──────────────────────────────────────────────────────

/// Chatroom capability of the loopback backend: joins succeed immediately,
/// room messages are echoed back from a phantom "echo" occupant.
pub struct LoopbackChatrooms {
    context: Mutex<Option<BackendContext>>,
    rooms: RwLock<HashMap<ChatroomId, Chatroom>>,
    next_id: AtomicU32,
}

impl LoopbackChatrooms {
    fn new() -> Self {
        Self {
            context: Mutex::new(None),
            rooms: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(0),
        }
    }

    fn bind(&self, context: BackendContext) {
        if let Ok(mut slot) = self.context.lock() {
            *slot = Some(context);
        }
    }

    fn emit(&self, event: ChatroomEvent) {
        let ctx = self.context.lock().ok().and_then(|slot| slot.clone());
        if let Some(ctx) = ctx {
            ctx.emit(ProtocolEvent::Chatroom(event));
        }
    }
}

#[async_trait]
impl ChatroomProvider for LoopbackChatrooms {
    async fn join(&self, chatroom: &Chatroom) -> ChatroomId {
        let id = ChatroomId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        if let Ok(mut rooms) = self.rooms.write() {
            rooms.insert(id, chatroom.clone());
        }
        debug!(%id, room = %chatroom.room, "loopback chatroom joined");
        self.emit(ChatroomEvent::Joined {
            id,
            result: ChatroomJoinResult::Ok,
        });
        id
    }

    async fn send(&self, id: ChatroomId, text: &str) {
        let room = self.rooms.read().ok().and_then(|r| r.get(&id).cloned());
        if let Some(room) = room {
            let echo = Message::from(format!("{}/echo", room.room), room.nick, text);
            self.emit(ChatroomEvent::Message { id, message: echo });
        }
    }

    async fn change_subject(&self, id: ChatroomId, subject: &str) {
        if self.rooms.read().ok().is_some_and(|r| r.contains_key(&id)) {
            self.emit(ChatroomEvent::SubjectChanged {
                id,
                subject: subject.to_string(),
            });
        }
    }

    async fn change_nick(&self, id: ChatroomId, nick: &str) {
        let changed = self
            .rooms
            .write()
            .ok()
            .and_then(|mut rooms| {
                rooms.get_mut(&id).map(|room| {
                    let old = std::mem::replace(&mut room.nick, nick.to_string());
                    Contact::new(format!("{}/{old}", room.room), old)
                })
            });
        if let Some(contact) = changed {
            self.emit(ChatroomEvent::NickChanged {
                id,
                contact,
                new_nick: nick.to_string(),
            });
        }
    }

    async fn leave(&self, id: ChatroomId) {
        let left = self.rooms.write().ok().and_then(|mut r| r.remove(&id));
        if let Some(room) = left {
            self.emit(ChatroomEvent::Event {
                id,
                text: format!("{} left the room", room.nick),
            });
        }
    }

    async fn find(&self, id: ChatroomId) -> Option<Chatroom> {
        self.rooms.read().ok().and_then(|r| r.get(&id).cloned())
    }

    async fn rooms(&self) -> Vec<(ChatroomId, Chatroom)> {
        let mut rooms: Vec<_> = self
            .rooms
            .read()
            .map(|r| r.iter().map(|(id, room)| (*id, room.clone())).collect())
            .unwrap_or_default();
        rooms.sort_by_key(|(id, _)| *id);
        rooms
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use gossip_accounts::{Account, ProtocolKind};

    use super::*;
    use crate::backend::StoredPassword;

    async fn wired_backend() -> (LoopbackBackend, mpsc::UnboundedReceiver<ProtocolEvent>) {
        let backend = LoopbackBackend::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let account = Account::new("local", "Local", ProtocolKind::Loopback)
            .with_server("localhost", 0);
        backend
            .setup(BackendContext::new(account, tx, Arc::new(StoredPassword)))
            .await;
        (backend, rx)
    }

    #[tokio::test]
    async fn login_logout_events() {
        let (backend, mut rx) = wired_backend().await;
        backend.login().await;
        assert!(backend.is_connected());
        assert!(matches!(rx.recv().await, Some(ProtocolEvent::LoggedIn)));

        // Second login is a no-op.
        backend.login().await;
        backend.logout().await;
        assert!(!backend.is_connected());
        assert!(matches!(rx.recv().await, Some(ProtocolEvent::LoggedOut)));
    }

    #[tokio::test]
    async fn messages_are_echoed() {
        let (backend, mut rx) = wired_backend().await;
        backend.login().await;
        let _ = rx.recv().await; // LoggedIn

        backend
            .send_message(&Message::to("peer@localhost", "hello"))
            .await;

        // First the unknown recipient is announced, then the echo arrives.
        match rx.recv().await {
            Some(ProtocolEvent::ContactAdded(c)) => assert_eq!(c.id, "peer@localhost"),
            other => panic!("expected ContactAdded, got {other:?}"),
        }
        match rx.recv().await {
            Some(ProtocolEvent::Message(m)) => {
                assert_eq!(m.from.as_deref(), Some("peer@localhost"));
                assert_eq!(m.body, "hello");
            },
            other => panic!("expected Message, got {other:?}"),
        }
        assert!(backend.find_contact("peer@localhost").is_some());
    }

    #[tokio::test]
    async fn disconnected_send_is_dropped() {
        let (backend, mut rx) = wired_backend().await;
        backend.send_message(&Message::to("peer@localhost", "hello")).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn chatroom_join_and_echo() {
        let (backend, mut rx) = wired_backend().await;
        backend.login().await;
        let _ = rx.recv().await; // LoggedIn

        let provider = backend.chatroom_provider().expect("loopback has chatrooms");
        let room = Chatroom {
            name: "Test".into(),
            server: "localhost".into(),
            room: "test".into(),
            nick: "me".into(),
            password: None,
        };
        let id = provider.join(&room).await;
        match rx.recv().await {
            Some(ProtocolEvent::Chatroom(ChatroomEvent::Joined { id: got, result })) => {
                assert_eq!(got, id);
                assert_eq!(result, ChatroomJoinResult::Ok);
            },
            other => panic!("expected Joined, got {other:?}"),
        }

        provider.send(id, "hi room").await;
        match rx.recv().await {
            Some(ProtocolEvent::Chatroom(ChatroomEvent::Message { id: got, message })) => {
                assert_eq!(got, id);
                assert_eq!(message.body, "hi room");
            },
            other => panic!("expected room Message, got {other:?}"),
        }

        assert_eq!(provider.rooms().await.len(), 1);
        provider.leave(id).await;
        assert!(provider.find(id).await.is_none());

        // Optional operations we don't implement are silent no-ops.
        provider.kick(id, "someone", None).await;
    }
}
