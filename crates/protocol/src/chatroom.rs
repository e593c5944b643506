use std::fmt;

use async_trait::async_trait;

use gossip_common::{Contact, Message, ProtocolError};

/// Numeric id assigned per join; all room-scoped operations and events are
/// keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatroomId(pub u32);

impl fmt::Display for ChatroomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room#{}", self.0)
    }
}

/// A multi-user chat room description (where to join and as whom).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chatroom {
    pub name: String,
    pub server: String,
    pub room: String,
    pub nick: String,
    pub password: Option<String>,
}

/// Outcome of a join attempt, delivered asynchronously via
/// [`ChatroomEvent::Joined`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatroomJoinResult {
    Ok,
    NickInUse,
    NeedPassword,
    AlreadyOpen,
    TimedOut,
    UnknownHost,
    UnknownError,
    Canceled,
}

/// An invitation received from another party.
#[derive(Debug, Clone)]
pub struct ChatroomInvite {
    pub inviter: String,
    pub room: String,
    pub reason: Option<String>,
}

/// Per-room events, keyed by the join id.
#[derive(Debug, Clone)]
pub enum ChatroomEvent {
    Joined {
        id: ChatroomId,
        result: ChatroomJoinResult,
    },
    Kicked {
        id: ChatroomId,
    },
    NickChanged {
        id: ChatroomId,
        contact: Contact,
        new_nick: String,
    },
    Message {
        id: ChatroomId,
        message: Message,
    },
    /// Room status line (someone joined, left, ...).
    Event {
        id: ChatroomId,
        text: String,
    },
    SubjectChanged {
        id: ChatroomId,
        subject: String,
    },
    Invited(ChatroomInvite),
    Error {
        id: ChatroomId,
        error: ProtocolError,
    },
}

/// Multi-user chat capability some backends expose.
///
/// `join` assigns and returns the room id immediately; the result arrives
/// later as a `Joined` event. Every other mutating operation defaults to a
/// silent no-op — a provider that does not support kicking simply inherits
/// the empty body, which is the contract for missing capabilities, not an
/// error.
#[async_trait]
pub trait ChatroomProvider: Send + Sync {
    /// Start joining a room; returns the id the eventual result will be
    /// keyed by.
    async fn join(&self, chatroom: &Chatroom) -> ChatroomId;

    /// Cancel an in-flight join; the pending result becomes `Canceled`.
    async fn cancel(&self, _id: ChatroomId) {}

    async fn send(&self, _id: ChatroomId, _text: &str) {}

    async fn change_subject(&self, _id: ChatroomId, _subject: &str) {}

    async fn change_nick(&self, _id: ChatroomId, _nick: &str) {}

    async fn leave(&self, _id: ChatroomId) {}

    async fn kick(&self, _id: ChatroomId, _contact_id: &str, _reason: Option<&str>) {}

    async fn invite(&self, _id: ChatroomId, _contact_id: &str, _reason: Option<&str>) {}

    async fn invite_accept(&self, _invite: &ChatroomInvite, _nick: &str) {}

    async fn invite_decline(&self, _invite: &ChatroomInvite, _reason: Option<&str>) {}

    /// Look up a joined room by id.
    async fn find(&self, id: ChatroomId) -> Option<Chatroom>;

    /// All currently joined rooms.
    async fn rooms(&self) -> Vec<(ChatroomId, Chatroom)>;
}
