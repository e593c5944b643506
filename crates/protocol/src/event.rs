use gossip_common::{Contact, Message, ProtocolError};

use crate::chatroom::ChatroomEvent;

/// Events a backend reports to the session.
///
/// Per-backend ordering is preserved end to end (FIFO channel); ordering
/// between different backends' events is unspecified.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    /// Login completed; `is_connected` is now true.
    LoggedIn,
    /// Connection closed, whether requested or lost.
    LoggedOut,
    /// A protocol-level failure. The backend stays registered and retryable.
    Error(ProtocolError),
    Message(Message),
    ContactAdded(Contact),
    ContactUpdated(Contact),
    /// A contact's presence changed; the contact carries the new value.
    ContactPresence(Contact),
    ContactRemoved(Contact),
    Composing {
        contact_id: String,
        composing: bool,
    },
    /// Multi-user chat traffic, keyed by the numeric room id inside.
    Chatroom(ChatroomEvent),
}
