use {
    gossip_accounts::Account,
    gossip_common::{Contact, Message, Presence, ProtocolError},
    gossip_protocol::ChatroomEvent,
};

/// Session-wide events, relayed to observers on a broadcast channel.
///
/// The bare lifecycle variants (`Connecting`/`Connected`/...) describe the
/// session as a whole: `Connected` fires only on the zero-to-one transition
/// of connected accounts, `Disconnected` only on the one-to-zero transition.
/// The `Protocol*` variants fire once per account.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    ProtocolConnecting(Account),
    ProtocolConnected(Account),
    ProtocolDisconnecting(Account),
    ProtocolDisconnected(Account),
    ProtocolError {
        account: Account,
        error: ProtocolError,
    },
    NewMessage(Message),
    /// The local presence changed. Fires exactly once per `set_presence`
    /// call, however many backends were pushed to.
    PresenceChanged(Presence),
    ContactAdded(Contact),
    ContactUpdated(Contact),
    ContactPresenceUpdated(Contact),
    /// Fires while the contact is still queryable in the aggregate roster;
    /// the roster entry is dropped right after the relay.
    ContactRemoved(Contact),
    Composing {
        contact_id: String,
        composing: bool,
    },
    Chatroom {
        account: Account,
        event: ChatroomEvent,
    },
}

/// Aggregate account tally as reported by `count_accounts`.
///
/// `connected` and `disconnected` are recomputed from backend state and sum
/// to the number of registered accounts; `connecting` counts in-flight login
/// attempts (between the login request and the first resulting event) and is
/// tracked separately because no backend flag exposes that window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountCounts {
    pub connected: usize,
    pub connecting: usize,
    pub disconnected: usize,
}
