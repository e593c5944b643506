//! Protocol backend contracts.
//!
//! Each wire protocol (Jabber, ...) implements [`ProtocolBackend`] for one
//! account's connection, with optional capability adapters for multi-user
//! chat ([`ChatroomProvider`]) and file transfer ([`FileTransferProvider`]).
//! The session core drives backends exclusively through these traits and
//! never branches on the concrete protocol kind.
//!
//! Backends report lifecycle and data changes as [`ProtocolEvent`]s on the
//! mpsc sender handed to them in [`BackendContext`] at setup time; the
//! session serializes those into its aggregate state.

pub mod backend;
pub mod chatroom;
pub mod event;
pub mod factory;
pub mod ft;
pub mod loopback;

pub use backend::{BackendContext, PasswordProvider, ProtocolBackend, StoredPassword};
pub use chatroom::{
    Chatroom, ChatroomEvent, ChatroomId, ChatroomInvite, ChatroomJoinResult, ChatroomProvider,
};
pub use event::ProtocolEvent;
pub use factory::BackendFactory;
pub use ft::{FileTransferId, FileTransferProvider};
