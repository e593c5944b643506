//! Shared domain types for the gossip workspace.
//!
//! Contacts, presence, messages and vcards are produced by protocol
//! backends and aggregated by the session core; every other crate speaks
//! these types.

pub mod error;
pub mod types;

pub use error::ProtocolError;
pub use types::{Contact, Message, Presence, PresenceState, Vcard, VersionInfo};
