//! Account management.
//!
//! An [`Account`] is a configured identity (server, credentials, protocol
//! kind) that may or may not currently be connected. The [`AccountManager`]
//! owns the set of accounts and notifies subscribers when it changes; the
//! session core mirrors those notifications into its backend registry.
//! Persistence is a plain TOML file handled by [`store::AccountStore`].

pub mod account;
pub mod manager;
pub mod store;

pub use account::{Account, AccountId, ProtocolKind};
pub use manager::{AccountEvent, AccountManager};
