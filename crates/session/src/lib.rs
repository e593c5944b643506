//! Session core: one coordination point over any number of concurrent
//! protocol connections.
//!
//! The [`Session`] owns one protocol backend per account, mirrors the bound
//! account manager's add/remove notifications into its registry, aggregates
//! connection state (connected/connecting counters, per-account login
//! timers) and contacts across backends, and routes outbound requests
//! (messages, presence, vcards, registration) to the right backend.
//! Observers consume [`SessionEvent`]s from a broadcast channel.

pub mod core;
mod dispatch;
pub mod error;
pub mod events;
mod ops;
mod passwords;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::{
    core::Session,
    error::SessionError,
    events::{AccountCounts, SessionEvent},
};
