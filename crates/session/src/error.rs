use thiserror::Error;

use {
    gossip_accounts::{AccountId, ProtocolKind},
    gossip_common::ProtocolError,
};

/// Failures of session-level operations.
///
/// Backend-reported network failures pass through as `Protocol`; the rest
/// are contract errors on the caller's side (unknown account, no registered
/// backend for a protocol kind).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no backend registered for protocol {0}")]
    UnknownProtocol(ProtocolKind),
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),
    #[error("no backend could be resolved for the request")]
    NoBackend,
    /// At least one backend rejected the vcard. Which one is not reported:
    /// the aggregate result deliberately keeps the all-or-nothing shape the
    /// UI relies on.
    #[error("vcard update failed on at least one backend")]
    VcardUpdateFailed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
