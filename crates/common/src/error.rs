use thiserror::Error;

/// Structured protocol-level failures reported by backends.
///
/// These are never fatal to the session: the backend that raised one stays
/// registered in a disconnected, retryable state. Clone because the same
/// value travels both in operation results and in broadcast events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("no connection to server")]
    NoConnection,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("authentication failed")]
    AuthFailed,
    #[error("connection timed out")]
    Timeout,
    #[error("unknown host")]
    UnknownHost,
    #[error("account registration failed: {0}")]
    RegistrationFailed(String),
    #[error("operation not supported by this backend")]
    Unsupported,
    #[error("{0}")]
    Other(String),
}
