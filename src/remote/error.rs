// ABOUTME: Errors reported by a management client implementation.
// ABOUTME: Distinguishes connectivity, lookup, validation and operation failures.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("not connected to the management server")]
    NotConnected,

    #[error("management server unreachable: {0}")]
    Unreachable(String),

    #[error("management object not found: {0}")]
    ObjectNotFound(String),

    #[error("listener registration rejected: {0}")]
    ListenerRejected(String),

    #[error("request rejected by validation: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("application {0} is not installed")]
    NotInstalled(String),

    #[error("operation failed: {0}")]
    Operation(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    /// Whether the error means the connection itself is gone.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, RemoteError::NotConnected | RemoteError::Unreachable(_))
    }
}
