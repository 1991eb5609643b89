// ABOUTME: Connection error types with SNAFU pattern.
// ABOUTME: Separates unsupported transports, refused connects and missing sessions.

use snafu::Snafu;

use crate::remote::{ConnectorType, RemoteError, ServerKind};

/// Failure to obtain or keep a management session.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectionError {
    #[snafu(display("no client library is available for the {connector} connector"))]
    UnsupportedConnector { connector: ConnectorType },

    #[snafu(display("the {connector} connector cannot reach a {server} server"))]
    ConnectorMismatch {
        connector: ConnectorType,
        server: ServerKind,
    },

    #[snafu(display("unable to connect to {endpoint}: {source}"))]
    Connect {
        endpoint: String,
        source: RemoteError,
    },

    #[snafu(display("not connected to a management server"))]
    NotConnected,
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// The configured transport can't be used from this build.
    Unsupported,
    /// The server could not be reached.
    Unreachable,
    /// The server answered but refused the session.
    Refused,
    /// An operation needed a session and none exists.
    NotConnected,
}

impl ConnectionError {
    pub fn kind(&self) -> ConnectionErrorKind {
        match self {
            ConnectionError::UnsupportedConnector { .. }
            | ConnectionError::ConnectorMismatch { .. } => ConnectionErrorKind::Unsupported,
            ConnectionError::Connect { source, .. } if source.is_connection_loss() => {
                ConnectionErrorKind::Unreachable
            }
            ConnectionError::Connect { .. } => ConnectionErrorKind::Refused,
            ConnectionError::NotConnected => ConnectionErrorKind::NotConnected,
        }
    }
}
