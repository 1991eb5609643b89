// ABOUTME: Lifecycle of the single management session used by a deployment run.
// ABOUTME: Idempotent connect, safe disconnect, liveness probing and reconnects.

mod error;
mod security;

pub use error::{ConnectionError, ConnectionErrorKind};
pub use security::{PROCESS_SECURITY_VARS, SecurityScope};

use snafu::{OptionExt, ResultExt};
use std::sync::Arc;

use crate::remote::liberty::simulated::SimulatedLiberty;
use crate::remote::simulated::SimulatedServer;
use crate::remote::{ClientHandle, Connector, ConnectorType, Credentials, Endpoint, ServerKind};

/// Pick the connector for a transport and server flavour.
///
/// Only the in-process simulated servers ship with this build; real
/// transports need a vendor client library behind the [`Connector`] trait.
pub fn connector_for(
    kind: ConnectorType,
    server: ServerKind,
) -> Result<Arc<dyn Connector>, ConnectionError> {
    let fits = match server {
        ServerKind::Cell => kind != ConnectorType::Rest,
        ServerKind::Liberty => matches!(kind, ConnectorType::Rest | ConnectorType::Simulated),
    };
    if !fits {
        return error::ConnectorMismatchSnafu {
            connector: kind,
            server,
        }
        .fail();
    }

    match (kind, server) {
        (ConnectorType::Simulated, ServerKind::Cell) => {
            Ok(Arc::new(SimulatedServer::new().connector()))
        }
        (ConnectorType::Simulated, ServerKind::Liberty) => {
            Ok(Arc::new(SimulatedLiberty::new().connector()))
        }
        (other, _) => error::UnsupportedConnectorSnafu { connector: other }.fail(),
    }
}

/// Owns the client handle and the process-wide security snapshot taken for it.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    client: Option<ClientHandle>,
    last_target: Option<(Endpoint, Option<Credentials>)>,
    security: Option<SecurityScope>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connected", &self.client.is_some())
            .field("endpoint", &self.last_target.as_ref().map(|(e, _)| e))
            .finish()
    }
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            client: None,
            last_target: None,
            security: None,
        }
    }

    /// Open a session. Calling this while a live session exists keeps that
    /// session and only logs a warning.
    pub async fn connect(
        &mut self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
    ) -> Result<(), ConnectionError> {
        if self.is_connected().await {
            tracing::warn!(%endpoint, "already connected; keeping the existing session");
            return Ok(());
        }

        // A dead handle may still hold a security snapshot.
        self.disconnect().await;

        let scope = credentials.map(|_| SecurityScope::capture());
        let client = self
            .connector
            .connect(endpoint, credentials)
            .await
            .context(error::ConnectSnafu {
                endpoint: endpoint.to_string(),
            })?;

        tracing::info!(%endpoint, secured = credentials.is_some(), "connected to management server");
        self.client = Some(client);
        self.security = scope;
        self.last_target = Some((endpoint.clone(), credentials.cloned()));
        Ok(())
    }

    /// Drop the current session, if any, and connect again to the last endpoint.
    pub async fn reconnect(&mut self) -> Result<(), ConnectionError> {
        let (endpoint, credentials) = self
            .last_target
            .clone()
            .context(error::NotConnectedSnafu)?;
        self.disconnect().await;
        self.connect(&endpoint, credentials.as_ref()).await
    }

    /// The live client, reconnecting first if the session has gone away.
    pub async fn ensure_connected(&mut self) -> Result<ClientHandle, ConnectionError> {
        if !self.is_connected().await {
            tracing::warn!("management session lost; reconnecting");
            self.reconnect().await?;
        }
        self.client()
    }

    /// Close the session and restore process security settings. Always safe.
    pub async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            client.close().await;
            tracing::debug!("management session closed");
        }
        if let Some(scope) = self.security.take() {
            scope.restore();
        }
    }

    /// Probe the session. Probe errors count as "not connected".
    pub async fn is_connected(&self) -> bool {
        match &self.client {
            Some(client) => client.is_alive().await.unwrap_or(false),
            None => false,
        }
    }

    pub fn client(&self) -> Result<ClientHandle, ConnectionError> {
        self.client.clone().context(error::NotConnectedSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::simulated::Call;

    fn endpoint() -> Endpoint {
        Endpoint {
            host: "localhost".to_string(),
            port: 8879,
            connector: ConnectorType::Simulated,
        }
    }

    #[test]
    fn only_simulated_connector_is_built_in() {
        assert!(connector_for(ConnectorType::Simulated, ServerKind::Cell).is_ok());
        assert!(connector_for(ConnectorType::Simulated, ServerKind::Liberty).is_ok());

        let err = connector_for(ConnectorType::Soap, ServerKind::Cell).err().unwrap();
        assert_eq!(err.kind(), ConnectionErrorKind::Unsupported);
        assert!(err.to_string().contains("soap"));

        let err = connector_for(ConnectorType::Rest, ServerKind::Liberty).err().unwrap();
        assert!(matches!(err, ConnectionError::UnsupportedConnector { .. }));
    }

    #[test]
    fn connector_must_suit_the_server() {
        let err = connector_for(ConnectorType::Rest, ServerKind::Cell).err().unwrap();
        assert_eq!(err.kind(), ConnectionErrorKind::Unsupported);
        assert_eq!(err.to_string(), "the rest connector cannot reach a cell server");

        let err = connector_for(ConnectorType::Soap, ServerKind::Liberty).err().unwrap();
        assert!(matches!(err, ConnectionError::ConnectorMismatch { .. }));
    }

    #[tokio::test]
    async fn client_before_connect_is_not_connected() {
        let server = SimulatedServer::new();
        let manager = ConnectionManager::new(Arc::new(server.connector()));
        assert!(!manager.is_connected().await);
        assert_eq!(
            manager.client().err().unwrap().kind(),
            ConnectionErrorKind::NotConnected
        );
    }

    #[tokio::test]
    async fn connect_twice_keeps_one_session() {
        let server = SimulatedServer::new();
        let mut manager = ConnectionManager::new(Arc::new(server.connector()));

        manager.connect(&endpoint(), None).await.unwrap();
        manager.connect(&endpoint(), None).await.unwrap();

        let connects = server.calls().iter().filter(|c| **c == Call::Connect).count();
        assert_eq!(connects, 1);
        assert!(manager.is_connected().await);
    }

    #[tokio::test]
    async fn disconnect_is_safe_without_session() {
        let server = SimulatedServer::new();
        let mut manager = ConnectionManager::new(Arc::new(server.connector()));
        manager.disconnect().await;
        manager.connect(&endpoint(), None).await.unwrap();
        manager.disconnect().await;
        manager.disconnect().await;
        assert!(!manager.is_connected().await);
        assert!(!server.is_session_open());
    }

    #[tokio::test]
    async fn unreachable_server_is_reported() {
        let server = SimulatedServer::new();
        server.set_reachable(false);
        let mut manager = ConnectionManager::new(Arc::new(server.connector()));
        let err = manager.connect(&endpoint(), None).await.unwrap_err();
        assert_eq!(err.kind(), ConnectionErrorKind::Unreachable);
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn ensure_connected_recovers_dropped_session() {
        let server = SimulatedServer::new();
        let mut manager = ConnectionManager::new(Arc::new(server.connector()));
        manager.connect(&endpoint(), None).await.unwrap();

        server.drop_session();
        assert!(!manager.is_connected().await);

        manager.ensure_connected().await.unwrap();
        assert!(manager.is_connected().await);
    }

    fn secured() -> Credentials {
        Credentials {
            username: "admin".to_string(),
            password: "secret".to_string(),
            trust_store: Some("/tmp/trust.p12".into()),
            trust_store_password: None,
            key_store: Some("/tmp/key.p12".into()),
            key_store_password: None,
        }
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn var(key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    #[test]
    fn disconnect_restores_settings_changed_by_secured_connect() {
        temp_env::with_vars(
            [
                ("SSL_CERT_FILE", Some("/etc/orig.pem")),
                ("SSL_CLIENT_CERT", None),
            ],
            || {
                block_on(async {
                    let server = SimulatedServer::new();
                    let mut manager = ConnectionManager::new(Arc::new(server.connector()));

                    manager.connect(&endpoint(), Some(&secured())).await.unwrap();
                    assert_eq!(var("SSL_CERT_FILE").as_deref(), Some("/tmp/trust.p12"));
                    assert_eq!(var("SSL_CLIENT_CERT").as_deref(), Some("/tmp/key.p12"));

                    manager.disconnect().await;
                    assert_eq!(var("SSL_CERT_FILE").as_deref(), Some("/etc/orig.pem"));
                    assert!(std::env::var_os("SSL_CLIENT_CERT").is_none());

                    manager.disconnect().await;
                    assert_eq!(var("SSL_CERT_FILE").as_deref(), Some("/etc/orig.pem"));
                });
            },
        );
    }

    #[test]
    fn failed_secured_connect_leaves_settings_untouched() {
        temp_env::with_vars(
            [
                ("SSL_CERT_FILE", Some("/etc/orig.pem")),
                ("SSL_CLIENT_CERT", None),
            ],
            || {
                block_on(async {
                    let server = SimulatedServer::new();
                    server.set_reachable(false);
                    let mut manager = ConnectionManager::new(Arc::new(server.connector()));

                    let err = manager
                        .connect(&endpoint(), Some(&secured()))
                        .await
                        .unwrap_err();

                    assert_eq!(err.kind(), ConnectionErrorKind::Unreachable);
                    assert_eq!(var("SSL_CERT_FILE").as_deref(), Some("/etc/orig.pem"));
                    assert!(std::env::var_os("SSL_CLIENT_CERT").is_none());
                });
            },
        );
    }

    #[tokio::test]
    async fn reconnect_without_prior_connect_fails() {
        let server = SimulatedServer::new();
        let mut manager = ConnectionManager::new(Arc::new(server.connector()));
        let err = manager.reconnect().await.unwrap_err();
        assert_eq!(err.kind(), ConnectionErrorKind::NotConnected);
    }
}
