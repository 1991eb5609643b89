// ABOUTME: Capability traits for a management client connected to an application server.
// ABOUTME: Notification bus, server queries and application management operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::RemoteError;
use super::notification::{NotificationFilter, NotificationListener};
use crate::artifact::{AttributeSet, DeploymentOptions};
use crate::types::{AppName, ListenerId, ObjectName};

/// Shared handle to a live management client.
pub type ClientHandle = Arc<dyn ManagementClient>;

/// Transport used to reach the management server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    #[default]
    Soap,
    Rmi,
    Ipc,
    /// JMX over HTTPS, as exposed by a standalone Liberty server.
    Rest,
    /// In-process server, for dry runs and tests.
    Simulated,
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectorType::Soap => "soap",
            ConnectorType::Rmi => "rmi",
            ConnectorType::Ipc => "ipc",
            ConnectorType::Rest => "rest",
            ConnectorType::Simulated => "simulated",
        };
        f.write_str(name)
    }
}

/// Flavour of application server behind the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    /// A network deployment cell managed through its deployment manager.
    #[default]
    Cell,
    /// A standalone Liberty server that deploys from its dropins directory.
    Liberty,
}

impl ServerKind {
    /// Liberty installs plain modules; a cell only takes enterprise archives.
    pub fn requires_ear(self) -> bool {
        self == ServerKind::Cell
    }

    /// Liberty has no in-place update.
    pub fn supports_update(self) -> bool {
        self == ServerKind::Cell
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServerKind::Cell => "cell",
            ServerKind::Liberty => "liberty",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub connector: ConnectorType,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.port, self.connector)
    }
}

/// Authentication material for a secured connection.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub trust_store: Option<PathBuf>,
    pub trust_store_password: Option<String>,
    pub key_store: Option<PathBuf>,
    pub key_store_password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const REDACTED: &str = "<redacted>";
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("trust_store", &self.trust_store)
            .field(
                "trust_store_password",
                &self.trust_store_password.as_ref().map(|_| REDACTED),
            )
            .field("key_store", &self.key_store)
            .field(
                "key_store_password",
                &self.key_store_password.as_ref().map(|_| REDACTED),
            )
            .finish()
    }
}

/// Listener registration on management objects.
///
/// These calls are synchronous: they are made from inside notification
/// callbacks, which run on the client library's delivery thread.
pub trait NotificationBus: Send + Sync {
    fn add_notification_listener(
        &self,
        object: &ObjectName,
        filter: &NotificationFilter,
        listener: Arc<dyn NotificationListener>,
        handback: &str,
    ) -> Result<ListenerId, RemoteError>;

    fn remove_notification_listener(
        &self,
        object: &ObjectName,
        listener: &ListenerId,
    ) -> Result<(), RemoteError>;
}

/// Object lookup and attribute reads.
#[async_trait]
pub trait ServerQuery: Send + Sync {
    /// Cheap liveness probe; `Ok(false)` means the session is gone.
    async fn is_alive(&self) -> Result<bool, RemoteError>;

    /// Names of registered objects selected by `pattern`.
    async fn query_names(&self, pattern: &ObjectName) -> Result<Vec<ObjectName>, RemoteError>;

    async fn get_attribute(
        &self,
        object: &ObjectName,
        attribute: &str,
    ) -> Result<Option<String>, RemoteError>;
}

/// Application lifecycle operations.
///
/// Install, redeploy, uninstall and distribution-status requests return once
/// the server has accepted them; their outcome arrives later as notifications.
#[async_trait]
pub trait AppManagement: Send + Sync {
    /// Ask the server for the application name recorded inside an archive.
    async fn read_application_name(&self, archive: &Path) -> Result<String, RemoteError>;

    async fn install_application(
        &self,
        archive: &Path,
        app: &AppName,
        options: &DeploymentOptions,
    ) -> Result<(), RemoteError>;

    async fn redeploy_application(
        &self,
        archive: &Path,
        app: &AppName,
        options: &DeploymentOptions,
    ) -> Result<(), RemoteError>;

    async fn uninstall_application(
        &self,
        app: &AppName,
        options: &DeploymentOptions,
    ) -> Result<(), RemoteError>;

    /// Start on every mapped target. Returns the targets now running the app,
    /// or `None` when it started nowhere.
    async fn start_application(
        &self,
        app: &AppName,
        options: &DeploymentOptions,
    ) -> Result<Option<Vec<String>>, RemoteError>;

    async fn stop_application(
        &self,
        app: &AppName,
        options: &DeploymentOptions,
    ) -> Result<Option<Vec<String>>, RemoteError>;

    async fn check_if_app_exists(
        &self,
        app: &AppName,
        options: &DeploymentOptions,
    ) -> Result<bool, RemoteError>;

    async fn get_distribution_status(
        &self,
        app: &AppName,
        options: &DeploymentOptions,
    ) -> Result<(), RemoteError>;

    async fn apply_attributes(
        &self,
        app: &AppName,
        attributes: &AttributeSet,
    ) -> Result<(), RemoteError>;
}

/// Everything a deployment run needs from one connected client.
#[async_trait]
pub trait ManagementClient: NotificationBus + ServerQuery + AppManagement {
    /// Release the session. Safe to call more than once.
    async fn close(&self);
}

/// Opens management sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
    ) -> Result<ClientHandle, RemoteError>;
}
