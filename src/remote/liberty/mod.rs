// ABOUTME: Adapts a standalone Liberty server's JMX REST connector to the management client traits.
// ABOUTME: Installs by uploading into the dropins directory and drives applications through their MBeans.

pub mod simulated;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::client::{
    AppManagement, ClientHandle, Connector, Credentials, Endpoint, ManagementClient,
    NotificationBus, ServerQuery,
};
use super::error::RemoteError;
use super::notification::{
    COMPOSITE_STATUS_KEY, Notification, NotificationFilter, NotificationListener, TaskName,
    TaskStatus,
};
use crate::artifact::{AttributeSet, DeploymentOptions};
use crate::types::{AppName, ListenerId, MANAGEMENT_DOMAIN, ObjectName};

/// Server-side directory Liberty watches for new applications.
pub const DROPINS_DIR: &str = "${server.output.dir}/dropins";

/// Server name reported when the kernel does not publish one.
pub const DEFAULT_SERVER_NAME: &str = "defaultServer";

/// Archive extensions Liberty picks up from dropins.
const MODULE_EXTENSIONS: [&str; 4] = ["ear", "war", "jar", "rar"];

pub fn file_transfer_object() -> ObjectName {
    ObjectName::from_properties(
        MANAGEMENT_DOMAIN,
        [
            ("feature", "restConnector"),
            ("type", "FileTransfer"),
            ("name", "FileTransfer"),
        ],
    )
}

/// The MBean Liberty registers once an application has been picked up.
pub fn application_object(app: &AppName) -> ObjectName {
    ObjectName::from_properties(
        MANAGEMENT_DOMAIN,
        [
            ("service", "com.ibm.websphere.application.ApplicationMBean"),
            ("name", app.as_str()),
        ],
    )
}

pub fn server_info_object() -> ObjectName {
    ObjectName::from_properties(MANAGEMENT_DOMAIN, [("feature", "kernel"), ("name", "ServerInfo")])
}

/// Stand-in for the application management object. Task notifications for
/// dropins operations are published on it.
fn dropins_object() -> ObjectName {
    ObjectName::from_properties(
        MANAGEMENT_DOMAIN,
        [
            ("type", "AppManagement"),
            ("name", "AppManagement"),
            ("process", "dropins"),
        ],
    )
}

fn dropins_path(file_name: &str) -> String {
    format!("{DROPINS_DIR}/{file_name}")
}

/// A raw JMX session against one Liberty server.
#[async_trait]
pub trait MBeanConnection: Send + Sync {
    async fn is_alive(&self) -> Result<bool, RemoteError>;

    async fn is_registered(&self, object: &ObjectName) -> Result<bool, RemoteError>;

    async fn query_names(&self, pattern: &ObjectName) -> Result<Vec<ObjectName>, RemoteError>;

    async fn get_attribute(
        &self,
        object: &ObjectName,
        attribute: &str,
    ) -> Result<Option<String>, RemoteError>;

    /// Invoke an MBean operation with string parameters.
    async fn invoke(
        &self,
        object: &ObjectName,
        operation: &str,
        params: &[String],
    ) -> Result<Option<String>, RemoteError>;

    async fn close(&self);
}

/// Opens JMX sessions to a Liberty server.
#[async_trait]
pub trait MBeanConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn MBeanConnection>, RemoteError>;
}

/// Wraps each JMX session in a [`LibertyClient`].
#[derive(Clone)]
pub struct LibertyConnector {
    inner: Arc<dyn MBeanConnector>,
}

impl LibertyConnector {
    pub fn new(inner: Arc<dyn MBeanConnector>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Connector for LibertyConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
    ) -> Result<ClientHandle, RemoteError> {
        let connection = self.inner.connect(endpoint, credentials).await?;
        Ok(Arc::new(LibertyClient::new(connection)) as ClientHandle)
    }
}

struct Registration {
    id: ListenerId,
    object: ObjectName,
    filter: NotificationFilter,
    listener: Arc<dyn NotificationListener>,
    handback: String,
}

/// Management client for one Liberty server.
///
/// Liberty has no task notifications of its own. Each dropins operation
/// publishes the task events a cell would send once the server has accepted
/// the request, so tracked operations behave the same on both.
pub struct LibertyClient {
    connection: Arc<dyn MBeanConnection>,
    listeners: Mutex<Vec<Registration>>,
    next_listener: AtomicU64,
}

impl LibertyClient {
    pub fn new(connection: Arc<dyn MBeanConnection>) -> Self {
        Self {
            connection,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    fn publish(&self, notification: &Notification) {
        let targets: Vec<(Arc<dyn NotificationListener>, String)> = self
            .listeners
            .lock()
            .iter()
            .filter(|r| r.filter.accepts(notification))
            .map(|r| (Arc::clone(&r.listener), r.handback.clone()))
            .collect();

        for (listener, handback) in targets {
            listener.handle_notification(notification, &handback);
        }
    }

    fn publish_completed(&self, task: TaskName, app: &AppName) {
        self.publish(&Notification::new(
            task,
            TaskStatus::InProgress,
            format!("{task} of {app} started."),
        ));
        self.publish(&Notification::new(
            task,
            TaskStatus::Completed,
            format!("{task} of {app} completed successfully."),
        ));
    }

    async fn require_file_transfer(&self) -> Result<ObjectName, RemoteError> {
        let object = file_transfer_object();
        if self.connection.is_registered(&object).await? {
            Ok(object)
        } else {
            Err(RemoteError::ObjectNotFound(format!(
                "{object} (is the restConnector feature enabled?)"
            )))
        }
    }

    async fn server_name(&self) -> String {
        match self
            .connection
            .get_attribute(&server_info_object(), "Name")
            .await
        {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            _ => DEFAULT_SERVER_NAME.to_string(),
        }
    }

    async fn server_target(&self) -> String {
        format!("{MANAGEMENT_DOMAIN}:server={}", self.server_name().await)
    }
}

impl NotificationBus for LibertyClient {
    fn add_notification_listener(
        &self,
        object: &ObjectName,
        filter: &NotificationFilter,
        listener: Arc<dyn NotificationListener>,
        handback: &str,
    ) -> Result<ListenerId, RemoteError> {
        if *object != dropins_object() {
            return Err(RemoteError::ObjectNotFound(object.to_string()));
        }

        let id = ListenerId::new(format!(
            "liberty-listener-{}",
            self.next_listener.fetch_add(1, Ordering::SeqCst)
        ));
        self.listeners.lock().push(Registration {
            id: id.clone(),
            object: object.clone(),
            filter: filter.clone(),
            listener,
            handback: handback.to_string(),
        });
        Ok(id)
    }

    fn remove_notification_listener(
        &self,
        object: &ObjectName,
        listener: &ListenerId,
    ) -> Result<(), RemoteError> {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|r| !(r.id == *listener && r.object == *object));
        if listeners.len() == before {
            return Err(RemoteError::ListenerRejected(format!(
                "{listener} is not registered on {object}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ServerQuery for LibertyClient {
    async fn is_alive(&self) -> Result<bool, RemoteError> {
        self.connection.is_alive().await
    }

    async fn query_names(&self, pattern: &ObjectName) -> Result<Vec<ObjectName>, RemoteError> {
        let mut names = Vec::new();
        let dropins = dropins_object();
        if pattern.matches(&dropins) && self.connection.is_registered(&file_transfer_object()).await? {
            names.push(dropins);
        }
        names.extend(self.connection.query_names(pattern).await?);
        Ok(names)
    }

    async fn get_attribute(
        &self,
        object: &ObjectName,
        attribute: &str,
    ) -> Result<Option<String>, RemoteError> {
        self.connection.get_attribute(object, attribute).await
    }
}

#[async_trait]
impl AppManagement for LibertyClient {
    /// Liberty names a dropins application after its file.
    async fn read_application_name(&self, archive: &Path) -> Result<String, RemoteError> {
        archive
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Operation(format!("cannot read {}", archive.display())))
    }

    async fn install_application(
        &self,
        archive: &Path,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<(), RemoteError> {
        let file_transfer = self.require_file_transfer().await?;
        let extension = archive
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("ear")
            .to_ascii_lowercase();
        let remote = dropins_path(&format!("{app}.{extension}"));

        self.connection
            .invoke(
                &file_transfer,
                "uploadFile",
                &[
                    archive.display().to_string(),
                    remote.clone(),
                    "false".to_string(),
                ],
            )
            .await?;
        tracing::debug!(%app, %remote, "uploaded into dropins");

        self.publish_completed(TaskName::Install, app);
        Ok(())
    }

    async fn redeploy_application(
        &self,
        _archive: &Path,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::Operation(format!(
            "Liberty cannot update {app} in place; use reinstall mode"
        )))
    }

    async fn uninstall_application(
        &self,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<(), RemoteError> {
        let file_transfer = self.require_file_transfer().await?;

        let mut deleted = false;
        for extension in MODULE_EXTENSIONS {
            let remote = dropins_path(&format!("{app}.{extension}"));
            match self
                .connection
                .invoke(&file_transfer, "deleteFile", &[remote.clone()])
                .await
            {
                Ok(_) => {
                    tracing::debug!(%app, %remote, "deleted from dropins");
                    deleted = true;
                }
                Err(e) if e.is_connection_loss() => return Err(e),
                Err(_) => {}
            }
        }
        if !deleted {
            return Err(RemoteError::NotInstalled(app.to_string()));
        }

        self.publish_completed(TaskName::Uninstall, app);
        Ok(())
    }

    async fn start_application(
        &self,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<Option<Vec<String>>, RemoteError> {
        let object = application_object(app);
        if !self.connection.is_registered(&object).await? {
            return Ok(None);
        }
        self.connection.invoke(&object, "start", &[]).await?;
        Ok(Some(vec![self.server_target().await]))
    }

    async fn stop_application(
        &self,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<Option<Vec<String>>, RemoteError> {
        let object = application_object(app);
        if !self.connection.is_registered(&object).await? {
            return Err(RemoteError::NotInstalled(app.to_string()));
        }
        self.connection.invoke(&object, "stop", &[]).await?;
        Ok(Some(vec![self.server_target().await]))
    }

    async fn check_if_app_exists(
        &self,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<bool, RemoteError> {
        self.connection.is_registered(&application_object(app)).await
    }

    /// One node: the server itself. The application counts as distributed
    /// once Liberty has picked it up and registered its MBean.
    async fn get_distribution_status(
        &self,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<(), RemoteError> {
        let registered = self.connection.is_registered(&application_object(app)).await?;
        let composite = format!("{},distribution={registered}", self.server_target().await);

        self.publish(
            &Notification::new(
                TaskName::DistributionStatus,
                TaskStatus::Completed,
                format!("distribution status of {app}"),
            )
            .with_property(COMPOSITE_STATUS_KEY, composite),
        );
        Ok(())
    }

    async fn apply_attributes(
        &self,
        app: &AppName,
        _attributes: &AttributeSet,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::Operation(format!(
            "Liberty keeps no deployment attributes for {app}"
        )))
    }
}

#[async_trait]
impl ManagementClient for LibertyClient {
    async fn close(&self) {
        self.listeners.lock().clear();
        self.connection.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::simulated::{LibertyCall, SimulatedLiberty};
    use super::*;
    use crate::remote::{ConnectorType, app_management_query};

    async fn client(server: &Arc<SimulatedLiberty>) -> ClientHandle {
        let endpoint = Endpoint {
            host: "localhost".to_string(),
            port: 9443,
            connector: ConnectorType::Simulated,
        };
        server.connector().connect(&endpoint, None).await.unwrap()
    }

    fn shop() -> AppName {
        AppName::new("shop").unwrap()
    }

    #[test]
    fn object_names_follow_liberty_conventions() {
        assert_eq!(
            file_transfer_object().to_string(),
            "WebSphere:feature=restConnector,name=FileTransfer,type=FileTransfer"
        );
        let app = application_object(&shop());
        assert_eq!(app.key_property("name"), Some("shop"));
        assert_eq!(
            app.key_property("service"),
            Some("com.ibm.websphere.application.ApplicationMBean")
        );
    }

    #[tokio::test]
    async fn management_object_needs_the_file_transfer_feature() {
        let server = SimulatedLiberty::new();
        let client = client(&server).await;
        assert_eq!(client.query_names(&app_management_query()).await.unwrap().len(), 1);

        server.set_file_transfer(false);
        assert!(client.query_names(&app_management_query()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn install_uploads_under_the_application_name() {
        let server = SimulatedLiberty::new();
        let client = client(&server).await;

        client
            .install_application(Path::new("/build/shop-1.0.WAR"), &shop(), &DeploymentOptions::new())
            .await
            .unwrap();

        assert_eq!(server.dropins(), vec!["shop.war".to_string()]);
        assert!(server.calls().contains(&LibertyCall::Upload {
            local: "/build/shop-1.0.WAR".to_string(),
            remote: "${server.output.dir}/dropins/shop.war".to_string(),
        }));
    }

    #[tokio::test]
    async fn uninstall_of_unknown_app_is_not_installed() {
        let server = SimulatedLiberty::new();
        let client = client(&server).await;
        let err = client
            .uninstall_application(&shop(), &DeploymentOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::NotInstalled("shop".to_string()));
    }

    #[tokio::test]
    async fn start_reports_the_server_once_registered() {
        let server = SimulatedLiberty::new();
        let client = client(&server).await;
        let options = DeploymentOptions::new();

        assert_eq!(client.start_application(&shop(), &options).await.unwrap(), None);

        server.preinstall("shop.war");
        let targets = client.start_application(&shop(), &options).await.unwrap();
        assert_eq!(targets, Some(vec!["WebSphere:server=defaultServer".to_string()]));
        assert!(server.is_running("shop"));
    }

    #[tokio::test]
    async fn update_is_refused() {
        let server = SimulatedLiberty::new();
        let client = client(&server).await;
        let err = client
            .redeploy_application(Path::new("shop.war"), &shop(), &DeploymentOptions::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reinstall"));
    }

    struct Last(Mutex<Option<Notification>>);

    impl NotificationListener for Last {
        fn handle_notification(&self, notification: &Notification, _handback: &str) {
            *self.0.lock() = Some(notification.clone());
        }
    }

    #[tokio::test]
    async fn distribution_follows_mbean_registration() {
        let server = SimulatedLiberty::new();
        let client = client(&server).await;
        let last = Arc::new(Last(Mutex::new(None)));
        client
            .add_notification_listener(
                &dropins_object(),
                &NotificationFilter::app_management(),
                last.clone(),
                "tag",
            )
            .unwrap();

        client
            .get_distribution_status(&shop(), &DeploymentOptions::new())
            .await
            .unwrap();
        let status = last.0.lock().clone().unwrap();
        assert_eq!(
            status.properties.get(COMPOSITE_STATUS_KEY).map(String::as_str),
            Some("WebSphere:server=defaultServer,distribution=false")
        );

        server.preinstall("shop.ear");
        client
            .get_distribution_status(&shop(), &DeploymentOptions::new())
            .await
            .unwrap();
        let status = last.0.lock().clone().unwrap();
        assert!(status.properties[COMPOSITE_STATUS_KEY].ends_with("distribution=true"));
    }
}
