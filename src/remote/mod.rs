// ABOUTME: Boundary to the application server's management interface.
// ABOUTME: Client capability traits, notification model, a Liberty adapter and a simulated cell.

mod client;
mod error;
pub mod liberty;
mod notification;
pub mod simulated;

pub use client::{
    AppManagement, ClientHandle, Connector, ConnectorType, Credentials, Endpoint,
    ManagementClient, NotificationBus, ServerKind, ServerQuery,
};
pub use error::RemoteError;
pub use notification::{
    APP_MANAGEMENT_NOTIFICATION, COMPOSITE_STATUS_KEY, Notification, NotificationFilter,
    NotificationListener, Properties, TaskName, TaskStatus,
};

use crate::types::{MANAGEMENT_DOMAIN, ObjectName};

/// Query selecting the application management object.
pub fn app_management_query() -> ObjectName {
    ObjectName::pattern(MANAGEMENT_DOMAIN, [("type", "AppManagement")])
}

/// Query selecting every application server process.
pub fn server_query() -> ObjectName {
    ObjectName::pattern(MANAGEMENT_DOMAIN, [("type", "Server")])
}
