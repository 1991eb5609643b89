// ABOUTME: Asynchronous notifications emitted by the application management service.
// ABOUTME: Task names, task statuses, filters and the listener callback trait.

use std::collections::BTreeMap;
use std::fmt;

/// Notification type for application management events.
pub const APP_MANAGEMENT_NOTIFICATION: &str = "websphere.admin.appmgmt";

/// Property carrying the per-node distribution result of a status query.
pub const COMPOSITE_STATUS_KEY: &str = "compositeStatus";

pub type Properties = BTreeMap<String, String>;

/// Long-running management tasks whose completion is reported by notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskName {
    Install,
    Uninstall,
    Update,
    DistributionStatus,
}

impl TaskName {
    pub fn as_wire(self) -> &'static str {
        match self {
            TaskName::Install => "InstallApplication",
            TaskName::Uninstall => "UninstallApplication",
            TaskName::Update => "UpdateApplication",
            TaskName::DistributionStatus => "DistributionStatusNode",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "InstallApplication" => Some(TaskName::Install),
            "UninstallApplication" => Some(TaskName::Uninstall),
            "UpdateApplication" => Some(TaskName::Update),
            "DistributionStatusNode" => Some(TaskName::DistributionStatus),
            _ => None,
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_wire(self) -> &'static str {
        match self {
            TaskStatus::InProgress => "InProgress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "InProgress" => Some(TaskStatus::InProgress),
            "Completed" => Some(TaskStatus::Completed),
            "Failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One event from the management service.
///
/// `task_name` stays a raw string: the service reports many tasks this
/// tool never watches and they must still reach the message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub notification_type: String,
    pub task_name: String,
    pub status: TaskStatus,
    pub message: String,
    pub properties: Properties,
}

impl Notification {
    pub fn new(task: TaskName, status: TaskStatus, message: impl Into<String>) -> Self {
        Self {
            notification_type: APP_MANAGEMENT_NOTIFICATION.to_string(),
            task_name: task.as_wire().to_string(),
            status,
            message: message.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn task(&self) -> Option<TaskName> {
        TaskName::from_wire(&self.task_name)
    }
}

/// Selects which notification types reach a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationFilter {
    enabled_types: Vec<String>,
}

impl NotificationFilter {
    pub fn app_management() -> Self {
        Self {
            enabled_types: vec![APP_MANAGEMENT_NOTIFICATION.to_string()],
        }
    }

    pub fn accepts(&self, notification: &Notification) -> bool {
        self.enabled_types
            .iter()
            .any(|t| notification.notification_type.starts_with(t.as_str()))
    }
}

/// Callback invoked by the client library, possibly from its own thread.
pub trait NotificationListener: Send + Sync {
    fn handle_notification(&self, notification: &Notification, handback: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_names_round_trip_through_wire_names() {
        for task in [
            TaskName::Install,
            TaskName::Uninstall,
            TaskName::Update,
            TaskName::DistributionStatus,
        ] {
            assert_eq!(TaskName::from_wire(task.as_wire()), Some(task));
        }
        assert_eq!(TaskName::from_wire("EditApplication"), None);
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn filter_accepts_app_management_types() {
        let filter = NotificationFilter::app_management();
        let note = Notification::new(TaskName::Install, TaskStatus::Completed, "done");
        assert!(filter.accepts(&note));

        let other = Notification {
            notification_type: "websphere.ws.server.state".to_string(),
            ..note
        };
        assert!(!filter.accepts(&other));
    }
}
