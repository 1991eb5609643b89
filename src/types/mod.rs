// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Application names, management object names and target expressions.

mod app_name;
mod id;
mod object_name;
mod target;

pub use app_name::{AppName, AppNameError};
pub use id::{CorrelationId, Id, ListenerId};
pub use object_name::{MANAGEMENT_DOMAIN, ObjectName, ObjectNameError};
pub use target::{DeployTarget, TargetError, TargetSpec};
