// ABOUTME: Deployment target expressions naming cells, clusters, nodes and servers.
// ABOUTME: Multiple targets are joined with '+' into a single expression.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::object_name::{MANAGEMENT_DOMAIN, ObjectName};

const TARGET_SEPARATOR: char = '+';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("at least one deployment target is required")]
    NoTargets,

    #[error("target entry {0} names no cell, cluster, node or server")]
    EmptySpec(usize),

    #[error("invalid target entry '{entry}': {reason}")]
    InvalidEntry { entry: String, reason: String },
}

/// One placement for an application. Unset parts are left out of the expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    #[serde(default)]
    pub cell: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
}

impl TargetSpec {
    fn parts(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("cell", self.cell.as_deref()),
            ("cluster", self.cluster.as_deref()),
            ("node", self.node.as_deref()),
            ("server", self.server.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
    }

    fn expression(&self) -> Option<String> {
        let parts: Vec<String> = self.parts().map(|(k, v)| format!("{k}={v}")).collect();
        if parts.is_empty() {
            None
        } else {
            Some(format!("{MANAGEMENT_DOMAIN}:{}", parts.join(",")))
        }
    }
}

/// A complete target expression, e.g.
/// `WebSphere:cell=c1,cluster=web+WebSphere:cell=c1,node=n2,server=s1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeployTarget(String);

impl DeployTarget {
    pub fn from_specs(specs: &[TargetSpec]) -> Result<Self, TargetError> {
        if specs.is_empty() {
            return Err(TargetError::NoTargets);
        }

        let entries = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.expression().ok_or(TargetError::EmptySpec(i)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self(entries.join(&TARGET_SEPARATOR.to_string())))
    }

    /// Accept an expression that was built elsewhere, such as one printed by
    /// the server listing.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TargetError::NoTargets);
        }

        for entry in raw.split(TARGET_SEPARATOR) {
            let name = ObjectName::parse(entry).map_err(|e| TargetError::InvalidEntry {
                entry: entry.to_string(),
                reason: e.to_string(),
            })?;
            if name.is_pattern() {
                return Err(TargetError::InvalidEntry {
                    entry: entry.to_string(),
                    reason: "wildcards are not allowed in targets".to_string(),
                });
            }
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.0.split(TARGET_SEPARATOR)
    }
}

impl fmt::Display for DeployTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
