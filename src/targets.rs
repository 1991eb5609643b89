// ABOUTME: Lists the application servers a management server can deploy to.
// ABOUTME: Normalizes each one into a target expression usable in the config.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::remote::{ClientHandle, RemoteError, server_query};
use crate::types::{MANAGEMENT_DOMAIN, ObjectName};

/// One deployable server, as reported by its management object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ServerTarget {
    /// `WebSphere:cell=…,node=…,server=…`
    pub target: String,
    pub cell: String,
    pub node: String,
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A target with its 1-based position in the listing.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedTarget {
    pub index: usize,
    #[serde(flatten)]
    pub server: ServerTarget,
}

/// Query every server object and read its placement attributes.
///
/// Servers missing a cell, node or name cannot be targeted and are skipped.
/// The result is sorted by target expression with duplicates removed.
pub async fn list_servers(client: &ClientHandle) -> Result<Vec<IndexedTarget>, RemoteError> {
    let names = client.query_names(&server_query()).await?;
    tracing::debug!(count = names.len(), "server objects found");

    let mut servers = BTreeMap::new();
    for name in names {
        match describe(client, &name).await? {
            Some(server) => {
                servers.entry(server.target.clone()).or_insert(server);
            }
            None => tracing::debug!(object = %name, "skipping server without placement"),
        }
    }

    Ok(servers
        .into_values()
        .enumerate()
        .map(|(i, server)| IndexedTarget {
            index: i + 1,
            server,
        })
        .collect())
}

async fn describe(
    client: &ClientHandle,
    object: &ObjectName,
) -> Result<Option<ServerTarget>, RemoteError> {
    let read = |attribute: &'static str| async move {
        client
            .get_attribute(object, attribute)
            .await
            .map(|value| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
    };

    let (Some(cell), Some(node), Some(server)) =
        (read("cellName").await?, read("nodeName").await?, read("name").await?)
    else {
        return Ok(None);
    };

    Ok(Some(ServerTarget {
        target: target_expression(&cell, &node, &server),
        pid: read("pid").await?,
        vendor: read("serverVendor").await?,
        version: read("serverVersion").await?,
        cell,
        node,
        server,
    }))
}

pub fn target_expression(cell: &str, node: &str, server: &str) -> String {
    ObjectName::from_properties(
        MANAGEMENT_DOMAIN,
        [("cell", cell), ("node", node), ("server", server)],
    )
    .to_string()
}
