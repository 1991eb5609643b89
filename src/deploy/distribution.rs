// ABOUTME: Waits until an installed application has been distributed to every node.
// ABOUTME: Parses composite per-node status and polls in a task bounded by an overall deadline.

use serde::Deserialize;
use std::time::Duration;

use super::error::{DeployError, Operation};
use super::subscription::{NotificationSubscription, TerminalOutcome};
use crate::artifact::DeploymentOptions;
use crate::remote::{COMPOSITE_STATUS_KEY, ClientHandle, Properties, RemoteError, TaskName};
use crate::types::AppName;

const DISTRIBUTION_KEY: &str = "distribution";

/// One node's distribution flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFlag {
    True,
    False,
    Unknown,
}

/// Aggregated distribution state across all nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionStatus {
    Done,
    NotDone,
    Unknown,
}

/// Split a composite status such as
/// `WebSphere:cell=c,node=n1,distribution=true+WebSphere:cell=c,node=n2,distribution=unknown`
/// into per-node flags.
pub fn parse_composite(raw: &str) -> Result<Vec<NodeFlag>, DeployError> {
    raw.split('+')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Result<NodeFlag, DeployError> {
    let body = entry.split_once(':').map_or(entry, |(_, props)| props);
    let value = body
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == DISTRIBUTION_KEY)
        .map(|(_, value)| value.trim())
        .ok_or_else(|| {
            DeployError::DistributionProtocol(format!("no distribution flag in '{entry}'"))
        })?;

    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(NodeFlag::True),
        "false" => Ok(NodeFlag::False),
        "unknown" => Ok(NodeFlag::Unknown),
        other => Err(DeployError::DistributionProtocol(format!(
            "unexpected distribution flag '{other}' in '{entry}'"
        ))),
    }
}

/// Unknown anywhere wins, then any false; all true is done. No nodes is not done.
pub fn aggregate(flags: &[NodeFlag]) -> DistributionStatus {
    if flags.contains(&NodeFlag::Unknown) {
        DistributionStatus::Unknown
    } else if flags.contains(&NodeFlag::False) || flags.is_empty() {
        DistributionStatus::NotDone
    } else {
        DistributionStatus::Done
    }
}

impl DistributionStatus {
    pub fn from_properties(properties: &Properties) -> Result<Self, DeployError> {
        let raw = properties
            .get(COMPOSITE_STATUS_KEY)
            .map(String::as_str)
            .unwrap_or_default();
        Ok(aggregate(&parse_composite(raw)?))
    }
}

/// Pacing for distribution polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DistributionSettings {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_cycle_timeout", with = "humantime_serde")]
    pub cycle_timeout: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_cycle_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for DistributionSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            cycle_timeout: default_cycle_timeout(),
        }
    }
}

/// Repeatedly asks for the distribution status of one application.
#[derive(Clone)]
pub struct DistributionPoller {
    client: ClientHandle,
    settings: DistributionSettings,
}

impl DistributionPoller {
    pub fn new(client: ClientHandle, settings: DistributionSettings) -> Self {
        Self { client, settings }
    }

    /// `Ok(true)` once every node reports the application distributed,
    /// `Ok(false)` if `overall` passes first.
    pub async fn wait_for_distribution(
        &self,
        app: &AppName,
        overall: Duration,
    ) -> Result<bool, DeployError> {
        let mut polling = tokio::spawn(poll_until_done(
            self.client.clone(),
            app.clone(),
            self.settings,
        ));

        match tokio::time::timeout(overall, &mut polling).await {
            Ok(Ok(result)) => result.map(|()| true),
            Ok(Err(join_error)) => Err(DeployError::remote(
                Operation::Distribution,
                app,
                RemoteError::Protocol(format!("distribution poller stopped: {join_error}")),
            )),
            Err(_) => {
                // Aborting drops the in-flight subscription, which unsubscribes it.
                // The join resolves once that drop has run.
                polling.abort();
                let _ = polling.await;
                tracing::warn!(%app, timeout_secs = overall.as_secs(), "distribution timed out");
                Ok(false)
            }
        }
    }
}

async fn poll_until_done(
    client: ClientHandle,
    app: AppName,
    settings: DistributionSettings,
) -> Result<(), DeployError> {
    let options = DeploymentOptions::new();

    loop {
        let subscription =
            NotificationSubscription::create(&client, &[TaskName::DistributionStatus], app.as_str())
                .await?;

        client
            .get_distribution_status(&app, &options)
            .await
            .map_err(|e| DeployError::remote(Operation::Distribution, &app, e))?;

        let status = match subscription.wait(settings.cycle_timeout).await {
            TerminalOutcome::Succeeded => {
                DistributionStatus::from_properties(&subscription.last_properties())?
            }
            TerminalOutcome::Failed => {
                tracing::warn!(%app, log = %subscription.message_log(), "distribution status query failed");
                DistributionStatus::NotDone
            }
            TerminalOutcome::Pending => {
                tracing::debug!(%app, "no distribution status within cycle");
                DistributionStatus::NotDone
            }
        };
        subscription.unsubscribe();

        tracing::debug!(%app, ?status, "distribution status");
        if status == DistributionStatus::Done {
            return Ok(());
        }

        tokio::time::sleep(settings.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::DeployErrorKind;

    #[test]
    fn parses_multiple_nodes() {
        let flags = parse_composite(
            "WebSphere:cell=c,node=n1,distribution=true+WebSphere:cell=c,node=n2,distribution=false",
        )
        .unwrap();
        assert_eq!(flags, vec![NodeFlag::True, NodeFlag::False]);
    }

    #[test]
    fn aggregation_rules() {
        use NodeFlag::*;
        assert_eq!(aggregate(&[True, True]), DistributionStatus::Done);
        assert_eq!(aggregate(&[True, False]), DistributionStatus::NotDone);
        assert_eq!(aggregate(&[True, Unknown]), DistributionStatus::Unknown);
        assert_eq!(aggregate(&[False, Unknown]), DistributionStatus::Unknown);
        assert_eq!(aggregate(&[]), DistributionStatus::NotDone);
    }

    #[test]
    fn flag_values_are_case_insensitive() {
        let flags = parse_composite("WebSphere:node=n1,distribution=TRUE").unwrap();
        assert_eq!(flags, vec![NodeFlag::True]);
    }

    #[test]
    fn unexpected_flag_is_protocol_error() {
        let err = parse_composite("WebSphere:node=n1,distribution=maybe").unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::DistributionProtocol);
    }

    #[test]
    fn missing_flag_is_protocol_error() {
        let err = parse_composite("WebSphere:node=n1").unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::DistributionProtocol);
    }

    #[test]
    fn missing_composite_property_is_not_done() {
        let status = DistributionStatus::from_properties(&Properties::new()).unwrap();
        assert_eq!(status, DistributionStatus::NotDone);
    }
}
