// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles "default" placement sentinels and non-empty lists.

use nonempty::NonEmpty;
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Deserializer};

use super::artifact::{ArtifactConfig, DeploymentGroup, TargetEntry};

/// Value operators write to mean "leave the server's setting alone".
pub const DEFAULT_SENTINEL: &str = "default";

/// An optional enum setting where `default` (or an empty string) means unset.
pub fn optional_setting<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case(DEFAULT_SENTINEL) => Ok(None),
        Some(s) => T::deserialize(s.into_deserializer()).map(Some),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u32),
    Text(String),
}

/// An optional number where `default` means unset.
pub fn optional_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(s)) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case(DEFAULT_SENTINEL) {
                Ok(None)
            } else {
                s.parse()
                    .map(Some)
                    .map_err(|_| serde::de::Error::custom(format!("expected a number, got '{s}'")))
            }
        }
    }
}

fn non_empty<'de, D, T>(deserializer: D, what: &str) -> Result<NonEmpty<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let values: Vec<T> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom(format!("at least one {what} is required")))
}

pub fn deserialize_deployments<'de, D>(deserializer: D) -> Result<NonEmpty<DeploymentGroup>, D::Error>
where
    D: Deserializer<'de>,
{
    non_empty(deserializer, "deployment")
}

pub fn deserialize_targets<'de, D>(deserializer: D) -> Result<NonEmpty<TargetEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    non_empty(deserializer, "target")
}

pub fn deserialize_artifacts<'de, D>(deserializer: D) -> Result<NonEmpty<ArtifactConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<ArtifactEntry> = Vec::deserialize(deserializer)?;
    let artifacts = values.into_iter().map(ArtifactEntry::into_config).collect();
    NonEmpty::from_vec(artifacts)
        .ok_or_else(|| serde::de::Error::custom("at least one artifact is required"))
}

/// Artifacts may be given as a bare path or as a full mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtifactEntry {
    Simple(String),
    Detailed(ArtifactConfig),
}

impl ArtifactEntry {
    fn into_config(self) -> ArtifactConfig {
        match self {
            ArtifactEntry::Simple(path) => ArtifactConfig::from_path(path),
            ArtifactEntry::Detailed(config) => config,
        }
    }
}
