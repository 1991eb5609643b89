// ABOUTME: Management object names of the form `domain:key=value,...`.
// ABOUTME: Supports property-list patterns with a trailing wildcard for queries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Domain under which the application server registers its management objects.
pub const MANAGEMENT_DOMAIN: &str = "WebSphere";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectNameError {
    #[error("object name is missing the ':' domain separator: {0}")]
    MissingDomainSeparator(String),

    #[error("object name has an empty domain: {0}")]
    EmptyDomain(String),

    #[error("object name has no properties: {0}")]
    NoProperties(String),

    #[error("malformed property '{property}' in object name {name}")]
    MalformedProperty { name: String, property: String },

    #[error("duplicate property key '{key}' in object name {name}")]
    DuplicateKey { name: String, key: String },
}

/// A parsed management object name.
///
/// Properties are kept sorted by key, so two names that list the same
/// properties in a different order are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectName {
    domain: String,
    properties: BTreeMap<String, String>,
    pattern: bool,
}

impl ObjectName {
    pub fn parse(raw: &str) -> Result<Self, ObjectNameError> {
        let (domain, rest) = raw
            .split_once(':')
            .ok_or_else(|| ObjectNameError::MissingDomainSeparator(raw.to_string()))?;

        let domain = domain.trim();
        if domain.is_empty() {
            return Err(ObjectNameError::EmptyDomain(raw.to_string()));
        }

        let mut properties = BTreeMap::new();
        let mut pattern = false;

        for part in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part == "*" {
                pattern = true;
                continue;
            }

            let (key, value) = part
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .ok_or_else(|| ObjectNameError::MalformedProperty {
                    name: raw.to_string(),
                    property: part.to_string(),
                })?;

            if properties
                .insert(key.to_string(), value.to_string())
                .is_some()
            {
                return Err(ObjectNameError::DuplicateKey {
                    name: raw.to_string(),
                    key: key.to_string(),
                });
            }
        }

        if properties.is_empty() && !pattern {
            return Err(ObjectNameError::NoProperties(raw.to_string()));
        }

        Ok(Self {
            domain: domain.to_string(),
            properties,
            pattern,
        })
    }

    /// Build a concrete (non-pattern) name from key/value pairs.
    pub fn from_properties<K, V>(
        domain: &str,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            domain: domain.to_string(),
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            pattern: false,
        }
    }

    /// Build a pattern that selects every name carrying these properties.
    pub fn pattern<K, V>(domain: &str, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pattern: true,
            ..Self::from_properties(domain, properties)
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn key_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_pattern(&self) -> bool {
        self.pattern
    }

    /// Whether `candidate` is selected by this name.
    ///
    /// A concrete name only matches itself. A pattern matches any name in the
    /// same domain that carries at least the pattern's properties.
    pub fn matches(&self, candidate: &ObjectName) -> bool {
        if self.domain != "*" && self.domain != candidate.domain {
            return false;
        }

        if !self.pattern {
            return self.properties == candidate.properties;
        }

        self.properties
            .iter()
            .all(|(k, v)| candidate.properties.get(k) == Some(v))
    }
}

impl FromStr for ObjectName {
    type Err = ObjectNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        let mut first = true;
        for (k, v) in &self.properties {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        if self.pattern {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "*")?;
        }
        Ok(())
    }
}
