// ABOUTME: Connection settings for the management server.
// ABOUTME: Turns the YAML section into an endpoint and resolved credentials.

use serde::Deserialize;
use std::path::PathBuf;

use super::env_value::{EnvValue, resolve_optional};
use crate::error::Result;
use crate::remote::{ConnectorType, Credentials, Endpoint, ServerKind};

/// SOAP port of a deployment manager in a default cell.
pub const DEFAULT_SOAP_PORT: u16 = 8879;

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub connector: ConnectorType,
    /// A deployment manager cell, or a standalone Liberty server.
    #[serde(default)]
    pub server: ServerKind,
    /// Presence enables an authenticated connection.
    #[serde(default)]
    pub security: Option<SecurityConfig>,
}

fn default_port() -> u16 {
    DEFAULT_SOAP_PORT
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub username: String,
    pub password: EnvValue,
    #[serde(default)]
    pub trust_store: Option<PathBuf>,
    #[serde(default)]
    pub trust_store_password: Option<EnvValue>,
    #[serde(default)]
    pub key_store: Option<PathBuf>,
    #[serde(default)]
    pub key_store_password: Option<EnvValue>,
}

impl ConnectionConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port,
            connector: self.connector,
        }
    }

    /// Resolve secrets from the environment. `None` when security is off.
    pub fn credentials(&self) -> Result<Option<Credentials>> {
        let Some(security) = &self.security else {
            return Ok(None);
        };

        Ok(Some(Credentials {
            username: security.username.clone(),
            password: security.password.resolve()?,
            trust_store: security.trust_store.clone(),
            trust_store_password: resolve_optional(security.trust_store_password.as_ref())?,
            key_store: security.key_store.clone(),
            key_store_password: resolve_optional(security.key_store_password.as_ref())?,
        }))
    }
}
