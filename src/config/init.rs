// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates an appdeploy.yml template file.

use std::path::Path;

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

const DEFAULT_HOST: &str = "dmgr.example.com";

pub fn init_config(dir: &Path, host: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let host = host.map(str::trim).unwrap_or(DEFAULT_HOST);
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(Error::InvalidConfig(format!("invalid host '{host}'")));
    }

    std::fs::write(&config_path, generate_template_yaml(host))?;
    tracing::debug!(path = %config_path.display(), "wrote config template");

    Ok(())
}

fn generate_template_yaml(host: &str) -> String {
    format!(
        r#"connection:
  host: {host}
  port: 8879
  # soap | rmi | ipc | rest | simulated
  connector: soap
  # cell | liberty (Liberty uses the rest connector, usually on port 9443)
  server: cell
  # Remove this section to connect without authentication.
  security:
    username: admin
    password: {{ env: APPDEPLOY_PASSWORD }}
    # trust_store: /path/to/trust.p12
    # trust_store_password: {{ env: APPDEPLOY_TRUST_PASSWORD }}

deployments:
  - targets:
      - {{ cell: cell01, node: node01, server: server1 }}
    artifacts:
      - path: build/libs/*.ear
        # app_name: my-app
        # bind_uri: /my-app
        # class_load_order: parent-last

options:
  # reinstall | update (Liberty always reinstalls)
  mode: update
  rollback: false
  deployment_timeout: 5m
"#
    )
}
