// ABOUTME: Deployment groups: a set of targets and the artifacts placed on them.
// ABOUTME: Expands artifact paths into builders ready for the orchestrator.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::deserialize::{
    deserialize_artifacts, deserialize_targets, optional_number, optional_setting,
};
use super::options::OptionsConfig;
use crate::artifact::{ArtifactBuilder, ClassLoadOrder, WarClassLoaderPolicy, resolve_artifacts};
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::types::{AppName, DeployTarget, TargetError, TargetSpec};

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentGroup {
    #[serde(deserialize_with = "deserialize_targets")]
    pub targets: NonEmpty<TargetEntry>,

    #[serde(deserialize_with = "deserialize_artifacts")]
    pub artifacts: NonEmpty<ArtifactConfig>,
}

/// A target given as a full expression (as printed by `servers`) or as parts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetEntry {
    Expression(String),
    Spec(TargetSpec),
}

impl TargetEntry {
    fn to_target(&self, index: usize) -> std::result::Result<DeployTarget, TargetError> {
        match self {
            TargetEntry::Expression(raw) => DeployTarget::parse(raw),
            TargetEntry::Spec(spec) => DeployTarget::from_specs(std::slice::from_ref(spec))
                .map_err(|_| TargetError::EmptySpec(index)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// File path, with optional `*`/`?` wildcards in the file name.
    pub path: String,
    #[serde(default)]
    pub app_name: Option<AppName>,
    /// Context root for web modules.
    #[serde(default)]
    pub bind_uri: Option<String>,
    #[serde(default, deserialize_with = "optional_setting")]
    pub class_load_order: Option<ClassLoadOrder>,
    #[serde(default, deserialize_with = "optional_setting")]
    pub war_class_loader_policy: Option<WarClassLoaderPolicy>,
    #[serde(default, deserialize_with = "optional_setting")]
    pub class_load_order_web: Option<ClassLoadOrder>,
    #[serde(default, deserialize_with = "optional_number")]
    pub startup_order: Option<u32>,
    #[serde(default, deserialize_with = "optional_number")]
    pub starting_weight_web: Option<u32>,
}

impl ArtifactConfig {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            app_name: None,
            bind_uri: None,
            class_load_order: None,
            war_class_loader_policy: None,
            class_load_order_web: None,
            startup_order: None,
            starting_weight_web: None,
        }
    }

    /// A name or context root pins the entry to a single application.
    fn pins_single_application(&self) -> bool {
        self.app_name.is_some() || self.bind_uri.is_some()
    }

    fn builder(
        &self,
        source: PathBuf,
        target: &DeployTarget,
        options: &OptionsConfig,
    ) -> ArtifactBuilder {
        let builder = ArtifactBuilder::new(source)
            .target(target.clone())
            .context_root(self.bind_uri.clone())
            .class_load_order(self.class_load_order)
            .war_class_loader_policy(self.war_class_loader_policy)
            .class_load_order_web(self.class_load_order_web)
            .startup_order(self.startup_order)
            .starting_weight_web(self.starting_weight_web)
            .precompile(options.precompile)
            .distribute(options.distribute)
            .reloading(options.reloading)
            .jsp_reloading(options.jsp_reloading)
            .virtual_host(options.virtual_host.clone())
            .edition(options.edition.clone())
            .shared_libraries(options.shared_libraries.clone());

        match &self.app_name {
            Some(name) => builder.app_name(name.clone()),
            None => builder,
        }
    }
}

impl DeploymentGroup {
    pub fn target(&self) -> Result<DeployTarget> {
        let entries = self
            .targets
            .iter()
            .enumerate()
            .map(|(i, entry)| entry.to_target(i).map(|t| t.as_str().to_string()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        DeployTarget::parse(&entries.join("+")).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// One builder per matched file, in declaration order.
    pub fn builders(
        &self,
        base: &Path,
        options: &OptionsConfig,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<ArtifactBuilder>> {
        let target = self.target()?;
        let mut builders = Vec::new();

        for artifact in self.artifacts.iter() {
            let mut matches = resolve_artifacts(base, &artifact.path)?;

            if matches.len() > 1 && artifact.pins_single_application() {
                diagnostics.warn(Warning::multiple_matches(format!(
                    "{} matches {} files; deploying only {}",
                    artifact.path,
                    matches.len(),
                    matches[0].display()
                )));
                matches.truncate(1);
            }

            tracing::debug!(pattern = %artifact.path, matched = matches.len(), "resolved artifact");
            builders.extend(
                matches
                    .into_iter()
                    .map(|path| artifact.builder(path, &target, options)),
            );
        }

        Ok(builders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactType;

    fn group(yaml: &str) -> DeploymentGroup {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn bare_path_entries_are_accepted() {
        let g = group("targets: [{ cell: c1, server: s1 }]\nartifacts: [build/shop.ear]");
        assert_eq!(g.artifacts.first().path, "build/shop.ear");
        assert!(g.artifacts.first().app_name.is_none());
    }

    #[test]
    fn empty_lists_are_rejected() {
        let err = serde_yaml::from_str::<DeploymentGroup>("targets: []\nartifacts: [a.ear]")
            .unwrap_err();
        assert!(err.to_string().contains("at least one target"));

        let err = serde_yaml::from_str::<DeploymentGroup>("targets: [{ cell: c }]\nartifacts: []")
            .unwrap_err();
        assert!(err.to_string().contains("at least one artifact"));
    }

    #[test]
    fn targets_join_into_one_expression() {
        let g = group(
            "targets: [{ cell: c1, cluster: web }, { cell: c1, node: n2, server: s1 }]\nartifacts: [a.ear]",
        );
        assert_eq!(
            g.target().unwrap().as_str(),
            "WebSphere:cell=c1,cluster=web+WebSphere:cell=c1,node=n2,server=s1"
        );
    }

    #[test]
    fn expression_targets_mix_with_specs() {
        let g = group(
            "targets: ['WebSphere:cell=c1,node=n1,server=s1', { cell: c1, cluster: web }]\nartifacts: [a.ear]",
        );
        assert_eq!(
            g.target().unwrap().as_str(),
            "WebSphere:cell=c1,node=n1,server=s1+WebSphere:cell=c1,cluster=web"
        );
    }

    #[test]
    fn empty_target_spec_is_invalid() {
        let g = group("targets: [{ cell: c1 }, {}]\nartifacts: [a.ear]");
        let err = g.target().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref m) if m.contains("entry 1")));
    }

    #[test]
    fn wildcard_expands_to_every_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.war"), b"a").unwrap();
        std::fs::write(dir.path().join("b.war"), b"b").unwrap();

        let g = group("targets: [{ cell: c, server: s }]\nartifacts: ['*.war']");
        let mut diag = Diagnostics::default();
        let builders = g
            .builders(dir.path(), &OptionsConfig::default(), &mut diag)
            .unwrap();

        assert_eq!(builders.len(), 2);
        assert!(builders.iter().all(|b| b.kind() == ArtifactType::War));
        assert!(!diag.has_warnings());
    }

    #[test]
    fn pinned_entry_keeps_first_match_and_warns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.war"), b"a").unwrap();
        std::fs::write(dir.path().join("b.war"), b"b").unwrap();

        let g = group(
            "targets: [{ cell: c, server: s }]\nartifacts: [{ path: '*.war', bind_uri: /shop }]",
        );
        let mut diag = Diagnostics::default();
        let builders = g
            .builders(dir.path(), &OptionsConfig::default(), &mut diag)
            .unwrap();

        assert_eq!(builders.len(), 1);
        assert_eq!(builders[0].source_path(), dir.path().join("a.war"));
        assert_eq!(diag.warnings().len(), 1);
    }

    #[test]
    fn missing_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let g = group("targets: [{ cell: c }]\nartifacts: [missing.ear]");
        let err = g
            .builders(dir.path(), &OptionsConfig::default(), &mut Diagnostics::default())
            .unwrap_err();
        assert!(matches!(err, Error::Resolve(_)));
    }
}
