// ABOUTME: Immutable description of one archive to deploy and how to deploy it.
// ABOUTME: Built through a validating builder; transformations return new values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{AppName, DeployTarget};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("artifact at {0} has no application name")]
    MissingAppName(PathBuf),

    #[error("artifact {0} has no deployment target")]
    MissingTarget(String),

    #[error("artifact path {0} has no file name")]
    NoFileName(PathBuf),
}

/// Archive kind, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Ear,
    War,
    Jar,
    Rar,
    Unknown,
}

impl ArtifactType {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("ear") => ArtifactType::Ear,
            Some("war") => ArtifactType::War,
            Some("jar") => ArtifactType::Jar,
            Some("rar") => ArtifactType::Rar,
            _ => ArtifactType::Unknown,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactType::Ear => "ear",
            ArtifactType::War => "war",
            ArtifactType::Jar => "jar",
            ArtifactType::Rar => "rar",
            ArtifactType::Unknown => "bin",
        }
    }

    /// Only enterprise archives are installed as-is; everything else is wrapped.
    pub fn needs_wrapping(self) -> bool {
        self != ArtifactType::Ear
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassLoadOrder {
    ParentFirst,
    ParentLast,
}

impl ClassLoadOrder {
    pub fn wire_value(self) -> &'static str {
        match self {
            ClassLoadOrder::ParentFirst => "PARENT_FIRST",
            ClassLoadOrder::ParentLast => "PARENT_LAST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarClassLoaderPolicy {
    Single,
    Multiple,
}

impl WarClassLoaderPolicy {
    pub fn wire_value(self) -> &'static str {
        match self {
            WarClassLoaderPolicy::Single => "SINGLE",
            WarClassLoaderPolicy::Multiple => "MULTIPLE",
        }
    }
}

/// Everything needed to deploy one archive.
///
/// Values are never mutated in place. Packaging a WAR into an EAR yields a
/// new `Artifact` through [`Artifact::with_source`].
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    kind: ArtifactType,
    source_path: PathBuf,
    app_name: AppName,
    target: DeployTarget,
    context_root: Option<String>,
    class_load_order: Option<ClassLoadOrder>,
    war_class_loader_policy: Option<WarClassLoaderPolicy>,
    class_load_order_web: Option<ClassLoadOrder>,
    startup_order: Option<u32>,
    starting_weight_web: Option<u32>,
    precompile: bool,
    distribute: bool,
    reloading: bool,
    jsp_reloading: bool,
    virtual_host: Option<String>,
    edition: Option<String>,
    shared_libraries: Vec<String>,
}

impl Artifact {
    pub fn builder(source_path: impl Into<PathBuf>) -> ArtifactBuilder {
        ArtifactBuilder::new(source_path)
    }

    pub fn kind(&self) -> ArtifactType {
        self.kind
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn app_name(&self) -> &AppName {
        &self.app_name
    }

    pub fn target(&self) -> &DeployTarget {
        &self.target
    }

    pub fn context_root(&self) -> Option<&str> {
        self.context_root.as_deref()
    }

    pub fn class_load_order(&self) -> Option<ClassLoadOrder> {
        self.class_load_order
    }

    pub fn war_class_loader_policy(&self) -> Option<WarClassLoaderPolicy> {
        self.war_class_loader_policy
    }

    pub fn class_load_order_web(&self) -> Option<ClassLoadOrder> {
        self.class_load_order_web
    }

    pub fn startup_order(&self) -> Option<u32> {
        self.startup_order
    }

    pub fn starting_weight_web(&self) -> Option<u32> {
        self.starting_weight_web
    }

    pub fn precompile(&self) -> bool {
        self.precompile
    }

    pub fn distribute(&self) -> bool {
        self.distribute
    }

    pub fn reloading(&self) -> bool {
        self.reloading
    }

    pub fn jsp_reloading(&self) -> bool {
        self.jsp_reloading
    }

    pub fn virtual_host(&self) -> Option<&str> {
        self.virtual_host.as_deref()
    }

    pub fn edition(&self) -> Option<&str> {
        self.edition.as_deref()
    }

    pub fn shared_libraries(&self) -> &[String] {
        &self.shared_libraries
    }

    /// A copy of this artifact that deploys a different archive file.
    /// The kind is re-derived from the new path.
    pub fn with_source(&self, path: impl Into<PathBuf>) -> Self {
        let source_path = path.into();
        Self {
            kind: ArtifactType::from_path(&source_path),
            source_path,
            ..self.clone()
        }
    }
}

/// Collects artifact settings; the application name may be filled in late,
/// once it has been read from the archive or the server.
#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
    source_path: PathBuf,
    app_name: Option<AppName>,
    target: Option<DeployTarget>,
    context_root: Option<String>,
    class_load_order: Option<ClassLoadOrder>,
    war_class_loader_policy: Option<WarClassLoaderPolicy>,
    class_load_order_web: Option<ClassLoadOrder>,
    startup_order: Option<u32>,
    starting_weight_web: Option<u32>,
    precompile: bool,
    distribute: bool,
    reloading: bool,
    jsp_reloading: bool,
    virtual_host: Option<String>,
    edition: Option<String>,
    shared_libraries: Vec<String>,
}

impl ArtifactBuilder {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            app_name: None,
            target: None,
            context_root: None,
            class_load_order: None,
            war_class_loader_policy: None,
            class_load_order_web: None,
            startup_order: None,
            starting_weight_web: None,
            precompile: false,
            distribute: true,
            reloading: false,
            jsp_reloading: false,
            virtual_host: None,
            edition: None,
            shared_libraries: Vec::new(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn kind(&self) -> ArtifactType {
        ArtifactType::from_path(&self.source_path)
    }

    pub fn has_app_name(&self) -> bool {
        self.app_name.is_some()
    }

    /// Name to show for this artifact before it has been resolved.
    pub fn label(&self) -> String {
        match &self.app_name {
            Some(name) => name.to_string(),
            None => self.source_path.display().to_string(),
        }
    }

    /// The file name without its extension.
    pub fn file_stem(&self) -> Option<&str> {
        self.source_path.file_stem().and_then(|s| s.to_str())
    }

    pub fn app_name(mut self, name: AppName) -> Self {
        self.app_name = Some(name);
        self
    }

    pub fn target(mut self, target: DeployTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn context_root(mut self, root: Option<String>) -> Self {
        self.context_root = root;
        self
    }

    pub fn class_load_order(mut self, order: Option<ClassLoadOrder>) -> Self {
        self.class_load_order = order;
        self
    }

    pub fn war_class_loader_policy(mut self, policy: Option<WarClassLoaderPolicy>) -> Self {
        self.war_class_loader_policy = policy;
        self
    }

    pub fn class_load_order_web(mut self, order: Option<ClassLoadOrder>) -> Self {
        self.class_load_order_web = order;
        self
    }

    pub fn startup_order(mut self, order: Option<u32>) -> Self {
        self.startup_order = order;
        self
    }

    pub fn starting_weight_web(mut self, weight: Option<u32>) -> Self {
        self.starting_weight_web = weight;
        self
    }

    pub fn precompile(mut self, enabled: bool) -> Self {
        self.precompile = enabled;
        self
    }

    pub fn distribute(mut self, enabled: bool) -> Self {
        self.distribute = enabled;
        self
    }

    pub fn reloading(mut self, enabled: bool) -> Self {
        self.reloading = enabled;
        self
    }

    pub fn jsp_reloading(mut self, enabled: bool) -> Self {
        self.jsp_reloading = enabled;
        self
    }

    pub fn virtual_host(mut self, host: Option<String>) -> Self {
        self.virtual_host = host;
        self
    }

    pub fn edition(mut self, edition: Option<String>) -> Self {
        self.edition = edition;
        self
    }

    pub fn shared_libraries(mut self, libraries: Vec<String>) -> Self {
        self.shared_libraries = libraries;
        self
    }

    pub fn build(self) -> Result<Artifact, ArtifactError> {
        if self.source_path.file_name().is_none() {
            return Err(ArtifactError::NoFileName(self.source_path));
        }

        let app_name = self
            .app_name
            .ok_or_else(|| ArtifactError::MissingAppName(self.source_path.clone()))?;

        let target = self
            .target
            .ok_or_else(|| ArtifactError::MissingTarget(app_name.to_string()))?;

        Ok(Artifact {
            kind: ArtifactType::from_path(&self.source_path),
            source_path: self.source_path,
            app_name,
            target,
            context_root: self.context_root.filter(|r| !r.trim().is_empty()),
            class_load_order: self.class_load_order,
            war_class_loader_policy: self.war_class_loader_policy,
            class_load_order_web: self.class_load_order_web,
            startup_order: self.startup_order,
            starting_weight_web: self.starting_weight_web,
            precompile: self.precompile,
            distribute: self.distribute,
            reloading: self.reloading,
            jsp_reloading: self.jsp_reloading,
            virtual_host: self.virtual_host.filter(|h| !h.trim().is_empty()),
            edition: self.edition.filter(|e| !e.trim().is_empty()),
            shared_libraries: self.shared_libraries,
        })
    }
}
