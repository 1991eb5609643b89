// ABOUTME: Option bags handed to the remote install and attribute operations.
// ABOUTME: Settings left unset on the artifact are omitted rather than sent as defaults.

use std::collections::BTreeMap;

use super::descriptor::Artifact;

/// Option keys understood by the application management service.
pub mod keys {
    pub const APP_NAME: &str = "appname";
    pub const ARCHIVE_UPLOAD: &str = "archive.upload";
    pub const PRECOMPILE_JSP: &str = "preCompileJSPs";
    pub const DISTRIBUTE: &str = "distributeApp";
    pub const RELOAD_ENABLED: &str = "reloadEnabled";
    pub const JSP_RELOAD_ENABLED: &str = "jspReloadEnabled";
    pub const MODULE_TO_SERVER: &str = "moduleToServer";
    pub const VIRTUAL_HOST: &str = "defaultbinding.virtual.host";
    pub const CONTEXT_ROOT: &str = "contextroot";
    pub const EDITION: &str = "edition";
    pub const SHARED_LIBRARIES: &str = "sharedLibRelationship";
    pub const CLASS_LOADING_MODE: &str = "classLoadingMode";
    pub const WAR_CLASS_LOADER_POLICY: &str = "warClassLoaderPolicy";

    pub const STARTING_WEIGHT: &str = "startingWeight";
    pub const WEB_MODULE_CLASS_LOADING_MODE: &str = "webModuleClassLoadingMode";
    pub const WEB_MODULE_STARTING_WEIGHT: &str = "webModuleStartingWeight";

    /// Module selector meaning "every module in the archive".
    pub const ALL_MODULES: &str = "*";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Map(BTreeMap<String, String>),
    List(Vec<String>),
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        OptionValue::Int(i64::from(v))
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

/// Ordered key/value options for one remote operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentOptions(BTreeMap<String, OptionValue>);

impl DeploymentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<OptionValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    fn insert_opt<V: Into<OptionValue>>(&mut self, key: &str, value: Option<V>) {
        if let Some(v) = value {
            self.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Options for installing or redeploying `artifact`.
    pub fn for_install(artifact: &Artifact) -> Self {
        let mut options = Self::new();

        options.insert(keys::APP_NAME, artifact.app_name().as_str());
        options.insert(keys::ARCHIVE_UPLOAD, true);
        options.insert(keys::PRECOMPILE_JSP, artifact.precompile());
        options.insert(keys::DISTRIBUTE, artifact.distribute());
        options.insert(keys::RELOAD_ENABLED, artifact.reloading());
        options.insert(keys::JSP_RELOAD_ENABLED, artifact.jsp_reloading());

        let module_to_server = BTreeMap::from([(
            keys::ALL_MODULES.to_string(),
            artifact.target().to_string(),
        )]);
        options.insert(keys::MODULE_TO_SERVER, OptionValue::Map(module_to_server));

        options.insert_opt(keys::VIRTUAL_HOST, artifact.virtual_host());
        options.insert_opt(keys::CONTEXT_ROOT, artifact.context_root());
        options.insert_opt(keys::EDITION, artifact.edition());
        options.insert_opt(
            keys::CLASS_LOADING_MODE,
            artifact.class_load_order().map(|o| o.wire_value()),
        );
        options.insert_opt(
            keys::WAR_CLASS_LOADER_POLICY,
            artifact.war_class_loader_policy().map(|p| p.wire_value()),
        );

        if !artifact.shared_libraries().is_empty() {
            options.insert(
                keys::SHARED_LIBRARIES,
                OptionValue::List(artifact.shared_libraries().to_vec()),
            );
        }

        options
    }
}

/// Attributes applied to an installed application after install or update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet(DeploymentOptions);

impl AttributeSet {
    pub fn for_artifact(artifact: &Artifact) -> Self {
        let mut attrs = DeploymentOptions::new();
        attrs.insert_opt(keys::STARTING_WEIGHT, artifact.startup_order());
        attrs.insert_opt(
            keys::WEB_MODULE_CLASS_LOADING_MODE,
            artifact.class_load_order_web().map(|o| o.wire_value()),
        );
        attrs.insert_opt(
            keys::WEB_MODULE_STARTING_WEIGHT,
            artifact.starting_weight_web(),
        );
        Self(attrs)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter()
    }
}
