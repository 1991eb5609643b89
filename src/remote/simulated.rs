// ABOUTME: In-memory management server implementing every client capability.
// ABOUTME: Delivers notifications from its own thread and records each call for inspection.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::client::{
    AppManagement, ClientHandle, Connector, Credentials, Endpoint, ManagementClient,
    NotificationBus, ServerQuery,
};
use super::error::RemoteError;
use super::notification::{
    COMPOSITE_STATUS_KEY, Notification, NotificationFilter, NotificationListener, TaskName,
    TaskStatus,
};
use crate::artifact::{AttributeSet, DeploymentOptions, OptionValue, keys};
use crate::types::{AppName, ListenerId, MANAGEMENT_DOMAIN, ObjectName};

const DEFAULT_DELAY: Duration = Duration::from_millis(10);

/// How a long-running task reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskScript {
    /// Progress, then `Completed`.
    Complete,
    /// Progress, then `Failed` carrying this message.
    Fail(String),
    /// Progress only; the task never finishes.
    Silent,
    /// `Completed` delivered twice.
    CompleteTwice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartScript {
    /// Report the application's mapped targets.
    Targets,
    /// Report that it started nowhere.
    Nowhere,
    Error(String),
}

/// A request the server received, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Close,
    AddListener,
    RemoveListener,
    ReadName(String),
    Install(String),
    Redeploy(String),
    Uninstall(String),
    Start(String),
    Stop(String),
    Exists(String),
    DistributionStatus(String),
    ApplyAttributes(String),
}

#[derive(Debug, Clone)]
struct InstalledApp {
    targets: Vec<String>,
    running: bool,
    options: DeploymentOptions,
}

struct Script {
    install: TaskScript,
    update: TaskScript,
    uninstall: TaskScript,
    distribution: TaskScript,
    start: StartScript,
    validation: Option<Vec<String>>,
    attribute_error: Option<String>,
    statuses: VecDeque<String>,
    delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            install: TaskScript::Complete,
            update: TaskScript::Complete,
            uninstall: TaskScript::Complete,
            distribution: TaskScript::Complete,
            start: StartScript::Targets,
            validation: None,
            attribute_error: None,
            statuses: VecDeque::new(),
            delay: DEFAULT_DELAY,
        }
    }
}

struct Registration {
    id: ListenerId,
    object: ObjectName,
    filter: NotificationFilter,
    listener: Arc<dyn NotificationListener>,
    handback: String,
}

#[derive(Default)]
struct ServerState {
    apps: BTreeMap<String, InstalledApp>,
    archive_names: BTreeMap<String, String>,
    objects: Vec<ObjectName>,
    attributes: BTreeMap<String, BTreeMap<String, String>>,
    script: Script,
}

/// A management server that lives in the current process.
pub struct SimulatedServer {
    me: Weak<SimulatedServer>,
    state: Mutex<ServerState>,
    listeners: Mutex<Vec<Registration>>,
    calls: Mutex<Vec<Call>>,
    next_listener: AtomicU64,
    alive: AtomicBool,
    reachable: AtomicBool,
    reject_listeners: AtomicBool,
}

impl SimulatedServer {
    /// A cell with one deployment manager and a single application server.
    pub fn new() -> Arc<Self> {
        let server = Arc::new_cyclic(|me| SimulatedServer {
            me: me.clone(),
            state: Mutex::new(ServerState::default()),
            listeners: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            alive: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
            reject_listeners: AtomicBool::new(false),
        });
        server.state.lock().objects.push(ObjectName::from_properties(
            MANAGEMENT_DOMAIN,
            [
                ("type", "AppManagement"),
                ("name", "AppManagement"),
                ("process", "dmgr"),
            ],
        ));
        server.add_server("cell01", "node01", "server1", "IBM", "9.0.5.0");
        server
    }

    pub fn handle(self: &Arc<Self>) -> ClientHandle {
        Arc::clone(self) as ClientHandle
    }

    pub fn connector(self: &Arc<Self>) -> SimulatedConnector {
        SimulatedConnector {
            server: Arc::clone(self),
        }
    }

    // -- scripting -----------------------------------------------------------

    pub fn add_server(&self, cell: &str, node: &str, name: &str, vendor: &str, version: &str) {
        let object = ObjectName::from_properties(
            MANAGEMENT_DOMAIN,
            [
                ("cell", cell),
                ("node", node),
                ("name", name),
                ("process", name),
                ("type", "Server"),
            ],
        );
        let attributes = BTreeMap::from([
            ("cellName".to_string(), cell.to_string()),
            ("nodeName".to_string(), node.to_string()),
            ("name".to_string(), name.to_string()),
            ("pid".to_string(), "4242".to_string()),
            ("serverVendor".to_string(), vendor.to_string()),
            ("serverVersion".to_string(), version.to_string()),
        ]);
        let mut state = self.state.lock();
        state.attributes.insert(object.to_string(), attributes);
        state.objects.push(object);
    }

    pub fn remove_app_management_object(&self) {
        self.state
            .lock()
            .objects
            .retain(|o| o.key_property("type") != Some("AppManagement"));
    }

    pub fn script_install(&self, script: TaskScript) {
        self.state.lock().script.install = script;
    }

    pub fn script_update(&self, script: TaskScript) {
        self.state.lock().script.update = script;
    }

    pub fn script_uninstall(&self, script: TaskScript) {
        self.state.lock().script.uninstall = script;
    }

    pub fn script_start(&self, script: StartScript) {
        self.state.lock().script.start = script;
    }

    /// Composite statuses returned by successive status queries; the last repeats.
    pub fn script_distribution<S: Into<String>>(&self, statuses: impl IntoIterator<Item = S>) {
        let mut state = self.state.lock();
        state.script.distribution = TaskScript::Complete;
        state.script.statuses = statuses.into_iter().map(Into::into).collect();
    }

    pub fn silence_distribution(&self) {
        self.state.lock().script.distribution = TaskScript::Silent;
    }

    pub fn reject_with_validation(&self, messages: Vec<String>) {
        self.state.lock().script.validation = Some(messages);
    }

    pub fn fail_attributes(&self, message: impl Into<String>) {
        self.state.lock().script.attribute_error = Some(message.into());
    }

    pub fn set_notification_delay(&self, delay: Duration) {
        self.state.lock().script.delay = delay;
    }

    /// Name reported by `read_application_name` for an archive file name.
    pub fn set_archive_app_name(&self, file_name: &str, app: &str) {
        self.state
            .lock()
            .archive_names
            .insert(file_name.to_string(), app.to_string());
    }

    pub fn preinstall(&self, app: &str, targets: &[&str]) {
        self.state.lock().apps.insert(
            app.to_string(),
            InstalledApp {
                targets: targets.iter().map(|t| t.to_string()).collect(),
                running: true,
                options: DeploymentOptions::new(),
            },
        );
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Drop the session as if the server restarted.
    pub fn drop_session(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn reject_listeners(&self, reject: bool) {
        self.reject_listeners.store(reject, Ordering::SeqCst);
    }

    /// Push a notification to registered listeners right now, on the caller's thread.
    pub fn emit(&self, notification: &Notification) {
        self.dispatch(notification);
    }

    // -- inspection ----------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn installed_apps(&self) -> Vec<String> {
        self.state.lock().apps.keys().cloned().collect()
    }

    pub fn is_running(&self, app: &str) -> bool {
        self.state.lock().apps.get(app).is_some_and(|a| a.running)
    }

    pub fn install_options(&self, app: &str) -> Option<DeploymentOptions> {
        self.state.lock().apps.get(app).map(|a| a.options.clone())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_session_open(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    // -- internals -----------------------------------------------------------

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn ensure_session(&self) -> Result<(), RemoteError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("simulated server is down".to_string()));
        }
        if !self.alive.load(Ordering::SeqCst) {
            return Err(RemoteError::NotConnected);
        }
        Ok(())
    }

    fn dispatch(&self, notification: &Notification) {
        let targets: Vec<(Arc<dyn NotificationListener>, String)> = self
            .listeners
            .lock()
            .iter()
            .filter(|r| r.filter.accepts(notification))
            .map(|r| (Arc::clone(&r.listener), r.handback.clone()))
            .collect();

        for (listener, handback) in targets {
            listener.handle_notification(notification, &handback);
        }
    }

    fn deliver_later(&self, notifications: Vec<Notification>) {
        let Some(server) = self.me.upgrade() else {
            return;
        };
        let delay = self.state.lock().script.delay;
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            for notification in &notifications {
                server.dispatch(notification);
            }
        });
    }

    fn task_notifications(task: TaskName, script: &TaskScript, app: &AppName) -> Vec<Notification> {
        let started = Notification::new(
            task,
            TaskStatus::InProgress,
            format!("{task} of {app} started."),
        );
        let completed = Notification::new(
            task,
            TaskStatus::Completed,
            format!("{task} of {app} completed successfully."),
        );
        match script {
            TaskScript::Complete => vec![started, completed],
            TaskScript::Fail(message) => vec![
                started,
                Notification::new(task, TaskStatus::Failed, message.clone()),
            ],
            TaskScript::Silent => vec![started],
            TaskScript::CompleteTwice => vec![started, completed.clone(), completed],
        }
    }

    fn mapped_targets(options: &DeploymentOptions) -> Vec<String> {
        match options.get(keys::MODULE_TO_SERVER) {
            Some(OptionValue::Map(mapping)) => mapping
                .values()
                .flat_map(|t| t.split('+'))
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn check_validation(&self) -> Result<(), RemoteError> {
        match &self.state.lock().script.validation {
            Some(messages) => Err(RemoteError::Validation(messages.clone())),
            None => Ok(()),
        }
    }
}

impl NotificationBus for SimulatedServer {
    fn add_notification_listener(
        &self,
        object: &ObjectName,
        filter: &NotificationFilter,
        listener: Arc<dyn NotificationListener>,
        handback: &str,
    ) -> Result<ListenerId, RemoteError> {
        self.record(Call::AddListener);
        self.ensure_session()?;
        if self.reject_listeners.load(Ordering::SeqCst) {
            return Err(RemoteError::ListenerRejected(object.to_string()));
        }
        if !self.state.lock().objects.contains(object) {
            return Err(RemoteError::ObjectNotFound(object.to_string()));
        }

        let id = ListenerId::new(format!(
            "listener-{}",
            self.next_listener.fetch_add(1, Ordering::SeqCst)
        ));
        self.listeners.lock().push(Registration {
            id: id.clone(),
            object: object.clone(),
            filter: filter.clone(),
            listener,
            handback: handback.to_string(),
        });
        Ok(id)
    }

    fn remove_notification_listener(
        &self,
        object: &ObjectName,
        listener: &ListenerId,
    ) -> Result<(), RemoteError> {
        self.record(Call::RemoveListener);
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|r| !(r.id == *listener && r.object == *object));
        if listeners.len() == before {
            return Err(RemoteError::ListenerRejected(format!(
                "{listener} is not registered on {object}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ServerQuery for SimulatedServer {
    async fn is_alive(&self) -> Result<bool, RemoteError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("simulated server is down".to_string()));
        }
        Ok(self.alive.load(Ordering::SeqCst))
    }

    async fn query_names(&self, pattern: &ObjectName) -> Result<Vec<ObjectName>, RemoteError> {
        self.ensure_session()?;
        Ok(self
            .state
            .lock()
            .objects
            .iter()
            .filter(|o| pattern.matches(o))
            .cloned()
            .collect())
    }

    async fn get_attribute(
        &self,
        object: &ObjectName,
        attribute: &str,
    ) -> Result<Option<String>, RemoteError> {
        self.ensure_session()?;
        let state = self.state.lock();
        let attributes = state
            .attributes
            .get(&object.to_string())
            .ok_or_else(|| RemoteError::ObjectNotFound(object.to_string()))?;
        Ok(attributes.get(attribute).cloned())
    }
}

#[async_trait]
impl AppManagement for SimulatedServer {
    async fn read_application_name(&self, archive: &Path) -> Result<String, RemoteError> {
        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.record(Call::ReadName(file_name.clone()));
        self.ensure_session()?;

        if let Some(name) = self.state.lock().archive_names.get(&file_name) {
            return Ok(name.clone());
        }
        archive
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Operation(format!("cannot read {}", archive.display())))
    }

    async fn install_application(
        &self,
        _archive: &Path,
        app: &AppName,
        options: &DeploymentOptions,
    ) -> Result<(), RemoteError> {
        self.record(Call::Install(app.to_string()));
        self.ensure_session()?;
        self.check_validation()?;

        let script = {
            let mut state = self.state.lock();
            if state.apps.contains_key(app.as_str()) {
                return Err(RemoteError::Operation(format!("{app} already exists")));
            }
            let script = state.script.install.clone();
            if script != TaskScript::Silent && !matches!(script, TaskScript::Fail(_)) {
                state.apps.insert(
                    app.to_string(),
                    InstalledApp {
                        targets: Self::mapped_targets(options),
                        running: false,
                        options: options.clone(),
                    },
                );
            }
            script
        };

        self.deliver_later(Self::task_notifications(TaskName::Install, &script, app));
        Ok(())
    }

    async fn redeploy_application(
        &self,
        _archive: &Path,
        app: &AppName,
        options: &DeploymentOptions,
    ) -> Result<(), RemoteError> {
        self.record(Call::Redeploy(app.to_string()));
        self.ensure_session()?;
        self.check_validation()?;

        let script = {
            let mut state = self.state.lock();
            let script = state.script.update.clone();
            let installed = state
                .apps
                .get_mut(app.as_str())
                .ok_or_else(|| RemoteError::NotInstalled(app.to_string()))?;
            if !matches!(script, TaskScript::Fail(_) | TaskScript::Silent) {
                installed.targets = Self::mapped_targets(options);
                installed.options = options.clone();
            }
            script
        };

        self.deliver_later(Self::task_notifications(TaskName::Update, &script, app));
        Ok(())
    }

    async fn uninstall_application(
        &self,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<(), RemoteError> {
        self.record(Call::Uninstall(app.to_string()));
        self.ensure_session()?;

        let script = {
            let mut state = self.state.lock();
            if !state.apps.contains_key(app.as_str()) {
                return Err(RemoteError::NotInstalled(app.to_string()));
            }
            let script = state.script.uninstall.clone();
            if !matches!(script, TaskScript::Fail(_) | TaskScript::Silent) {
                state.apps.remove(app.as_str());
            }
            script
        };

        self.deliver_later(Self::task_notifications(TaskName::Uninstall, &script, app));
        Ok(())
    }

    async fn start_application(
        &self,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<Option<Vec<String>>, RemoteError> {
        self.record(Call::Start(app.to_string()));
        self.ensure_session()?;

        let mut state = self.state.lock();
        let script = state.script.start.clone();
        let installed = state
            .apps
            .get_mut(app.as_str())
            .ok_or_else(|| RemoteError::NotInstalled(app.to_string()))?;

        match script {
            StartScript::Targets => {
                installed.running = true;
                Ok(Some(installed.targets.clone()))
            }
            StartScript::Nowhere => Ok(None),
            StartScript::Error(message) => Err(RemoteError::Operation(message)),
        }
    }

    async fn stop_application(
        &self,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<Option<Vec<String>>, RemoteError> {
        self.record(Call::Stop(app.to_string()));
        self.ensure_session()?;

        let mut state = self.state.lock();
        let installed = state
            .apps
            .get_mut(app.as_str())
            .ok_or_else(|| RemoteError::NotInstalled(app.to_string()))?;
        if !installed.running {
            return Ok(None);
        }
        installed.running = false;
        Ok(Some(installed.targets.clone()))
    }

    async fn check_if_app_exists(
        &self,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<bool, RemoteError> {
        self.record(Call::Exists(app.to_string()));
        self.ensure_session()?;
        Ok(self.state.lock().apps.contains_key(app.as_str()))
    }

    async fn get_distribution_status(
        &self,
        app: &AppName,
        _options: &DeploymentOptions,
    ) -> Result<(), RemoteError> {
        self.record(Call::DistributionStatus(app.to_string()));
        self.ensure_session()?;

        let (script, composite) = {
            let mut state = self.state.lock();
            let composite = if state.script.statuses.len() > 1 {
                state.script.statuses.pop_front()
            } else {
                state.script.statuses.front().cloned()
            }
            .unwrap_or_else(|| {
                "WebSphere:cell=cell01,node=node01,distribution=true".to_string()
            });
            (state.script.distribution.clone(), composite)
        };

        let status = match script {
            TaskScript::Silent => return Ok(()),
            TaskScript::Fail(message) => {
                Notification::new(TaskName::DistributionStatus, TaskStatus::Failed, message)
            }
            TaskScript::Complete | TaskScript::CompleteTwice => Notification::new(
                TaskName::DistributionStatus,
                TaskStatus::Completed,
                format!("distribution status of {app}"),
            )
            .with_property(COMPOSITE_STATUS_KEY, composite),
        };

        self.deliver_later(vec![status]);
        Ok(())
    }

    async fn apply_attributes(
        &self,
        app: &AppName,
        _attributes: &AttributeSet,
    ) -> Result<(), RemoteError> {
        self.record(Call::ApplyAttributes(app.to_string()));
        self.ensure_session()?;
        match &self.state.lock().script.attribute_error {
            Some(message) => Err(RemoteError::Operation(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ManagementClient for SimulatedServer {
    async fn close(&self) {
        self.record(Call::Close);
        self.alive.store(false, Ordering::SeqCst);
    }
}

/// Hands out sessions to a [`SimulatedServer`].
///
/// Like real client libraries, a secured connect installs the trust and key
/// stores into process-wide settings.
#[derive(Clone)]
pub struct SimulatedConnector {
    server: Arc<SimulatedServer>,
}

impl SimulatedConnector {
    pub fn server(&self) -> &Arc<SimulatedServer> {
        &self.server
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
    ) -> Result<ClientHandle, RemoteError> {
        self.server.record(Call::Connect);

        // Settings are installed before the server is contacted, so a failed
        // connect leaves them changed too.
        if let Some(credentials) = credentials {
            if let Some(trust) = &credentials.trust_store {
                // SAFETY: connects happen on the deploy task before any
                // notification thread for this session exists.
                unsafe { std::env::set_var("SSL_CERT_FILE", trust) };
            }
            if let Some(key) = &credentials.key_store {
                // SAFETY: as above.
                unsafe { std::env::set_var("SSL_CLIENT_CERT", key) };
            }
        }

        if !self.server.reachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable(endpoint.to_string()));
        }

        self.server.alive.store(true, Ordering::SeqCst);
        Ok(self.server.handle())
    }
}
