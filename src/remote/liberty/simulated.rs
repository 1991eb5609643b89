// ABOUTME: In-memory Liberty server answering the JMX calls the Liberty adapter makes.
// ABOUTME: Models the dropins directory, application MBeans and a configurable pickup delay.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{
    DEFAULT_SERVER_NAME, DROPINS_DIR, LibertyConnector, MBeanConnection, MBeanConnector,
    file_transfer_object, server_info_object,
};
use crate::remote::{Credentials, Endpoint, RemoteError};
use crate::types::{MANAGEMENT_DOMAIN, ObjectName};

const APPLICATION_SERVICE: &str = "com.ibm.websphere.application.ApplicationMBean";

/// A JMX request the server received, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibertyCall {
    Connect,
    Close,
    Upload { local: String, remote: String },
    Delete(String),
    Start(String),
    Stop(String),
}

#[derive(Default)]
struct LibertyState {
    dropins: BTreeSet<String>,
    /// Registered applications and whether each is running.
    apps: BTreeMap<String, bool>,
    /// Applications uploaded but not yet picked up, with the lookups left before they are.
    pending: BTreeMap<String, u32>,
    scan_delay: u32,
    upload_error: Option<String>,
    server_name: String,
}

/// A standalone Liberty server that lives in the current process.
pub struct SimulatedLiberty {
    state: Mutex<LibertyState>,
    calls: Mutex<Vec<LibertyCall>>,
    file_transfer: AtomicBool,
    alive: AtomicBool,
    reachable: AtomicBool,
}

impl SimulatedLiberty {
    /// A running server with the REST connector and file transfer enabled.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LibertyState {
                server_name: DEFAULT_SERVER_NAME.to_string(),
                ..LibertyState::default()
            }),
            calls: Mutex::new(Vec::new()),
            file_transfer: AtomicBool::new(true),
            alive: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
        })
    }

    pub fn connector(self: &Arc<Self>) -> LibertyConnector {
        LibertyConnector::new(Arc::new(SimulatedLibertyConnector {
            server: Arc::clone(self),
        }))
    }

    // -- scripting -----------------------------------------------------------

    /// Put an archive in dropins that the server has already picked up and started.
    pub fn preinstall(&self, file_name: &str) {
        let mut state = self.state.lock();
        state.dropins.insert(file_name.to_string());
        state.apps.insert(app_of(file_name), true);
    }

    pub fn set_file_transfer(&self, enabled: bool) {
        self.file_transfer.store(enabled, Ordering::SeqCst);
    }

    /// How many application lookups pass before an upload is picked up.
    pub fn set_scan_delay(&self, lookups: u32) {
        self.state.lock().scan_delay = lookups;
    }

    pub fn fail_uploads(&self, message: impl Into<String>) {
        self.state.lock().upload_error = Some(message.into());
    }

    pub fn set_server_name(&self, name: &str) {
        self.state.lock().server_name = name.to_string();
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    // -- inspection ----------------------------------------------------------

    pub fn calls(&self) -> Vec<LibertyCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn dropins(&self) -> Vec<String> {
        self.state.lock().dropins.iter().cloned().collect()
    }

    pub fn is_running(&self, app: &str) -> bool {
        self.state.lock().apps.get(app).copied().unwrap_or(false)
    }

    pub fn is_session_open(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    // -- internals -----------------------------------------------------------

    fn record(&self, call: LibertyCall) {
        self.calls.lock().push(call);
    }

    fn ensure_session(&self) -> Result<(), RemoteError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("simulated Liberty server is down".to_string()));
        }
        if !self.alive.load(Ordering::SeqCst) {
            return Err(RemoteError::NotConnected);
        }
        Ok(())
    }

    fn application_of(object: &ObjectName) -> Option<&str> {
        if object.key_property("service") == Some(APPLICATION_SERVICE) {
            object.key_property("name")
        } else {
            None
        }
    }

    /// Registration check for an application. Each lookup moves a pending
    /// upload one step closer to being picked up.
    fn lookup_app(&self, app: &str) -> bool {
        let mut state = self.state.lock();
        let picked_up = match state.pending.get_mut(app) {
            Some(left) => {
                *left = left.saturating_sub(1);
                *left == 0
            }
            None => false,
        };
        if picked_up {
            state.pending.remove(app);
            state.apps.insert(app.to_string(), true);
        }
        state.apps.contains_key(app)
    }

    fn upload(&self, params: &[String]) -> Result<(), RemoteError> {
        let [local, remote, ..] = params else {
            return Err(RemoteError::Protocol("uploadFile takes a source and a target".to_string()));
        };
        self.record(LibertyCall::Upload {
            local: local.clone(),
            remote: remote.clone(),
        });

        let mut state = self.state.lock();
        if let Some(message) = &state.upload_error {
            return Err(RemoteError::Operation(message.clone()));
        }
        let file_name = dropins_file(remote)?;
        let app = app_of(&file_name);
        state.dropins.insert(file_name);
        if state.scan_delay == 0 {
            state.apps.insert(app, true);
        } else {
            let delay = state.scan_delay;
            state.pending.insert(app, delay);
        }
        Ok(())
    }

    fn delete(&self, params: &[String]) -> Result<(), RemoteError> {
        let [remote, ..] = params else {
            return Err(RemoteError::Protocol("deleteFile takes a path".to_string()));
        };
        self.record(LibertyCall::Delete(remote.clone()));

        let file_name = dropins_file(remote)?;
        let mut state = self.state.lock();
        if !state.dropins.remove(&file_name) {
            return Err(RemoteError::Operation(format!("{remote} does not exist")));
        }
        let app = app_of(&file_name);
        state.apps.remove(&app);
        state.pending.remove(&app);
        Ok(())
    }

    fn set_running(&self, app: &str, running: bool) -> Result<(), RemoteError> {
        match self.state.lock().apps.get_mut(app) {
            Some(state) => {
                *state = running;
                Ok(())
            }
            None => Err(RemoteError::ObjectNotFound(app.to_string())),
        }
    }
}

fn app_of(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem)
        .to_string()
}

fn dropins_file(remote: &str) -> Result<String, RemoteError> {
    remote
        .strip_prefix(DROPINS_DIR)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .map(str::to_string)
        .ok_or_else(|| RemoteError::Operation(format!("{remote} is outside dropins")))
}

#[async_trait]
impl MBeanConnection for SimulatedLiberty {
    async fn is_alive(&self) -> Result<bool, RemoteError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("simulated Liberty server is down".to_string()));
        }
        Ok(self.alive.load(Ordering::SeqCst))
    }

    async fn is_registered(&self, object: &ObjectName) -> Result<bool, RemoteError> {
        self.ensure_session()?;
        if *object == file_transfer_object() {
            return Ok(self.file_transfer.load(Ordering::SeqCst));
        }
        if *object == server_info_object() {
            return Ok(true);
        }
        Ok(Self::application_of(object).is_some_and(|app| self.lookup_app(app)))
    }

    async fn query_names(&self, pattern: &ObjectName) -> Result<Vec<ObjectName>, RemoteError> {
        self.ensure_session()?;
        let mut names = vec![server_info_object()];
        if self.file_transfer.load(Ordering::SeqCst) {
            names.push(file_transfer_object());
        }
        names.extend(self.state.lock().apps.keys().map(|app| {
            ObjectName::from_properties(
                MANAGEMENT_DOMAIN,
                [("service", APPLICATION_SERVICE), ("name", app.as_str())],
            )
        }));
        Ok(names.into_iter().filter(|n| pattern.matches(n)).collect())
    }

    async fn get_attribute(
        &self,
        object: &ObjectName,
        attribute: &str,
    ) -> Result<Option<String>, RemoteError> {
        self.ensure_session()?;
        if *object == server_info_object() && attribute == "Name" {
            return Ok(Some(self.state.lock().server_name.clone()));
        }
        Err(RemoteError::ObjectNotFound(object.to_string()))
    }

    async fn invoke(
        &self,
        object: &ObjectName,
        operation: &str,
        params: &[String],
    ) -> Result<Option<String>, RemoteError> {
        self.ensure_session()?;

        if *object == file_transfer_object() {
            if !self.file_transfer.load(Ordering::SeqCst) {
                return Err(RemoteError::ObjectNotFound(object.to_string()));
            }
            match operation {
                "uploadFile" => self.upload(params)?,
                "deleteFile" => self.delete(params)?,
                other => {
                    return Err(RemoteError::Operation(format!("FileTransfer has no {other}")));
                }
            }
            return Ok(None);
        }

        let Some(app) = Self::application_of(object) else {
            return Err(RemoteError::ObjectNotFound(object.to_string()));
        };
        match operation {
            "start" => {
                self.record(LibertyCall::Start(app.to_string()));
                self.set_running(app, true)?;
            }
            "stop" => {
                self.record(LibertyCall::Stop(app.to_string()));
                self.set_running(app, false)?;
            }
            other => {
                return Err(RemoteError::Operation(format!("ApplicationMBean has no {other}")));
            }
        }
        Ok(None)
    }

    async fn close(&self) {
        self.record(LibertyCall::Close);
        self.alive.store(false, Ordering::SeqCst);
    }
}

struct SimulatedLibertyConnector {
    server: Arc<SimulatedLiberty>,
}

#[async_trait]
impl MBeanConnector for SimulatedLibertyConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        _credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn MBeanConnection>, RemoteError> {
        self.server.record(LibertyCall::Connect);
        if !self.server.reachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable(endpoint.to_string()));
        }
        self.server.alive.store(true, Ordering::SeqCst);
        Ok(Arc::clone(&self.server) as Arc<dyn MBeanConnection>)
    }
}
