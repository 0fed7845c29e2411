//! Host runtime bindings
//!
//! The button-panel host renders variables and feedback colors; the gateway
//! only tells it what changed. `VariableTable` is the in-process host used by
//! the REPL and the HTTP API.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Connection status reported to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Transport open and configuration complete
    Ok,
    /// Opening the transport
    Connecting,
    /// Host/port missing or invalid; sends are refused
    BadConfig,
    /// Bind or send failed; waits for reconfiguration
    ConnectionFailure,
    /// Transport closed
    Disconnected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Ok => "ok",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::BadConfig => "bad_config",
            ConnectionStatus::ConnectionFailure => "connection_failure",
            ConnectionStatus::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// A display variable the host should render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableDefinition {
    pub variable_id: String,
    pub name: String,
}

impl VariableDefinition {
    pub fn new(variable_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            variable_id: variable_id.into(),
            name: name.into(),
        }
    }
}

/// Callbacks into the host runtime
pub trait HostBindings: Send + Sync {
    /// Register display variables (added to, never replacing, earlier ones)
    ///
    /// Called once per variable: the static set at init, then each execute
    /// the first time it is seen.
    fn define_variables(&self, definitions: &[VariableDefinition]);

    /// Publish the current value of one variable
    fn set_variable(&self, variable_id: &str, value: Value);

    /// Ask the host to re-evaluate every feedback
    fn check_feedbacks(&self);

    /// Report connection status
    fn update_status(&self, status: ConnectionStatus, message: Option<&str>);

    /// Surface a warning to the operator
    fn log_warning(&self, message: &str);
}

/// Change notification pushed to API subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostUpdate {
    VariablesDefined { variable_ids: Vec<String> },
    Variable { variable_id: String, value: Value },
    FeedbacksChanged { generation: u64 },
    Status { status: ConnectionStatus, message: Option<String> },
}

/// In-memory host: keeps variables and status, broadcasts every change
pub struct VariableTable {
    definitions: RwLock<Vec<VariableDefinition>>,
    values: RwLock<BTreeMap<String, Value>>,
    status: RwLock<(ConnectionStatus, Option<String>)>,
    feedback_generation: RwLock<u64>,
    update_tx: broadcast::Sender<HostUpdate>,
}

impl Default for VariableTable {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableTable {
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(256);
        Self {
            definitions: RwLock::new(Vec::new()),
            values: RwLock::new(BTreeMap::new()),
            status: RwLock::new((ConnectionStatus::Disconnected, None)),
            feedback_generation: RwLock::new(0),
            update_tx,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<HostUpdate> {
        self.update_tx.subscribe()
    }

    pub fn definitions(&self) -> Vec<VariableDefinition> {
        self.definitions.read().clone()
    }

    pub fn value(&self, variable_id: &str) -> Option<Value> {
        self.values.read().get(variable_id).cloned()
    }

    pub fn values(&self) -> BTreeMap<String, Value> {
        self.values.read().clone()
    }

    pub fn status(&self) -> (ConnectionStatus, Option<String>) {
        self.status.read().clone()
    }

    fn publish(&self, update: HostUpdate) {
        // No subscribers is fine
        let _ = self.update_tx.send(update);
    }
}

impl HostBindings for VariableTable {
    fn define_variables(&self, definitions: &[VariableDefinition]) {
        let mut added = Vec::new();
        {
            let mut defs = self.definitions.write();
            for def in definitions {
                if defs.iter().any(|d| d.variable_id == def.variable_id) {
                    continue;
                }
                defs.push(def.clone());
                added.push(def.variable_id.clone());
            }
        }
        if !added.is_empty() {
            debug!(count = added.len(), "Variables defined");
            self.publish(HostUpdate::VariablesDefined { variable_ids: added });
        }
    }

    fn set_variable(&self, variable_id: &str, value: Value) {
        self.values
            .write()
            .insert(variable_id.to_string(), value.clone());
        self.publish(HostUpdate::Variable {
            variable_id: variable_id.to_string(),
            value,
        });
    }

    fn check_feedbacks(&self) {
        let generation = {
            let mut gen = self.feedback_generation.write();
            *gen += 1;
            *gen
        };
        self.publish(HostUpdate::FeedbacksChanged { generation });
    }

    fn update_status(&self, status: ConnectionStatus, message: Option<&str>) {
        info!(%status, message = message.unwrap_or(""), "Console status");
        *self.status.write() = (status.clone(), message.map(str::to_string));
        self.publish(HostUpdate::Status {
            status,
            message: message.map(str::to_string),
        });
    }

    fn log_warning(&self, message: &str) {
        warn!("⚠️  {}", message);
    }
}
