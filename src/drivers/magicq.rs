//! ChamSys MagicQ OSC driver
//!
//! Sends encoded commands to the console and feeds its status messages back
//! into the state actor:
//! - outbound: options → Command → (state actor) OSC message + optimistic write → UDP
//! - inbound: UDP → OSC message → (state actor) authoritative write
//!
//! Sends are fire-and-forget. A failed send is reported but never rolls back
//! the optimistic write.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::Driver;
use crate::actions::{self, Options};
use crate::catalog;
use crate::config::ConsoleConfig;
use crate::encoder::Command;
use crate::error::GatewayError;
use crate::host::{ConnectionStatus, HostBindings};
use crate::state::StateActorHandle;
use crate::transport::{OscTransport, TransportEvent};

/// MagicQ console driver
pub struct MagicQDriver {
    name: String,
    config: RwLock<ConsoleConfig>,
    state: StateActorHandle,
    host: Arc<dyn HostBindings>,

    /// Open socket; the async lock serializes sends against reconfiguration
    transport: tokio::sync::Mutex<Option<OscTransport>>,
    /// Task draining transport events into the state actor
    event_pump: Mutex<Option<JoinHandle<()>>>,

    /// Shared with the event pump so receive failures land here too
    current_status: Arc<RwLock<ConnectionStatus>>,
}

impl MagicQDriver {
    /// Create the driver and spawn its state actor (requires a tokio runtime)
    pub fn new(config: ConsoleConfig, host: Arc<dyn HostBindings>) -> Self {
        Self {
            name: "magicq".to_string(),
            config: RwLock::new(config),
            state: StateActorHandle::spawn(host.clone()),
            host,
            transport: tokio::sync::Mutex::new(None),
            event_pump: Mutex::new(None),
            current_status: Arc::new(RwLock::new(ConnectionStatus::Disconnected)),
        }
    }

    /// Handle to the console state
    pub fn state(&self) -> &StateActorHandle {
        &self.state
    }

    pub fn config(&self) -> ConsoleConfig {
        self.config.read().clone()
    }

    /// Local address of the open socket, if any
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.lock().await.as_ref().map(OscTransport::local_addr)
    }

    fn emit_status(&self, status: ConnectionStatus, message: Option<&str>) {
        report_status(&self.current_status, self.host.as_ref(), status, message);
    }

    /// Status implied by the send configuration once a socket is open
    fn emit_config_status(&self) {
        match self.config.read().send_target() {
            Ok((host, port)) => {
                let target = format!("{}:{}", host, port);
                self.emit_status(ConnectionStatus::Ok, Some(&target));
            }
            Err(e) => self.emit_status(ConnectionStatus::BadConfig, Some(&e.to_string())),
        }
    }

    /// Close the current transport (if any), then bind a new one
    async fn open_transport(&self) -> crate::error::Result<()> {
        let config = self.config();
        self.emit_status(ConnectionStatus::Connecting, None);

        let mut slot = self.transport.lock().await;
        if let Some(previous) = slot.take() {
            previous.close().await;
        }
        if let Some(pump) = self.event_pump.lock().take() {
            pump.abort();
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        match OscTransport::open(&config, event_tx).await {
            Ok(transport) => {
                info!(local_addr = %transport.local_addr(), "🎛️  MagicQ transport open");
                *slot = Some(transport);
                drop(slot);

                let pump = tokio::spawn(pump_events(
                    event_rx,
                    self.state.clone(),
                    self.host.clone(),
                    self.current_status.clone(),
                ));
                *self.event_pump.lock() = Some(pump);

                self.emit_config_status();
                Ok(())
            }
            Err(e) => {
                warn!("MagicQ transport failed: {}", e);
                self.emit_status(ConnectionStatus::ConnectionFailure, Some(&e.to_string()));
                Err(e)
            }
        }
    }

    /// Apply a new console configuration
    ///
    /// The socket is rebound only when listening settings changed (or none is
    /// open); the old socket is always released before the new one is bound.
    pub async fn reconfigure(&self, new_config: ConsoleConfig) -> crate::error::Result<()> {
        let previous = std::mem::replace(&mut *self.config.write(), new_config.clone());
        let has_transport = self.transport.lock().await.is_some();

        if !has_transport || previous.transport_changed(&new_config) {
            info!("🔄 Console settings changed, reopening transport");
            self.open_transport().await
        } else {
            debug!("Console send target updated");
            self.emit_config_status();
            Ok(())
        }
    }

    /// Encode, apply the optimistic write and send one command
    pub async fn send(&self, command: Command) -> crate::error::Result<()> {
        let (host, port) = match self.config.read().send_target() {
            Ok(target) => target,
            Err(e) => {
                self.host.log_warning(&e.to_string());
                return Err(e);
            }
        };

        let transport = self.transport.lock().await;
        let Some(transport) = transport.as_ref() else {
            self.host.log_warning("MagicQ transport is not open");
            return Err(GatewayError::NotConnected);
        };

        let kind = command.kind();
        let message = self.state.dispatch(command).await?;
        trace!(action = kind, addr = %message.addr, "Dispatching");

        if let Err(e) = transport.send(&message, &host, port).await {
            warn!(action = kind, "Send failed: {}", e);
            self.emit_status(ConnectionStatus::ConnectionFailure, Some(&e.to_string()));
            return Err(e);
        }
        Ok(())
    }
}

fn report_status(
    current: &RwLock<ConnectionStatus>,
    host: &dyn HostBindings,
    status: ConnectionStatus,
    message: Option<&str>,
) {
    *current.write() = status.clone();
    host.update_status(status, message);
}

async fn pump_events(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    state: StateActorHandle,
    host: Arc<dyn HostBindings>,
    status: Arc<RwLock<ConnectionStatus>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Ready { local_addr } => debug!(%local_addr, "Transport ready"),
            TransportEvent::Message(message) => {
                state.apply_inbound(&message.addr, &message.args);
            }
            TransportEvent::Error(reason) => {
                host.log_warning(&format!("OSC receive failed: {}", reason));
                report_status(
                    &status,
                    host.as_ref(),
                    ConnectionStatus::ConnectionFailure,
                    Some(&reason),
                );
            }
        }
    }
    trace!("Transport event pump finished");
}

#[async_trait]
impl Driver for MagicQDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<()> {
        info!("🎛️  Initializing MagicQ driver");
        self.host
            .define_variables(&catalog::static_variable_definitions());
        self.state.resync().await?;
        self.open_transport().await?;
        Ok(())
    }

    async fn execute(&self, action: &str, options: &Options) -> crate::error::Result<()> {
        let command = actions::parse_action(action, options)?;
        self.send(command).await
    }

    async fn evaluate_feedback(
        &self,
        feedback: &str,
        options: &Options,
    ) -> crate::error::Result<bool> {
        let query = actions::parse_feedback(feedback, options)?;
        self.state.evaluate(query).await
    }

    async fn sync(&self) -> Result<()> {
        debug!("MagicQ driver sync - republishing state");
        self.state.resync().await?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down MagicQ driver");
        if let Some(transport) = self.transport.lock().await.take() {
            transport.close().await;
        }
        if let Some(pump) = self.event_pump.lock().take() {
            pump.abort();
        }
        self.state.shutdown();
        self.emit_status(ConnectionStatus::Disconnected, None);
        info!("✅ MagicQ driver shutdown complete");
        Ok(())
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.current_status.read().clone()
    }
}
