//! StateActor - single logical actor for all console state
//!
//! Command encoding, optimistic writes, inbound status writes and feedback
//! evaluation all run here, one command at a time. No two mutations can
//! interleave, so toggles always resolve against the value they will replace.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use super::actor_handle::StateActorHandle;
use super::commands::StateCommand;
use super::store::StateStore;
use super::types::{Origin, StateUpdate};
use crate::catalog;
use crate::encoder;
use crate::feedback;
use crate::host::HostBindings;

/// Actor responsible for the StateStore
///
/// # Architecture
///
/// ```text
/// ┌──────────────────────────────────────────────┐
/// │                 StateActor                    │
/// │  store: StateStore (playbacks, executes, dbo) │
/// │  host:  Arc<dyn HostBindings>                 │
/// │                     ▲                         │
/// │                     │ StateCommand            │
/// │        command_rx (UnboundedReceiver)         │
/// └──────────────────────────────────────────────┘
/// ```
pub struct StateActor {
    store: StateStore,
    host: Arc<dyn HostBindings>,
    command_rx: mpsc::UnboundedReceiver<StateCommand>,
    /// Total writes applied
    update_count: u64,
}

impl StateActor {
    /// Spawn the actor on the current tokio runtime and return its handle
    pub fn spawn(host: Arc<dyn HostBindings>) -> StateActorHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let actor = StateActor {
            store: StateStore::new(),
            host,
            command_rx: cmd_rx,
            update_count: 0,
        };

        tokio::spawn(actor.run());

        info!("StateActor spawned");

        StateActorHandle::new(cmd_tx)
    }

    async fn run(mut self) {
        debug!("StateActor run loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing command");

            match cmd {
                StateCommand::ApplyStatus { message } => match message.to_update() {
                    Some(update) => self.apply(update, Origin::Authoritative),
                    None => debug!(?message, "Status for untracked playback ignored"),
                },
                StateCommand::Dispatch { command, response } => {
                    let encoded = encoder::encode(&command, &self.store);
                    if let Some(update) = encoded.update {
                        self.apply(update, Origin::Optimistic);
                    }
                    let _ = response.send(encoded.message);
                }
                StateCommand::Evaluate { query, response } => {
                    let _ = response.send(feedback::evaluate(&self.store, &query));
                }
                StateCommand::GetPlayback { id, response } => {
                    let _ = response.send(self.store.playback(id));
                }
                StateCommand::GetExecute { key, response } => {
                    let _ = response.send(self.store.execute(&key).map(|e| e.level));
                }
                StateCommand::Snapshot { response } => {
                    let _ = response.send(self.store.snapshot());
                }
                StateCommand::Resync { response } => {
                    self.resync();
                    let _ = response.send(());
                }
                StateCommand::Shutdown => {
                    info!("StateActor received shutdown command");
                    break;
                }
            }
        }

        info!(
            update_count = self.update_count,
            "StateActor run loop terminated"
        );
    }

    /// Write to the store and notify the host
    ///
    /// A newly seen execute registers its display variable before its value is
    /// published. Feedbacks are re-checked after every write.
    fn apply(&mut self, update: StateUpdate, origin: Origin) {
        let key = update.key();
        let outcome = self.store.apply(update, origin);
        self.update_count += 1;

        if let Some(created) = &outcome.created {
            self.host
                .define_variables(&[catalog::execute_variable(created)]);
        }

        let value = self.store.get(&key);
        trace!(?key, ?value, %origin, changed = outcome.changed, "Publishing state");

        self.host.set_variable(&key.variable_id(), value.into());
        self.host.check_feedbacks();
    }

    /// Republish values only; execute variables were defined when first seen
    fn resync(&self) {
        for (variable_id, value) in self.store.variable_values() {
            self.host.set_variable(&variable_id, value);
        }
        self.host.check_feedbacks();
    }
}
