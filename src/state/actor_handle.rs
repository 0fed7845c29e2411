//! StateActorHandle - Public API for the StateActor
//!
//! Fire-and-forget methods for inbound status writes, async methods with
//! oneshot channels for everything that needs an answer.

use rosc::{OscMessage, OscType};
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use super::commands::StateCommand;
use super::store::StateSnapshot;
use super::types::{ExecKey, PlaybackId, PlaybackState};
use crate::decoder;
use crate::encoder::Command;
use crate::error::{GatewayError, Result};
use crate::feedback::FeedbackQuery;
use crate::host::HostBindings;

/// Handle for interacting with the StateActor
///
/// # Hot Path Methods (fire-and-forget)
/// - `apply_inbound` - decode and apply a console status message
///
/// # Query Methods (async with response)
/// - `dispatch` - encode a command and apply its optimistic write
/// - `evaluate` - feedback query
/// - `playback`, `execute_level`, `snapshot` - reads
#[derive(Clone)]
pub struct StateActorHandle {
    cmd_tx: mpsc::UnboundedSender<StateCommand>,
}

impl StateActorHandle {
    pub fn new(cmd_tx: mpsc::UnboundedSender<StateCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Spawn a new StateActor and return a handle
    pub fn spawn(host: std::sync::Arc<dyn HostBindings>) -> Self {
        super::actor::StateActor::spawn(host)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> StateCommand) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(response_tx))
            .map_err(|_| GatewayError::StateActorClosed)?;
        response_rx.await.map_err(|_| GatewayError::StateActorClosed)
    }

    // =========================================================================
    // Hot path methods (fire-and-forget, no await)
    // =========================================================================

    /// Decode an inbound message and queue its authoritative write
    ///
    /// Returns false when the address is not tracked (the message is ignored).
    pub fn apply_inbound(&self, address: &str, args: &[OscType]) -> bool {
        match decoder::decode(address, args) {
            Some(message) => {
                let _ = self.cmd_tx.send(StateCommand::ApplyStatus { message });
                true
            }
            None => {
                trace!(address, "Inbound address not tracked");
                false
            }
        }
    }

    // =========================================================================
    // Query methods (async with response)
    // =========================================================================

    /// Encode a command against current state, applying its optimistic write
    pub async fn dispatch(&self, command: Command) -> Result<OscMessage> {
        self.request(|response| StateCommand::Dispatch { command, response })
            .await
    }

    pub async fn evaluate(&self, query: FeedbackQuery) -> Result<bool> {
        self.request(|response| StateCommand::Evaluate { query, response })
            .await
    }

    pub async fn playback(&self, id: PlaybackId) -> Result<PlaybackState> {
        self.request(|response| StateCommand::GetPlayback { id, response })
            .await
    }

    /// Level of an execute, None if it was never referenced
    pub async fn execute_level(&self, key: ExecKey) -> Result<Option<u8>> {
        self.request(|response| StateCommand::GetExecute { key, response })
            .await
    }

    pub async fn snapshot(&self) -> Result<StateSnapshot> {
        self.request(|response| StateCommand::Snapshot { response })
            .await
    }

    /// Republish every known variable to the host
    pub async fn resync(&self) -> Result<()> {
        self.request(|response| StateCommand::Resync { response })
            .await
    }

    // =========================================================================
    // Lifecycle methods
    // =========================================================================

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(StateCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{ExecuteLevel, Switch};
    use crate::feedback::Comparison;
    use crate::host::testing::RecordingHost;
    use std::sync::Arc;

    fn pb(id: u8) -> PlaybackId {
        PlaybackId::new(id).unwrap()
    }

    #[test]
    fn test_handle_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<StateActorHandle>();
    }

    #[tokio::test]
    async fn test_requests_fail_when_channel_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = StateActorHandle::new(tx);
        assert!(matches!(
            handle.snapshot().await,
            Err(GatewayError::StateActorClosed)
        ));
    }

    #[tokio::test]
    async fn test_optimistic_then_authoritative() {
        let host = Arc::new(RecordingHost::default());
        let state = StateActorHandle::spawn(host.clone());

        let msg = state
            .dispatch(Command::PlaybackLevel { id: pb(3), level: 75 })
            .await
            .unwrap();
        assert_eq!(msg.addr, "/pb/3");
        assert_eq!(msg.args, vec![OscType::Int(75)]);
        assert_eq!(state.playback(pb(3)).await.unwrap().level, 75);

        assert!(state.apply_inbound("/pb/3", &[OscType::Float(0.5)]));
        assert_eq!(state.playback(pb(3)).await.unwrap().level, 50);
        assert_eq!(host.variable("pb3_level"), Some(50.into()));
    }

    #[tokio::test]
    async fn test_execute_adjust_registers_variable_once() {
        let host = Arc::new(RecordingHost::default());
        let state = StateActorHandle::spawn(host.clone());
        let key = ExecKey::new(2, 5);

        state
            .dispatch(Command::Execute { key: key.clone(), level: ExecuteLevel::Adjust(30) })
            .await
            .unwrap();
        assert_eq!(state.execute_level(key.clone()).await.unwrap(), Some(30));

        state
            .dispatch(Command::Execute { key: key.clone(), level: ExecuteLevel::Adjust(30) })
            .await
            .unwrap();
        state.apply_inbound("/exec/2/5", &[OscType::Float(0.1)]);
        assert_eq!(state.execute_level(key).await.unwrap(), Some(10));

        assert_eq!(host.defined_ids(), vec!["exec2_5".to_string()]);
        assert_eq!(host.variable("exec2_5"), Some(10.into()));
    }

    #[tokio::test]
    async fn test_feedback_rechecked_after_every_write() {
        let host = Arc::new(RecordingHost::default());
        let state = StateActorHandle::spawn(host.clone());

        state
            .dispatch(Command::PlaybackFlash { id: pb(1), flash: Switch::Toggle })
            .await
            .unwrap();
        state.apply_inbound("/pb/1/flash", &[OscType::Int(0)]);
        state.apply_inbound("/pb/1/flashx", &[OscType::Int(1)]);
        state.snapshot().await.unwrap();

        assert_eq!(host.feedback_checks(), 2);
        assert!(!state.playback(pb(1)).await.unwrap().flash_active);
    }

    #[tokio::test]
    async fn test_untracked_commands_do_not_notify() {
        let host = Arc::new(RecordingHost::default());
        let state = StateActorHandle::spawn(host.clone());

        state.dispatch(Command::Swap(true)).await.unwrap();
        state.dispatch(Command::PlaybackGo { id: pb(2) }).await.unwrap();

        assert_eq!(host.feedback_checks(), 0);
    }

    #[tokio::test]
    async fn test_untracked_playback_status_ignored() {
        let host = Arc::new(RecordingHost::default());
        let state = StateActorHandle::spawn(host.clone());

        assert!(state.apply_inbound("/pb/42", &[OscType::Float(1.0)]));
        let snapshot = state.snapshot().await.unwrap();
        assert!(snapshot.playbacks.values().all(|p| p.level == 0));
        assert_eq!(host.feedback_checks(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_unknown_execute() {
        let host = Arc::new(RecordingHost::default());
        let state = StateActorHandle::spawn(host);

        let active = state
            .evaluate(FeedbackQuery::ExecuteLevel {
                key: ExecKey::new(3, 77),
                op: Comparison::IsActive,
                value: 0,
            })
            .await
            .unwrap();
        assert!(!active);
        assert_eq!(state.execute_level(ExecKey::new(3, 77)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resync_publishes_everything() {
        let host = Arc::new(RecordingHost::default());
        let state = StateActorHandle::spawn(host.clone());
        state.apply_inbound("/exec/1/9", &[OscType::Float(0.2)]);

        state.resync().await.unwrap();
        assert_eq!(host.variable("pb10_flash"), Some(false.into()));
        assert_eq!(host.variable("dbo"), Some(false.into()));
        assert_eq!(host.variable("exec1_9"), Some(20.into()));
    }

    #[tokio::test]
    async fn test_resync_does_not_redefine_executes() {
        let host = Arc::new(RecordingHost::default());
        let state = StateActorHandle::spawn(host.clone());
        state.apply_inbound("/exec/3/4", &[OscType::Float(0.5)]);

        state.resync().await.unwrap();
        state.resync().await.unwrap();
        assert_eq!(host.defined_ids(), vec!["exec3_4".to_string()]);
        assert_eq!(host.variable("exec3_4"), Some(50.into()));
    }

    #[tokio::test]
    async fn test_oversized_execute_number_tracked() {
        let host = Arc::new(RecordingHost::default());
        let state = StateActorHandle::spawn(host.clone());

        assert!(state.apply_inbound("/exec/1/4294967296", &[OscType::Float(0.6)]));
        assert!(state.apply_inbound("/exec/99999999999/0007", &[OscType::Float(1.0)]));

        let snapshot = state.snapshot().await.unwrap();
        assert_eq!(snapshot.executes["exec1_4294967296"].level, 60);
        assert_eq!(snapshot.executes["exec99999999999_7"].level, 100);
        assert_eq!(
            host.defined_ids(),
            vec!["exec1_4294967296".to_string(), "exec99999999999_7".to_string()]
        );
        assert_eq!(host.variable("exec1_4294967296"), Some(60.into()));
    }

    #[tokio::test]
    async fn test_shutdown_stops_actor() {
        let host = Arc::new(RecordingHost::default());
        let state = StateActorHandle::spawn(host);
        state.shutdown();
        assert!(state.snapshot().await.is_err());
    }
}
