//! Command enum for the state actor
//!
//! Writes that nobody waits on are fire-and-forget; everything else carries a
//! oneshot channel for the reply.

use rosc::OscMessage;
use tokio::sync::oneshot;

use super::store::StateSnapshot;
use super::types::{ExecKey, PlaybackId, PlaybackState};
use crate::decoder::StatusMessage;
use crate::encoder::Command;
use crate::feedback::FeedbackQuery;

/// Commands for the StateActor
///
/// # Hot Path Commands
///
/// - `ApplyStatus`: authoritative write decoded from the console
///
/// # Request-Response Commands
///
/// - `Dispatch`: resolve, clamp and encode a request, then apply its optimistic write
/// - `Evaluate`: run a feedback query
/// - `GetPlayback` / `GetExecute`: point reads
/// - `Snapshot`: copy of the whole store
/// - `Resync`: republish every variable to the host
#[derive(Debug)]
pub enum StateCommand {
    // -------------------------------------------------------------------------
    // Hot path commands (no response - fire and forget)
    // -------------------------------------------------------------------------
    /// Status report decoded from an inbound message
    ApplyStatus { message: StatusMessage },

    // -------------------------------------------------------------------------
    // Request-response commands (require oneshot channel)
    // -------------------------------------------------------------------------
    /// Encode a command against current state and apply its optimistic write
    Dispatch {
        command: Command,
        response: oneshot::Sender<OscMessage>,
    },

    /// Evaluate a feedback query
    Evaluate {
        query: FeedbackQuery,
        response: oneshot::Sender<bool>,
    },

    GetPlayback {
        id: PlaybackId,
        response: oneshot::Sender<PlaybackState>,
    },

    /// Execute level, None if never referenced
    GetExecute {
        key: ExecKey,
        response: oneshot::Sender<Option<u8>>,
    },

    Snapshot {
        response: oneshot::Sender<StateSnapshot>,
    },

    /// Republish every known variable and request a feedback re-check
    Resync { response: oneshot::Sender<()> },

    // -------------------------------------------------------------------------
    // Lifecycle commands
    // -------------------------------------------------------------------------
    /// Stop the actor
    Shutdown,
}
