//! State management module - known console state
//!
//! Tracks playback fader levels, playback flash flags, paged execute levels and
//! desk blackout. All access is serialized through the StateActor; writes are
//! either optimistic (right after a send) or authoritative (console status).

mod actor;
mod actor_handle;
mod commands;
mod store;
mod types;

pub use actor::StateActor;
pub use actor_handle::StateActorHandle;
pub use store::{StateSnapshot, StateStore, StateValue};
pub use types::{
    clamp_percent, fraction_to_percent, ApplyOutcome, ExecIndex, ExecKey, ExecuteState, Origin, PlaybackId,
    PlaybackState, StateKey, StateUpdate, MAX_EXEC_PAGE, PLAYBACK_COUNT,
};
