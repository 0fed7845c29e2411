//! Command encoder - semantic console requests to OSC address/argument pairs
//!
//! Pure functions: the store is only read here. The optimistic write that
//! follows a tracked command is returned alongside the message and applied by
//! the StateActor in the same turn.

use once_cell::sync::Lazy;
use regex::Regex;
use rosc::{OscMessage, OscType};

use crate::state::{clamp_percent, ExecKey, PlaybackId, StateStore, StateUpdate};

static CUE_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?$").expect("invariant: cue pattern compiles"));

/// Explicit value or flip of the currently known value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    Set(bool),
    Toggle,
}

impl Switch {
    pub fn resolve(self, current: bool) -> bool {
        match self {
            Switch::Set(on) => on,
            Switch::Toggle => !current,
        }
    }
}

/// Requested execute level change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteLevel {
    /// Absolute percent; 0 releases the execute
    Set(u8),
    /// Relative percent change from the known level
    Adjust(i32),
    /// Full on if currently at 0, otherwise release
    Toggle,
}

/// Cue number appended verbatim to a jump address (`12` or `4.5`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueNumber(String);

impl CueNumber {
    /// Accepts integer or decimal literals, surrounding whitespace ignored
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        CUE_LITERAL
            .is_match(trimmed)
            .then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A validated console request
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PlaybackLevel { id: PlaybackId, level: u8 },
    PlaybackAdjust { id: PlaybackId, delta: i32 },
    PlaybackGo { id: PlaybackId },
    PlaybackFlash { id: PlaybackId, flash: Switch },
    PlaybackPause { id: PlaybackId },
    PlaybackRelease { id: PlaybackId },
    PlaybackJump { id: PlaybackId, cue: CueNumber },
    Execute { key: ExecKey, level: ExecuteLevel },
    Blackout(Switch),
    Swap(bool),
    /// 10-scene recall; level in percent, sent as a fraction
    TenScene { item: u32, zone: u32, level: u8 },
    /// Opaque command line forwarded to `/rpc`
    Rpc(String),
}

impl Command {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Command::PlaybackLevel { .. } => "pb",
            Command::PlaybackAdjust { .. } => "pbAdjust",
            Command::PlaybackGo { .. } => "pbGo",
            Command::PlaybackFlash { .. } => "pbFlash",
            Command::PlaybackPause { .. } => "pbPause",
            Command::PlaybackRelease { .. } => "pbRelease",
            Command::PlaybackJump { .. } => "pbJump",
            Command::Execute { level: ExecuteLevel::Set(_), .. } => "execute",
            Command::Execute { level: ExecuteLevel::Adjust(_), .. } => "executeAdjust",
            Command::Execute { level: ExecuteLevel::Toggle, .. } => "executeToggle",
            Command::Blackout(_) => "dbo",
            Command::Swap(_) => "swap",
            Command::TenScene { .. } => "tenScene",
            Command::Rpc(_) => "rpc",
        }
    }
}

/// Outbound message plus the optimistic write it implies
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub message: OscMessage,
    pub update: Option<StateUpdate>,
}

fn message(addr: String, args: Vec<OscType>) -> OscMessage {
    OscMessage { addr, args }
}

fn percent_to_fraction(percent: u8) -> f32 {
    percent as f32 / 100.0
}

/// Encode a command against the current store
///
/// Every value is clamped before encoding and the clamped value is the one
/// returned for the optimistic update.
pub fn encode(command: &Command, store: &StateStore) -> Encoded {
    match command {
        Command::PlaybackLevel { id, level } => {
            let level = (*level).min(100);
            Encoded {
                message: message(format!("/pb/{}", id), vec![OscType::Int(level as i32)]),
                update: Some(StateUpdate::PlaybackLevel { id: *id, level }),
            }
        }
        Command::PlaybackAdjust { id, delta } => {
            let current = store.playback(*id).level as i64;
            let level = clamp_percent(current + *delta as i64);
            Encoded {
                message: message(format!("/pb/{}", id), vec![OscType::Int(level as i32)]),
                update: Some(StateUpdate::PlaybackLevel { id: *id, level }),
            }
        }
        Command::PlaybackGo { id } => untracked(format!("/pb/{}/go", id), vec![]),
        Command::PlaybackFlash { id, flash } => {
            let active = flash.resolve(store.playback(*id).flash_active);
            Encoded {
                message: message(format!("/pb/{}/flash", id), vec![OscType::Int(active as i32)]),
                update: Some(StateUpdate::PlaybackFlash { id: *id, active }),
            }
        }
        Command::PlaybackPause { id } => untracked(format!("/pb/{}/pause", id), vec![]),
        Command::PlaybackRelease { id } => untracked(format!("/pb/{}/release", id), vec![]),
        Command::PlaybackJump { id, cue } => {
            untracked(format!("/pb/{}/{}", id, cue.as_str()), vec![])
        }
        Command::Execute { key, level } => {
            let current = store.execute_level(key);
            let level = match *level {
                ExecuteLevel::Set(level) => level.min(100),
                ExecuteLevel::Adjust(delta) => clamp_percent(current as i64 + delta as i64),
                ExecuteLevel::Toggle => {
                    if current > 0 {
                        0
                    } else {
                        100
                    }
                }
            };
            Encoded {
                message: message(
                    format!("/exec/{}/{}", key.page, key.nr),
                    vec![OscType::Float(percent_to_fraction(level))],
                ),
                update: Some(StateUpdate::ExecuteLevel { key: key.clone(), level }),
            }
        }
        Command::Blackout(switch) => {
            let active = switch.resolve(store.blackout());
            Encoded {
                message: message("/dbo".to_string(), vec![OscType::Int(active as i32)]),
                update: Some(StateUpdate::Blackout(active)),
            }
        }
        Command::Swap(on) => untracked("/swap".to_string(), vec![OscType::Int(*on as i32)]),
        Command::TenScene { item, zone, level } => untracked(
            format!("/10scene/{}/{}", item, zone),
            vec![OscType::Float(percent_to_fraction((*level).min(100)))],
        ),
        Command::Rpc(text) => untracked("/rpc".to_string(), vec![OscType::String(text.clone())]),
    }
}

fn untracked(addr: String, args: Vec<OscType>) -> Encoded {
    Encoded {
        message: message(addr, args),
        update: None,
    }
}
