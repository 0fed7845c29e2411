//! Console state type definitions
//!
//! Defines the keys, values and update records tracked by the StateStore.

use serde::{Deserialize, Serialize};

/// Number of playbacks exposed to the button panel (ids 1..=10)
pub const PLAYBACK_COUNT: u8 = 10;

/// Highest execute page reachable from outbound requests
pub const MAX_EXEC_PAGE: u32 = 10;

/// Playback fader index, always within 1..=PLAYBACK_COUNT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct PlaybackId(u8);

impl PlaybackId {
    /// Build an id, rejecting values outside 1..=10
    pub fn new(id: u8) -> Option<Self> {
        if (1..=PLAYBACK_COUNT).contains(&id) {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Build an id from any integer, clamping into 1..=10
    pub fn clamped(raw: i64) -> Self {
        Self(raw.clamp(1, PLAYBACK_COUNT as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All playbacks in ascending order
    pub fn all() -> impl Iterator<Item = PlaybackId> {
        (1..=PLAYBACK_COUNT).map(PlaybackId)
    }
}

impl From<PlaybackId> for u8 {
    fn from(id: PlaybackId) -> u8 {
        id.0
    }
}

impl TryFrom<u8> for PlaybackId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PlaybackId::new(value).ok_or_else(|| format!("playback id {} outside 1..={}", value, PLAYBACK_COUNT))
    }
}

impl std::fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Page or execute number as reported by the console
///
/// Stored as a digit string without leading zeros so that any length the
/// console sends keys the same entry. Orders numerically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ExecIndex(String);

impl ExecIndex {
    /// Parse an ASCII digit string of any length; anything else is rejected
    pub fn parse(digits: &str) -> Option<Self> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let trimmed = digits.trim_start_matches('0');
        Some(Self(if trimmed.is_empty() { "0" } else { trimmed }.to_string()))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == "0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u32> for ExecIndex {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl Ord for ExecIndex {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for ExecIndex {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ExecIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of an execute element: (page, number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ExecKey {
    pub page: ExecIndex,
    pub nr: ExecIndex,
}

impl ExecKey {
    pub fn new(page: u32, nr: u32) -> Self {
        Self {
            page: page.into(),
            nr: nr.into(),
        }
    }

    /// Key from inbound digit strings, exact for any length
    pub fn parse(page: &str, nr: &str) -> Option<Self> {
        Some(Self {
            page: ExecIndex::parse(page)?,
            nr: ExecIndex::parse(nr)?,
        })
    }

    /// Key for an outbound request: page clamped to 1..=10, number to >= 1
    pub fn clamped(page: i64, nr: i64) -> Self {
        Self::new(
            page.clamp(1, MAX_EXEC_PAGE as i64) as u32,
            nr.clamp(1, u32::MAX as i64) as u32,
        )
    }

    /// Display variable id for this execute (e.g. `exec2_5`)
    pub fn variable_id(&self) -> String {
        format!("exec{}_{}", self.page, self.nr)
    }
}

impl std::fmt::Display for ExecKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.page, self.nr)
    }
}

/// Source of a state write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Written right after sending a command (the console never acknowledges)
    Optimistic,
    /// Reported by the console; always overwrites
    Authoritative,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Optimistic => write!(f, "optimistic"),
            Origin::Authoritative => write!(f, "authoritative"),
        }
    }
}

/// Known state of one playback fader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Fader level in percent (0..=100)
    pub level: u8,
    pub flash_active: bool,
}

/// Known state of one execute element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteState {
    /// Level in percent (0..=100)
    pub level: u8,
    pub origin: Origin,
}

/// Addressable piece of tracked state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateKey {
    PlaybackLevel(PlaybackId),
    PlaybackFlash(PlaybackId),
    Execute(ExecKey),
    Blackout,
}

impl StateKey {
    /// Display variable id bound to this key
    pub fn variable_id(&self) -> String {
        match self {
            StateKey::PlaybackLevel(id) => format!("pb{}_level", id),
            StateKey::PlaybackFlash(id) => format!("pb{}_flash", id),
            StateKey::Execute(key) => key.variable_id(),
            StateKey::Blackout => "dbo".to_string(),
        }
    }
}

/// A single write to the StateStore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdate {
    PlaybackLevel { id: PlaybackId, level: u8 },
    PlaybackFlash { id: PlaybackId, active: bool },
    ExecuteLevel { key: ExecKey, level: u8 },
    Blackout(bool),
}

impl StateUpdate {
    pub fn key(&self) -> StateKey {
        match self {
            StateUpdate::PlaybackLevel { id, .. } => StateKey::PlaybackLevel(*id),
            StateUpdate::PlaybackFlash { id, .. } => StateKey::PlaybackFlash(*id),
            StateUpdate::ExecuteLevel { key, .. } => StateKey::Execute(key.clone()),
            StateUpdate::Blackout(_) => StateKey::Blackout,
        }
    }
}

/// Result of applying a StateUpdate
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    /// The stored value differs from what it was before
    pub changed: bool,
    /// Set the first time an execute key is written
    pub created: Option<ExecKey>,
}

/// Clamp any integer into a percent
pub fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

/// Convert an inbound wire fraction (0.0..=1.0) to a rounded, clamped percent
///
/// Returns None for NaN or infinite input.
pub fn fraction_to_percent(fraction: f64) -> Option<u8> {
    if !fraction.is_finite() {
        return None;
    }
    let percent = (fraction * 100.0).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}
