//! Status decoder - inbound console addresses to state updates
//!
//! Grammars live in a single ordered table. Adding a trackable address means
//! adding a row, nothing else.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rosc::OscType;

use crate::state::{fraction_to_percent, ExecKey, PlaybackId, StateUpdate};

/// Decoded status report from the console
///
/// Playback ids are kept as reported: the console may mention playbacks the
/// button panel never exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    PlaybackLevel { id: u32, level: u8 },
    PlaybackFlash { id: u32, active: bool },
    ExecuteLevel { key: ExecKey, level: u8 },
}

impl StatusMessage {
    /// The store write for this report, or None when it targets an untracked playback
    pub fn to_update(&self) -> Option<StateUpdate> {
        match self {
            StatusMessage::PlaybackLevel { id, level } => {
                let id = PlaybackId::new(u8::try_from(*id).ok()?)?;
                Some(StateUpdate::PlaybackLevel { id, level: *level })
            }
            StatusMessage::PlaybackFlash { id, active } => {
                let id = PlaybackId::new(u8::try_from(*id).ok()?)?;
                Some(StateUpdate::PlaybackFlash { id, active: *active })
            }
            StatusMessage::ExecuteLevel { key, level } => Some(StateUpdate::ExecuteLevel {
                key: key.clone(),
                level: *level,
            }),
        }
    }
}

type Extractor = fn(&Captures<'_>, &OscType) -> Option<StatusMessage>;

/// One row of the status grammar table
struct StatusGrammar {
    name: &'static str,
    pattern: &'static str,
    extract: Extractor,
}

/// Evaluated top to bottom; first match wins
const STATUS_GRAMMARS: &[StatusGrammar] = &[
    StatusGrammar {
        name: "playback-level",
        pattern: r"^/pb/([0-9]+)$",
        extract: extract_playback_level,
    },
    StatusGrammar {
        name: "playback-flash",
        pattern: r"^/pb/([0-9]+)/flash$",
        extract: extract_playback_flash,
    },
    StatusGrammar {
        name: "execute-level",
        pattern: r"^/exec/([0-9]+)/([0-9]+)$",
        extract: extract_execute_level,
    },
];

static COMPILED: Lazy<Vec<(Regex, &'static StatusGrammar)>> = Lazy::new(|| {
    STATUS_GRAMMARS
        .iter()
        .map(|g| {
            let re = Regex::new(g.pattern).expect("invariant: status grammar compiles");
            (re, g)
        })
        .collect()
});

/// Playback id; ids past u32 saturate and are never tracked
fn capture_playback(caps: &Captures<'_>, index: usize) -> Option<u32> {
    let digits = caps.get(index)?.as_str();
    Some(digits.parse().unwrap_or(u32::MAX))
}

fn capture_exec_key(caps: &Captures<'_>) -> Option<ExecKey> {
    ExecKey::parse(caps.get(1)?.as_str(), caps.get(2)?.as_str())
}

/// Numeric view of an OSC argument; strings and blobs are not numbers
fn numeric_arg(arg: &OscType) -> Option<f64> {
    match arg {
        OscType::Int(v) => Some(*v as f64),
        OscType::Float(v) => Some(*v as f64),
        OscType::Long(v) => Some(*v as f64),
        OscType::Double(v) => Some(*v),
        OscType::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn extract_playback_level(caps: &Captures<'_>, arg: &OscType) -> Option<StatusMessage> {
    Some(StatusMessage::PlaybackLevel {
        id: capture_playback(caps, 1)?,
        level: fraction_to_percent(numeric_arg(arg)?)?,
    })
}

fn extract_playback_flash(caps: &Captures<'_>, arg: &OscType) -> Option<StatusMessage> {
    Some(StatusMessage::PlaybackFlash {
        id: capture_playback(caps, 1)?,
        active: numeric_arg(arg)? != 0.0,
    })
}

fn extract_execute_level(caps: &Captures<'_>, arg: &OscType) -> Option<StatusMessage> {
    Some(StatusMessage::ExecuteLevel {
        key: capture_exec_key(caps)?,
        level: fraction_to_percent(numeric_arg(arg)?)?,
    })
}

/// Name of the grammar an address matches, ignoring arguments
pub fn classify(address: &str) -> Option<&'static str> {
    COMPILED
        .iter()
        .find(|(re, _)| re.is_match(address))
        .map(|(_, g)| g.name)
}

/// Decode an inbound message; None means "not tracked, ignore"
pub fn decode(address: &str, args: &[OscType]) -> Option<StatusMessage> {
    let arg = args.first()?;
    COMPILED.iter().find_map(|(re, grammar)| {
        let caps = re.captures(address)?;
        (grammar.extract)(&caps, arg)
    })
}
