//! Feedback evaluation for button coloring
//!
//! Stateless: every query is a pure function of the StateStore.

use serde::Serialize;
use std::str::FromStr;

use crate::state::{ExecKey, PlaybackId, StateStore};

/// Comparison applied to an integer percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparison {
    /// Value above zero; the comparison value is ignored
    IsActive,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl Comparison {
    pub const ALL: [Comparison; 7] = [
        Comparison::IsActive,
        Comparison::Equal,
        Comparison::NotEqual,
        Comparison::Greater,
        Comparison::GreaterEqual,
        Comparison::Less,
        Comparison::LessEqual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::IsActive => "isActive",
            Comparison::Equal => "equal",
            Comparison::NotEqual => "notEqual",
            Comparison::Greater => "greater",
            Comparison::GreaterEqual => "greaterEqual",
            Comparison::Less => "less",
            Comparison::LessEqual => "lessEqual",
        }
    }

    pub fn evaluate(&self, actual: u8, expected: u8) -> bool {
        match self {
            Comparison::IsActive => actual > 0,
            Comparison::Equal => actual == expected,
            Comparison::NotEqual => actual != expected,
            Comparison::Greater => actual > expected,
            Comparison::GreaterEqual => actual >= expected,
            Comparison::Less => actual < expected,
            Comparison::LessEqual => actual <= expected,
        }
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Comparison::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown comparison '{}'", s))
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feedback query from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackQuery {
    PlaybackLevel { id: PlaybackId, op: Comparison, value: u8 },
    /// True when the flash flag equals `flashing`
    PlaybackFlash { id: PlaybackId, flashing: bool },
    ExecuteLevel { key: ExecKey, op: Comparison, value: u8 },
    Blackout { active: bool },
}

/// Evaluate a query; unknown execute keys read as 0
pub fn evaluate(store: &StateStore, query: &FeedbackQuery) -> bool {
    match query {
        FeedbackQuery::PlaybackLevel { id, op, value } => {
            op.evaluate(store.playback(*id).level, *value)
        }
        FeedbackQuery::PlaybackFlash { id, flashing } => {
            store.playback(*id).flash_active == *flashing
        }
        FeedbackQuery::ExecuteLevel { key, op, value } => {
            op.evaluate(store.execute_level(key), *value)
        }
        FeedbackQuery::Blackout { active } => store.blackout() == *active,
    }
}
