//! StateStore - canonical known values for playbacks, executes and blackout
//!
//! Plain owned container with no interior locking. The StateActor is its only
//! owner at runtime, which serializes every read and write.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use super::types::{
    ApplyOutcome, ExecKey, ExecuteState, Origin, PlaybackId, PlaybackState, StateKey, StateUpdate,
    PLAYBACK_COUNT,
};

/// Value read back from the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateValue {
    Level(u8),
    Flag(bool),
}

impl From<StateValue> for serde_json::Value {
    fn from(value: StateValue) -> Self {
        match value {
            StateValue::Level(level) => level.into(),
            StateValue::Flag(flag) => flag.into(),
        }
    }
}

/// Serializable copy of the whole store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub playbacks: BTreeMap<u8, PlaybackState>,
    pub executes: BTreeMap<String, ExecuteState>,
    pub blackout: bool,
}

/// Owned state for one console
#[derive(Debug, Clone)]
pub struct StateStore {
    playbacks: [PlaybackState; PLAYBACK_COUNT as usize],
    executes: BTreeMap<ExecKey, ExecuteState>,
    blackout: bool,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            playbacks: [PlaybackState::default(); PLAYBACK_COUNT as usize],
            executes: BTreeMap::new(),
            blackout: false,
        }
    }

    fn slot(id: PlaybackId) -> usize {
        (id.get() - 1) as usize
    }

    /// Current state of a playback
    pub fn playback(&self, id: PlaybackId) -> PlaybackState {
        self.playbacks[Self::slot(id)]
    }

    /// Execute state, or None if the key was never written
    pub fn execute(&self, key: &ExecKey) -> Option<ExecuteState> {
        self.executes.get(key).copied()
    }

    /// Execute level, treating unknown keys as 0
    pub fn execute_level(&self, key: &ExecKey) -> u8 {
        self.execute(key).map(|e| e.level).unwrap_or(0)
    }

    pub fn blackout(&self) -> bool {
        self.blackout
    }

    /// Point read with documented defaults (0 / false)
    pub fn get(&self, key: &StateKey) -> StateValue {
        match key {
            StateKey::PlaybackLevel(id) => StateValue::Level(self.playback(*id).level),
            StateKey::PlaybackFlash(id) => StateValue::Flag(self.playback(*id).flash_active),
            StateKey::Execute(exec) => StateValue::Level(self.execute_level(exec)),
            StateKey::Blackout => StateValue::Flag(self.blackout),
        }
    }

    /// Write right after sending a command
    pub fn optimistic_set(&mut self, update: StateUpdate) -> ApplyOutcome {
        self.apply(update, Origin::Optimistic)
    }

    /// Write reported by the console; always overwrites
    pub fn authoritative_set(&mut self, update: StateUpdate) -> ApplyOutcome {
        self.apply(update, Origin::Authoritative)
    }

    /// Apply one update, clamping levels into 0..=100
    pub fn apply(&mut self, update: StateUpdate, origin: Origin) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        trace!(?update, %origin, "Applying state");

        match update {
            StateUpdate::PlaybackLevel { id, level } => {
                let slot = &mut self.playbacks[Self::slot(id)];
                let level = level.min(100);
                outcome.changed = slot.level != level;
                slot.level = level;
            }
            StateUpdate::PlaybackFlash { id, active } => {
                let slot = &mut self.playbacks[Self::slot(id)];
                outcome.changed = slot.flash_active != active;
                slot.flash_active = active;
            }
            StateUpdate::ExecuteLevel { key, level } => {
                let level = level.min(100);
                match self.executes.get_mut(&key) {
                    Some(entry) => {
                        outcome.changed = entry.level != level;
                        entry.level = level;
                        entry.origin = origin;
                    }
                    None => {
                        debug!(page = %key.page, nr = %key.nr, %origin, "New execute tracked");
                        self.executes.insert(key.clone(), ExecuteState { level, origin });
                        outcome.changed = true;
                        outcome.created = Some(key);
                    }
                }
            }
            StateUpdate::Blackout(active) => {
                outcome.changed = self.blackout != active;
                self.blackout = active;
            }
        }

        trace!(changed = outcome.changed, "State applied");
        outcome
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            playbacks: PlaybackId::all()
                .map(|id| (id.get(), self.playback(id)))
                .collect(),
            executes: self
                .executes
                .iter()
                .map(|(key, state)| (key.variable_id(), *state))
                .collect(),
            blackout: self.blackout,
        }
    }

    /// Every (variable id, value) pair currently known, for a full host refresh
    pub fn variable_values(&self) -> Vec<(String, serde_json::Value)> {
        let mut values = Vec::with_capacity(PLAYBACK_COUNT as usize * 2 + 1 + self.executes.len());
        for id in PlaybackId::all() {
            let pb = self.playback(id);
            values.push((StateKey::PlaybackLevel(id).variable_id(), pb.level.into()));
            values.push((StateKey::PlaybackFlash(id).variable_id(), pb.flash_active.into()));
        }
        values.push((StateKey::Blackout.variable_id(), self.blackout.into()));
        for (key, state) in &self.executes {
            values.push((key.variable_id(), state.level.into()));
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pb(id: u8) -> PlaybackId {
        PlaybackId::new(id).unwrap()
    }

    #[test]
    fn test_defaults() {
        let store = StateStore::new();
        assert_eq!(store.get(&StateKey::PlaybackLevel(pb(1))), StateValue::Level(0));
        assert_eq!(store.get(&StateKey::PlaybackFlash(pb(10))), StateValue::Flag(false));
        assert_eq!(store.get(&StateKey::Execute(ExecKey::new(4, 99))), StateValue::Level(0));
        assert!(store.execute(&ExecKey::new(4, 99)).is_none());
        assert!(!store.blackout());
    }

    #[test]
    fn test_authoritative_overwrites_optimistic() {
        let mut store = StateStore::new();
        store.optimistic_set(StateUpdate::PlaybackLevel { id: pb(3), level: 75 });
        assert_eq!(store.playback(pb(3)).level, 75);

        let outcome = store.authoritative_set(StateUpdate::PlaybackLevel { id: pb(3), level: 50 });
        assert!(outcome.changed);
        assert_eq!(store.playback(pb(3)).level, 50);
    }

    #[test]
    fn test_level_clamped_on_write() {
        let mut store = StateStore::new();
        store.optimistic_set(StateUpdate::PlaybackLevel { id: pb(2), level: 250 });
        assert_eq!(store.playback(pb(2)).level, 100);

        let key = ExecKey::new(1, 1);
        store.authoritative_set(StateUpdate::ExecuteLevel { key: key.clone(), level: 180 });
        assert_eq!(store.execute_level(&key), 100);
    }

    #[test]
    fn test_execute_created_once() {
        let mut store = StateStore::new();
        let key = ExecKey::new(2, 5);

        let first = store.optimistic_set(StateUpdate::ExecuteLevel { key: key.clone(), level: 30 });
        assert_eq!(first.created, Some(key.clone()));

        let second = store.authoritative_set(StateUpdate::ExecuteLevel { key: key.clone(), level: 40 });
        assert_eq!(second.created, None);
        assert!(second.changed);
        assert_eq!(store.execute(&key).map(|e| e.origin), Some(Origin::Authoritative));

        let third = store.authoritative_set(StateUpdate::ExecuteLevel { key, level: 40 });
        assert!(!third.changed);
        assert_eq!(store.snapshot().executes.len(), 1);
    }

    #[test]
    fn test_zero_level_write_still_creates_execute() {
        let mut store = StateStore::new();
        let key = ExecKey::new(7, 1200);
        let outcome = store.authoritative_set(StateUpdate::ExecuteLevel { key: key.clone(), level: 0 });
        assert_eq!(outcome.created, Some(key.clone()));
        assert!(store.execute(&key).is_some());
    }

    #[test]
    fn test_snapshot_and_variables() {
        let mut store = StateStore::new();
        store.optimistic_set(StateUpdate::PlaybackFlash { id: pb(4), active: true });
        store.optimistic_set(StateUpdate::Blackout(true));
        store.optimistic_set(StateUpdate::ExecuteLevel { key: ExecKey::new(2, 5), level: 30 });

        let snapshot = store.snapshot();
        assert_eq!(snapshot.playbacks.len(), 10);
        assert!(snapshot.playbacks[&4].flash_active);
        assert_eq!(snapshot.executes["exec2_5"].level, 30);
        assert!(snapshot.blackout);

        let values = store.variable_values();
        assert_eq!(values.len(), 22);
        assert!(values.contains(&("pb4_flash".to_string(), true.into())));
        assert!(values.contains(&("exec2_5".to_string(), 30.into())));
    }
}
