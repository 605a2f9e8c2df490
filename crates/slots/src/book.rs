/// In-memory slot bookkeeping shared by the server store and client views.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CalendarId, SlotAction, SlotKey, TimezoneOffset};

/// Slot key -> nicknames present, in insertion order.
pub type SlotMap = BTreeMap<SlotKey, Vec<String>>;

/// Applies one add/remove to a map, keeping "key present iff non-empty".
/// Returns whether the map changed.
pub fn apply_mutation(map: &mut SlotMap, key: SlotKey, nickname: &str, action: SlotAction) -> bool {
    match action {
        SlotAction::Add => {
            let names = map.entry(key).or_default();
            if names.iter().any(|n| n == nickname) {
                return false;
            }
            names.push(nickname.to_string());
            true
        }
        SlotAction::Remove => {
            let Some(names) = map.get_mut(&key) else {
                return false;
            };
            let before = names.len();
            names.retain(|n| n != nickname);
            let changed = names.len() != before;
            if names.is_empty() {
                map.remove(&key);
            }
            changed
        }
    }
}

/// Whether `nickname` is marked present at `key`.
pub fn is_present(map: &SlotMap, key: &SlotKey, nickname: &str) -> bool {
    map.get(key).is_some_and(|names| names.iter().any(|n| n == nickname))
}

/// Every calendar's canonical slots plus per-calendar timezones.
///
/// This is also the persisted document: `{ "slots": .., "timezones": .. }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotBook {
    #[serde(default)]
    pub slots: BTreeMap<CalendarId, SlotMap>,
    #[serde(default)]
    pub timezones: BTreeMap<CalendarId, TimezoneOffset>,
}

impl SlotBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_all(&self, calendar: &CalendarId) -> SlotMap {
        self.slots.get(calendar).cloned().unwrap_or_default()
    }

    /// Applies a mutation and returns the calendar's resulting map.
    pub fn mutate(
        &mut self,
        calendar: &CalendarId,
        key: SlotKey,
        nickname: &str,
        action: SlotAction,
    ) -> SlotMap {
        let map = self.slots.entry(calendar.clone()).or_default();
        apply_mutation(map, key, nickname, action);
        map.clone()
    }

    pub fn timezone(&self, calendar: &CalendarId) -> Option<TimezoneOffset> {
        self.timezones.get(calendar).copied()
    }

    pub fn set_timezone(&mut self, calendar: &CalendarId, offset: TimezoneOffset) {
        self.timezones.insert(calendar.clone(), offset);
    }

    /// Drops slot data for every calendar. Timezones are kept.
    pub fn clear_all(&mut self) {
        self.slots.clear();
    }

    /// Removes empty slot sets and duplicate nicknames, e.g. after loading a
    /// hand-edited snapshot.
    pub fn normalize(&mut self) {
        for map in self.slots.values_mut() {
            for names in map.values_mut() {
                let mut seen = Vec::with_capacity(names.len());
                names.retain(|n| {
                    if seen.contains(n) {
                        false
                    } else {
                        seen.push(n.clone());
                        true
                    }
                });
            }
            map.retain(|_, names| !names.is_empty());
        }
    }

    pub fn calendar_count(&self) -> usize {
        self.slots.len()
    }
}
