use slots::{
    all_nicknames, apply_mutation, cell_state, is_present, matches_filter, CellState, SlotAction,
    SlotKey, SlotMap,
};

/// What one viewer currently sees, keyed by local slot keys.
///
/// `revision` bumps on every local edit so that a poll which started before
/// the edit can tell its data is stale.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    slots: SlotMap,
    revision: u64,
    loaded: bool,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> &SlotMap {
        &self.slots
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// False until the first authoritative state arrives.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn nicknames(&self, key: &SlotKey) -> &[String] {
        self.slots.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_mine(&self, key: &SlotKey, nickname: &str) -> bool {
        is_present(&self.slots, key, nickname)
    }

    pub fn cell(&self, key: &SlotKey, nickname: &str) -> CellState {
        cell_state(&self.slots, key, nickname)
    }

    pub fn all_nicknames(&self) -> Vec<String> {
        all_nicknames(&self.slots)
    }

    pub fn is_highlighted(&self, key: &SlotKey, filter: &[String]) -> bool {
        matches_filter(&self.slots, key, filter)
    }

    /// Optimistic local edit.
    pub fn apply_local(&mut self, key: SlotKey, nickname: &str, action: SlotAction) -> bool {
        let changed = apply_mutation(&mut self.slots, key, nickname, action);
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Replaces the view wholesale with authoritative (already localized)
    /// state.
    pub fn replace(&mut self, slots: SlotMap) {
        self.slots = slots;
        self.loaded = true;
        self.revision += 1;
    }

    /// Replaces the view only if nothing changed locally since `revision`
    /// was read. Returns whether the state was applied.
    pub fn replace_if_unchanged(&mut self, revision: u64, slots: SlotMap) -> bool {
        if self.revision != revision {
            return false;
        }
        self.replace(slots);
        true
    }
}
