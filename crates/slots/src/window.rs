/// The visible grid: a run of local dates by the hourly rows, plus the
/// per-cell views a viewer needs (own/other occupancy, nickname filter).
use chrono::{NaiveDate, TimeDelta};
use std::collections::BTreeSet;

use crate::{GridError, Result, SlotKey, SlotMap, SlotTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridWindow {
    pub start: NaiveDate,
    pub days: u32,
}

impl GridWindow {
    pub const DEFAULT_DAYS: u32 = 21;

    pub fn new(start: NaiveDate, days: u32) -> Self {
        Self { start, days }
    }

    /// Window starting at the machine's local "today".
    pub fn from_today() -> Self {
        Self::new(chrono::Local::now().date_naive(), Self::DEFAULT_DAYS)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.days).filter_map(move |offset| {
            self.start
                .checked_add_signed(TimeDelta::days(i64::from(offset)))
        })
    }

    /// Cells column by column: every hour of the first date, then the next.
    pub fn cells(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.dates()
            .flat_map(|date| SlotTime::grid_hours().map(move |time| SlotKey::new(date, time)))
    }

    pub fn contains(&self, key: &SlotKey) -> bool {
        key.time.is_grid_hour() && self.dates().any(|d| d == key.date)
    }

    /// Rejects keys the grid cannot show, such as a local 05:00.
    pub fn check(&self, key: &SlotKey) -> Result<()> {
        if !key.time.is_grid_hour() {
            return Err(GridError::Validation(format!(
                "{} is outside the grid hours {:02}:00-{:02}:00",
                key.time,
                SlotTime::FIRST_GRID_HOUR,
                SlotTime::LAST_GRID_HOUR
            )));
        }
        Ok(())
    }
}

impl Default for GridWindow {
    fn default() -> Self {
        Self::from_today()
    }
}

/// How a cell looks to one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    /// The viewer is among the nicknames.
    Mine,
    /// Only other participants.
    Others,
}

pub fn cell_state(map: &SlotMap, key: &SlotKey, viewer: &str) -> CellState {
    match map.get(key) {
        None => CellState::Empty,
        Some(names) if names.is_empty() => CellState::Empty,
        Some(names) if names.iter().any(|n| n == viewer) => CellState::Mine,
        Some(_) => CellState::Others,
    }
}

/// Distinct nicknames across the map, sorted.
pub fn all_nicknames(map: &SlotMap) -> Vec<String> {
    map.values()
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// A cell is highlighted when a filter is active and every filtered
/// nickname is present in it.
pub fn matches_filter(map: &SlotMap, key: &SlotKey, filter: &[String]) -> bool {
    if filter.is_empty() {
        return false;
    }
    let Some(names) = map.get(key) else {
        return false;
    };
    filter.iter().all(|wanted| names.contains(wanted))
}
