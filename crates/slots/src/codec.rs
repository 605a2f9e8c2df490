/// Local <-> UTC slot key conversion using a flat whole-hour offset.
/// No timezone database or DST rules are involved.
use chrono::TimeDelta;
use tracing::warn;

use crate::{GridError, Result, SlotKey, SlotMap, TimezoneOffset};

/// Converts a local `(date, time)` at `offset` into its canonical UTC key.
pub fn to_canonical(local: SlotKey, offset: TimezoneOffset) -> Result<SlotKey> {
    shift(local, -i64::from(offset.hours()))
}

/// Converts a canonical UTC key into the local key seen at `offset`.
pub fn to_local(canonical: SlotKey, offset: TimezoneOffset) -> Result<SlotKey> {
    shift(canonical, i64::from(offset.hours()))
}

fn shift(key: SlotKey, hours: i64) -> Result<SlotKey> {
    let moved = key
        .naive()
        .checked_add_signed(TimeDelta::hours(hours))
        .ok_or_else(|| GridError::Validation(format!("slot {} out of range", key)))?;
    SlotKey::from_naive(moved)
}

/// Codec bound to one viewer's offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimezoneCodec {
    pub offset: TimezoneOffset,
}

impl TimezoneCodec {
    pub fn new(offset: TimezoneOffset) -> Self {
        Self { offset }
    }

    pub fn to_canonical(&self, local: SlotKey) -> Result<SlotKey> {
        to_canonical(local, self.offset)
    }

    pub fn to_local(&self, canonical: SlotKey) -> Result<SlotKey> {
        to_local(canonical, self.offset)
    }

    /// Re-keys an authoritative map into local keys. Keys that cannot be
    /// converted are dropped.
    pub fn localize_map(&self, canonical: &SlotMap) -> SlotMap {
        self.convert_map(canonical, |key| self.to_local(key))
    }

    pub fn canonicalize_map(&self, local: &SlotMap) -> SlotMap {
        self.convert_map(local, |key| self.to_canonical(key))
    }

    fn convert_map(&self, map: &SlotMap, convert: impl Fn(SlotKey) -> Result<SlotKey>) -> SlotMap {
        let mut out = SlotMap::new();
        for (key, nicknames) in map {
            match convert(*key) {
                Ok(converted) => {
                    out.insert(converted, nicknames.clone());
                }
                Err(e) => warn!("skipping slot {} at {}: {}", key, self.offset, e),
            }
        }
        out
    }
}
