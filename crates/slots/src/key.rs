/// Slot identities: a calendar date plus a whole-hour time of day.
///
/// The same type carries both local (viewer offset) and canonical (UTC) keys;
/// which one a value is depends on where it came from.
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{GridError, Result};

/// Whole-hour time of day, `00:00` through `23:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    /// First hour shown on the grid.
    pub const FIRST_GRID_HOUR: u32 = 8;
    /// Last hour shown on the grid.
    pub const LAST_GRID_HOUR: u32 = 23;

    pub fn from_hour(hour: u32) -> Result<Self> {
        NaiveTime::from_hms_opt(hour, 0, 0)
            .map(Self)
            .ok_or_else(|| GridError::Validation(format!("invalid hour: {}", hour)))
    }

    pub fn hour(self) -> u32 {
        self.0.hour()
    }

    pub fn naive(self) -> NaiveTime {
        self.0
    }

    /// Whether this time is one of the hourly marks the grid displays.
    pub fn is_grid_hour(self) -> bool {
        (Self::FIRST_GRID_HOUR..=Self::LAST_GRID_HOUR).contains(&self.hour())
    }

    /// The grid's rows, 08:00 through 23:00.
    pub fn grid_hours() -> impl Iterator<Item = Self> {
        (Self::FIRST_GRID_HOUR..=Self::LAST_GRID_HOUR)
            .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0).map(Self))
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.hour())
    }
}

impl FromStr for SlotTime {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || GridError::Validation(format!("invalid slot time: {:?}", s));
        let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
        if hour.len() != 2 || minute != "00" {
            return Err(invalid());
        }
        let hour = hour.parse::<u32>().map_err(|_| invalid())?;
        Self::from_hour(hour).map_err(|_| invalid())
    }
}

/// A `(date, time-of-day)` cell, written `YYYY-MM-DD_HH:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time: SlotTime,
}

impl SlotKey {
    pub const DATE_FORMAT: &'static str = "%Y-%m-%d";

    pub fn new(date: NaiveDate, time: SlotTime) -> Self {
        Self { date, time }
    }

    /// Builds a key from separate date and time strings.
    pub fn parse_parts(date: &str, time: &str) -> Result<Self> {
        let parsed = NaiveDate::parse_from_str(date, Self::DATE_FORMAT)
            .map_err(|_| GridError::Validation(format!("invalid slot date: {:?}", date)))?;
        if date.len() != 10 {
            return Err(GridError::Validation(format!(
                "invalid slot date: {:?}",
                date
            )));
        }
        Ok(Self::new(parsed, time.parse()?))
    }

    pub fn naive(self) -> NaiveDateTime {
        self.date.and_time(self.time.naive())
    }

    pub(crate) fn from_naive(at: NaiveDateTime) -> Result<Self> {
        Ok(Self::new(at.date(), SlotTime::from_hour(at.hour())?))
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.date.format(Self::DATE_FORMAT), self.time)
    }
}

impl FromStr for SlotKey {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        let (date, time) = s
            .split_once('_')
            .ok_or_else(|| GridError::Validation(format!("invalid slot key: {:?}", s)))?;
        Self::parse_parts(date, time)
    }
}

impl Serialize for SlotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
