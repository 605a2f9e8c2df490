use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod key;
pub use key::*;
mod codec;
pub use codec::*;
mod book;
pub use book::*;
mod window;
pub use window::*;
pub mod wire;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, GridError>;

/// Identifier of one independent availability grid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarId(String);

impl CalendarId {
    pub const DEFAULT: &'static str = "default";

    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.trim().is_empty() {
            return Self::default();
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CalendarId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for CalendarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CalendarId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Display label a participant marks presence with.
///
/// Only the client validates nicknames; the server stores whatever label it
/// is given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nickname(String);

impl Nickname {
    pub const MIN_CHARS: usize = 2;
    pub const MAX_CHARS: usize = 20;

    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let chars = trimmed.chars().count();
        if chars == 0 {
            return Err(GridError::Validation("nickname is required".to_string()));
        }
        if chars < Self::MIN_CHARS {
            return Err(GridError::Validation(format!(
                "nickname must be at least {} characters",
                Self::MIN_CHARS
            )));
        }
        if chars > Self::MAX_CHARS {
            return Err(GridError::Validation(format!(
                "nickname must be at most {} characters",
                Self::MAX_CHARS
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Nickname {
    type Error = GridError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<Nickname> for String {
    fn from(nick: Nickname) -> Self {
        nick.0
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotAction {
    Add,
    Remove,
}

impl SlotAction {
    /// Action a click or a drag starting on a cell performs: occupied cells
    /// are vacated, empty ones claimed.
    pub fn for_occupancy(occupied: bool) -> Self {
        if occupied {
            Self::Remove
        } else {
            Self::Add
        }
    }
}

impl fmt::Display for SlotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Whole-hour display offset from UTC, always within [-4, 4].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i8")]
pub struct TimezoneOffset(i8);

impl TimezoneOffset {
    pub const MIN: i8 = -4;
    pub const MAX: i8 = 4;
    pub const UTC: Self = Self(0);

    /// Accepts an explicit offset; anything outside the range is rejected.
    pub fn new(hours: i64) -> Result<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&hours) {
            Ok(Self(hours as i8))
        } else {
            Err(GridError::Validation(format!(
                "timezone must be between {} and +{}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    /// Derives a default from a device offset, rounding to whole hours and
    /// clamping into range.
    pub fn clamped(hours: f64) -> Self {
        if hours.is_nan() {
            return Self::UTC;
        }
        let rounded = hours.round().clamp(f64::from(Self::MIN), f64::from(Self::MAX));
        Self(rounded as i8)
    }

    pub fn from_device_seconds(local_minus_utc: i32) -> Self {
        Self::clamped(f64::from(local_minus_utc) / 3600.0)
    }

    /// Default for this machine's current local offset.
    pub fn device_default() -> Self {
        let seconds = chrono::Local::now().offset().local_minus_utc();
        Self::from_device_seconds(seconds)
    }

    pub fn hours(self) -> i8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl Default for TimezoneOffset {
    fn default() -> Self {
        Self::UTC
    }
}

impl TryFrom<i64> for TimezoneOffset {
    type Error = GridError;

    fn try_from(hours: i64) -> Result<Self> {
        Self::new(hours)
    }
}

impl From<TimezoneOffset> for i8 {
    fn from(offset: TimezoneOffset) -> Self {
        offset.0
    }
}

impl fmt::Display for TimezoneOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 0 {
            write!(f, "UTC+{}", self.0)
        } else {
            write!(f, "UTC{}", self.0)
        }
    }
}
