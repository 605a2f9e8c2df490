use serde::{Deserialize, Serialize};
use slots::{CalendarId, TimezoneOffset};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{Result, SyncError};

/// Per-device choices that are never sent to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePrefs {
    /// Display offset override per calendar.
    #[serde(default)]
    pub timezones: BTreeMap<CalendarId, TimezoneOffset>,
}

impl DevicePrefs {
    /// `<config dir>/slotgrid/prefs.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("slotgrid").join("prefs.json"))
    }

    /// Missing file means no overrides. A corrupt file is logged and ignored.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(SyncError::Prefs(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        match serde_json::from_str(&content) {
            Ok(prefs) => Ok(prefs),
            Err(e) => {
                warn!("ignoring unreadable prefs {}: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::Prefs(format!("creating {}: {}", parent.display(), e)))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| SyncError::Prefs(format!("writing {}: {}", path.display(), e)))?;
        debug!("saved prefs to {}", path.display());
        Ok(())
    }

    pub fn timezone(&self, calendar: &CalendarId) -> Option<TimezoneOffset> {
        self.timezones.get(calendar).copied()
    }

    pub fn set_timezone(&mut self, calendar: &CalendarId, offset: TimezoneOffset) {
        self.timezones.insert(calendar.clone(), offset);
    }
}

/// Display offset precedence: this device's override, then the calendar's
/// shared value, then the device clock.
pub fn resolve_offset(
    local: Option<TimezoneOffset>,
    shared: Option<TimezoneOffset>,
    device: TimezoneOffset,
) -> TimezoneOffset {
    local.or(shared).unwrap_or(device)
}
