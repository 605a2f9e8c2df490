/// JSON snapshot storage for every calendar's slots and timezones.
/// The in-memory book is authoritative; the file is rewritten after each
/// change while the write lock is held.
use parking_lot::RwLock;
use slots::{CalendarId, SlotAction, SlotBook, SlotKey, SlotMap, TimezoneOffset};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const SNAPSHOT_FILE: &str = "data.json";

pub struct SlotStore {
    snapshot_path: PathBuf,
    book: RwLock<SlotBook>,
}

impl SlotStore {
    pub fn open(data_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;

        let snapshot_path = data_dir.join(SNAPSHOT_FILE);
        let book = load_snapshot(&snapshot_path);

        Ok(Self {
            snapshot_path,
            book: RwLock::new(book),
        })
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn list_all(&self, calendar: &CalendarId) -> SlotMap {
        self.book.read().list_all(calendar)
    }

    pub fn mutate(
        &self,
        calendar: &CalendarId,
        key: SlotKey,
        nickname: &str,
        action: SlotAction,
    ) -> SlotMap {
        let mut book = self.book.write();
        let slots = book.mutate(calendar, key, nickname, action);
        debug!("{} {} {} in {}", nickname, action, key, calendar);
        self.persist(&book);
        slots
    }

    pub fn timezone(&self, calendar: &CalendarId) -> Option<TimezoneOffset> {
        self.book.read().timezone(calendar)
    }

    pub fn set_timezone(&self, calendar: &CalendarId, offset: TimezoneOffset) {
        let mut book = self.book.write();
        book.set_timezone(calendar, offset);
        info!("timezone of {} set to {}", calendar, offset);
        self.persist(&book);
    }

    /// Drops slot data for every calendar. Timezones are kept.
    pub fn clear_all(&self) {
        let mut book = self.book.write();
        book.clear_all();
        warn!("all calendars cleared");
        self.persist(&book);
    }

    pub fn calendar_count(&self) -> usize {
        self.book.read().calendar_count()
    }

    fn persist(&self, book: &SlotBook) {
        if let Err(e) = write_snapshot(&self.snapshot_path, book) {
            error!(
                "failed to save {}: {:#}",
                self.snapshot_path.display(),
                e
            );
        }
    }
}

/// Missing file means a fresh store; an unreadable one is logged and
/// replaced by an empty store on the next write.
fn load_snapshot(path: &Path) -> SlotBook {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("no snapshot at {}, starting empty", path.display());
            return SlotBook::new();
        }
        Err(e) => {
            error!("failed to read {}: {}", path.display(), e);
            return SlotBook::new();
        }
    };

    match serde_json::from_str::<SlotBook>(&data) {
        Ok(mut book) => {
            book.normalize();
            info!(
                "loaded {} calendars from {}",
                book.calendar_count(),
                path.display()
            );
            book
        }
        Err(e) => {
            error!("failed to parse {}: {}", path.display(), e);
            SlotBook::new()
        }
    }
}

/// Pretty JSON into a sibling temp file, then renamed over the snapshot.
fn write_snapshot(path: &Path, book: &SlotBook) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(book)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
