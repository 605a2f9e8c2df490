/// Operations the client needs from the slot authority.
use async_trait::async_trait;
use parking_lot::Mutex;
use slots::{CalendarId, SlotAction, SlotBook, SlotKey, SlotMap, TimezoneOffset};

use crate::Result;

/// Slot authority as seen from a viewer. All keys are canonical (UTC).
#[async_trait]
pub trait SlotApi: Send + Sync {
    async fn list_all(&self, calendar: &CalendarId) -> Result<SlotMap>;

    /// Applies one add/remove and returns the calendar's resulting map.
    async fn mutate(
        &self,
        calendar: &CalendarId,
        key: SlotKey,
        nickname: &str,
        action: SlotAction,
    ) -> Result<SlotMap>;

    async fn get_timezone(&self, calendar: &CalendarId) -> Result<Option<TimezoneOffset>>;

    async fn set_timezone(
        &self,
        calendar: &CalendarId,
        offset: TimezoneOffset,
    ) -> Result<TimezoneOffset>;

    /// Drops slot data for every calendar.
    async fn clear_all(&self) -> Result<()>;
}

/// In-process authority without persistence.
#[derive(Debug, Default)]
pub struct MemorySlotApi {
    book: Mutex<SlotBook>,
}

impl MemorySlotApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_book(book: SlotBook) -> Self {
        Self {
            book: Mutex::new(book),
        }
    }

    pub fn snapshot(&self) -> SlotBook {
        self.book.lock().clone()
    }
}

#[async_trait]
impl SlotApi for MemorySlotApi {
    async fn list_all(&self, calendar: &CalendarId) -> Result<SlotMap> {
        Ok(self.book.lock().list_all(calendar))
    }

    async fn mutate(
        &self,
        calendar: &CalendarId,
        key: SlotKey,
        nickname: &str,
        action: SlotAction,
    ) -> Result<SlotMap> {
        Ok(self.book.lock().mutate(calendar, key, nickname, action))
    }

    async fn get_timezone(&self, calendar: &CalendarId) -> Result<Option<TimezoneOffset>> {
        Ok(self.book.lock().timezone(calendar))
    }

    async fn set_timezone(
        &self,
        calendar: &CalendarId,
        offset: TimezoneOffset,
    ) -> Result<TimezoneOffset> {
        self.book.lock().set_timezone(calendar, offset);
        Ok(offset)
    }

    async fn clear_all(&self) -> Result<()> {
        self.book.lock().clear_all();
        Ok(())
    }
}
