/// Drives one viewer's grid: feeds gestures through the selection
/// controller, applies optimistic edits, and talks to the slot authority.
use parking_lot::{Mutex, RwLock};
use slots::{CalendarId, Nickname, SlotKey, TimezoneCodec, TimezoneOffset};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    resolve_offset, Intent, Phase, Point, PointerEvent, Result, SelectionController, SlotApi,
    Step, SyncError, ViewState,
};

/// Result of a gated poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Applied,
    /// A gesture was in progress; nothing fetched or nothing applied.
    Suspended,
    /// The view changed locally while the fetch was in flight.
    Stale,
    Failed,
}

/// Summary of a drag flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub sent: usize,
    pub failed: usize,
    pub resynced: bool,
}

pub struct GridSession {
    api: Arc<dyn SlotApi>,
    calendar: CalendarId,
    nickname: Nickname,
    view: RwLock<ViewState>,
    controller: Mutex<SelectionController>,
}

impl GridSession {
    pub fn new(
        api: Arc<dyn SlotApi>,
        calendar: CalendarId,
        nickname: Nickname,
        offset: TimezoneOffset,
    ) -> Self {
        let controller = SelectionController::new(nickname.clone(), TimezoneCodec::new(offset));
        Self {
            api,
            calendar,
            nickname,
            view: RwLock::new(ViewState::new()),
            controller: Mutex::new(controller),
        }
    }

    /// Resolves the display offset (local override, then the calendar's
    /// shared timezone, then this device) and loads the initial state.
    /// Network failures are logged; the session still starts.
    pub async fn connect(
        api: Arc<dyn SlotApi>,
        calendar: CalendarId,
        nickname: Nickname,
        local_override: Option<TimezoneOffset>,
    ) -> Self {
        let shared = match api.get_timezone(&calendar).await {
            Ok(tz) => tz,
            Err(e) => {
                warn!("loading timezone for {} failed: {}", calendar, e);
                None
            }
        };
        let offset = resolve_offset(local_override, shared, TimezoneOffset::device_default());
        info!("calendar {} shown at {}", calendar, offset);

        let session = Self::new(api, calendar, nickname, offset);
        if let Err(e) = session.refresh().await {
            warn!("initial load of {} failed: {}", session.calendar, e);
        }
        session
    }

    pub fn calendar(&self) -> &CalendarId {
        &self.calendar
    }

    pub fn nickname(&self) -> &Nickname {
        &self.nickname
    }

    pub fn offset(&self) -> TimezoneOffset {
        self.codec().offset
    }

    fn codec(&self) -> TimezoneCodec {
        self.controller.lock().codec()
    }

    pub fn phase(&self) -> Phase {
        self.controller.lock().phase()
    }

    pub fn is_interacting(&self) -> bool {
        self.controller.lock().blocks_sync()
    }

    /// Copy of the current local view.
    pub fn view(&self) -> ViewState {
        self.view.read().clone()
    }

    pub fn pointer_down(&self, event: &PointerEvent) -> Step {
        let occupied = event
            .cell
            .is_some_and(|cell| self.view.read().is_mine(&cell, self.nickname.as_str()));
        self.controller.lock().pointer_down(event, occupied)
    }

    pub async fn pointer_move(&self, event: &PointerEvent) -> Step {
        let step = self.controller.lock().pointer_move(event);
        match &step {
            Step::Painted(intents) => self.apply_optimistic(intents),
            Step::Aborted { painted } if !painted.is_empty() => self.rollback().await,
            _ => {}
        }
        step
    }

    pub async fn pointer_up(&self, event: &PointerEvent) -> Step {
        let step = self.controller.lock().pointer_up(event);
        self.execute(&step).await;
        step
    }

    /// Pointer cancel from the platform.
    pub async fn cancel(&self) -> Step {
        let step = self.controller.lock().cancel();
        self.execute(&step).await;
        step
    }

    async fn execute(&self, step: &Step) {
        match step {
            Step::Toggle(intent) => {
                // failures are already logged and resynced
                let _ = self.toggle(intent.clone()).await;
            }
            Step::Commit(intents) => {
                self.commit(intents.clone()).await;
            }
            Step::Aborted { painted } if !painted.is_empty() => self.rollback().await,
            _ => {}
        }
    }

    fn apply_optimistic(&self, intents: &[Intent]) {
        let mut view = self.view.write();
        for intent in intents {
            view.apply_local(intent.local, &intent.nickname, intent.action);
        }
    }

    async fn rollback(&self) {
        if let Err(e) = self.refresh().await {
            warn!("resync after aborted drag failed: {}", e);
        }
    }

    /// Single click mutation: optimistic edit, then the server's answer
    /// replaces the view. On failure the whole map is refetched.
    async fn toggle(&self, intent: Intent) -> Result<()> {
        self.view
            .write()
            .apply_local(intent.local, &intent.nickname, intent.action);

        let result = self
            .api
            .mutate(&self.calendar, intent.canonical, &intent.nickname, intent.action)
            .await;
        match result {
            Ok(canonical) => {
                let local = self.codec().localize_map(&canonical);
                self.view.write().replace(local);
                debug!("{} {} at {}", intent.nickname, intent.action, intent.canonical);
                Ok(())
            }
            Err(e) => {
                warn!("saving {} {} failed: {}", intent.action, intent.canonical, e);
                if let Err(resync) = self.refresh().await {
                    warn!("resync after failed toggle: {}", resync);
                }
                Err(e)
            }
        }
    }

    /// Flushes a finished drag in discovery order, one mutation per intent,
    /// then resyncs once and returns the controller to idle.
    async fn commit(&self, intents: Vec<Intent>) -> CommitReport {
        let mut report = CommitReport::default();
        for intent in &intents {
            let result = self
                .api
                .mutate(&self.calendar, intent.canonical, &intent.nickname, intent.action)
                .await;
            match result {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("saving {} {} failed: {}", intent.action, intent.canonical, e);
                }
            }
        }

        match self.refresh().await {
            Ok(()) => report.resynced = true,
            Err(e) => warn!("resync after drag failed: {}", e),
        }
        self.controller.lock().finish_commit();

        debug!(
            "drag flushed: {} sent, {} failed",
            report.sent, report.failed
        );
        report
    }

    /// Fetches the authoritative map and replaces the view unconditionally.
    pub async fn refresh(&self) -> Result<()> {
        let codec = self.codec();
        let canonical = self.api.list_all(&self.calendar).await?;
        let local = codec.localize_map(&canonical);
        self.view.write().replace(local);
        Ok(())
    }

    /// Gated refresh for the scheduler: skipped while a gesture is active,
    /// discarded if the view changed while the request was in flight.
    pub async fn poll(&self) -> Result<PollOutcome> {
        if self.is_interacting() {
            return Ok(PollOutcome::Suspended);
        }
        let revision = self.view.read().revision();
        let codec = self.codec();

        let canonical = self.api.list_all(&self.calendar).await?;

        if self.is_interacting() {
            return Ok(PollOutcome::Suspended);
        }
        if self.codec() != codec {
            return Ok(PollOutcome::Stale);
        }
        let local = codec.localize_map(&canonical);
        if self.view.write().replace_if_unchanged(revision, local) {
            Ok(PollOutcome::Applied)
        } else {
            Ok(PollOutcome::Stale)
        }
    }

    /// Switches this viewer's display offset and re-localizes the view.
    pub async fn set_offset(&self, offset: TimezoneOffset) -> Result<()> {
        self.controller
            .lock()
            .set_codec(TimezoneCodec::new(offset))?;
        self.refresh().await
    }

    /// Makes `offset` the calendar's shared timezone and shows it locally.
    pub async fn publish_timezone(&self, offset: TimezoneOffset) -> Result<TimezoneOffset> {
        let accepted = self.api.set_timezone(&self.calendar, offset).await?;
        self.set_offset(accepted).await?;
        Ok(accepted)
    }

    /// Click on one local cell.
    pub async fn click(&self, cell: SlotKey) -> Result<()> {
        let event = PointerEvent::mouse(Some(cell), Point::default(), Instant::now());
        if !matches!(self.pointer_down(&event), Step::Armed { .. }) {
            return Err(SyncError::Busy);
        }
        let step = self.controller.lock().pointer_up(&event);
        match step {
            Step::Toggle(intent) => self.toggle(intent).await,
            _ => Ok(()),
        }
    }

    /// Drag from the first cell through the rest, then release.
    pub async fn paint(&self, cells: &[SlotKey]) -> Result<CommitReport> {
        let Some((first, rest)) = cells.split_first() else {
            return Ok(CommitReport::default());
        };
        let at = Instant::now();
        let mut position = Point::default();

        let down = PointerEvent::mouse(Some(*first), position, at);
        if !matches!(self.pointer_down(&down), Step::Armed { .. }) {
            return Err(SyncError::Busy);
        }
        for cell in rest {
            position.y += 40.0;
            self.pointer_move(&PointerEvent::mouse(Some(*cell), position, at))
                .await;
        }

        let step = self
            .controller
            .lock()
            .pointer_up(&PointerEvent::mouse(cells.last().copied(), position, at));
        match step {
            Step::Commit(intents) => Ok(self.commit(intents).await),
            Step::Toggle(intent) => {
                self.toggle(intent).await?;
                Ok(CommitReport {
                    sent: 1,
                    failed: 0,
                    resynced: true,
                })
            }
            _ => Ok(CommitReport::default()),
        }
    }
}
