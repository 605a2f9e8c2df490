/// Multi-viewer scenarios against an in-process slot authority.
use async_trait::async_trait;
use grid_sync::*;
use slots::{CalendarId, CellState, Nickname, SlotAction, SlotKey, SlotMap, TimezoneOffset};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;

/// Memory authority with switchable mutation failures and a way to hold
/// the next list request open.
#[derive(Default)]
struct TestApi {
    inner: MemorySlotApi,
    fail_mutations: AtomicBool,
    list_calls: AtomicUsize,
    hold_next_list: AtomicBool,
    list_entered: Notify,
    list_release: Notify,
}

#[async_trait]
impl SlotApi for TestApi {
    async fn list_all(&self, calendar: &CalendarId) -> Result<SlotMap> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_next_list.swap(false, Ordering::SeqCst) {
            self.list_entered.notify_one();
            self.list_release.notified().await;
        }
        self.inner.list_all(calendar).await
    }

    async fn mutate(
        &self,
        calendar: &CalendarId,
        key: SlotKey,
        nickname: &str,
        action: SlotAction,
    ) -> Result<SlotMap> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(SyncError::Network("connection reset".to_string()));
        }
        self.inner.mutate(calendar, key, nickname, action).await
    }

    async fn get_timezone(&self, calendar: &CalendarId) -> Result<Option<TimezoneOffset>> {
        self.inner.get_timezone(calendar).await
    }

    async fn set_timezone(
        &self,
        calendar: &CalendarId,
        offset: TimezoneOffset,
    ) -> Result<TimezoneOffset> {
        self.inner.set_timezone(calendar, offset).await
    }

    async fn clear_all(&self) -> Result<()> {
        self.inner.clear_all().await
    }
}

fn key(s: &str) -> SlotKey {
    s.parse().unwrap()
}

fn viewer(api: &Arc<TestApi>, nick: &str, offset: i64) -> GridSession {
    GridSession::new(
        api.clone(),
        CalendarId::default(),
        Nickname::parse(nick).unwrap(),
        TimezoneOffset::new(offset).unwrap(),
    )
}

fn canonical(api: &TestApi) -> SlotMap {
    api.inner.snapshot().list_all(&CalendarId::default())
}

#[tokio::test]
async fn test_two_viewers_same_offset() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 3);
    let bo = viewer(&api, "Bo", 3);

    ann.click(key("2024-06-01_16:00")).await.unwrap();
    assert_eq!(
        canonical(&api)[&key("2024-06-01_13:00")],
        vec!["Ann".to_string()]
    );

    bo.refresh().await.unwrap();
    assert_eq!(
        bo.view().cell(&key("2024-06-01_16:00"), "Bo"),
        CellState::Others
    );

    bo.click(key("2024-06-01_16:00")).await.unwrap();
    assert_eq!(
        canonical(&api)[&key("2024-06-01_13:00")],
        vec!["Ann".to_string(), "Bo".to_string()]
    );
}

#[tokio::test]
async fn test_utc_add_seen_three_hours_ahead() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 0);
    let bo = viewer(&api, "Bo", 3);

    ann.click(key("2024-06-01_10:00")).await.unwrap();
    assert_eq!(
        canonical(&api)[&key("2024-06-01_10:00")],
        vec!["Ann".to_string()]
    );

    bo.refresh().await.unwrap();
    assert_eq!(
        bo.view().nicknames(&key("2024-06-01_13:00")),
        ["Ann".to_string()]
    );
    assert!(bo.view().nicknames(&key("2024-06-01_10:00")).is_empty());
}

#[tokio::test]
async fn test_viewers_in_different_offsets() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 3);
    let utc = viewer(&api, "Cy", 0);
    let west = viewer(&api, "Di", -4);

    ann.click(key("2024-06-02_08:00")).await.unwrap();
    utc.refresh().await.unwrap();
    west.refresh().await.unwrap();

    assert!(utc.view().is_mine(&key("2024-06-02_05:00"), "Ann"));
    assert!(west.view().is_mine(&key("2024-06-02_01:00"), "Ann"));
}

#[tokio::test]
async fn test_removing_last_nickname_drops_key() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 0);

    ann.click(key("2024-06-01_10:00")).await.unwrap();
    ann.click(key("2024-06-01_10:00")).await.unwrap();

    assert!(!canonical(&api).contains_key(&key("2024-06-01_10:00")));
    assert!(ann.view().slots().is_empty());
}

#[tokio::test]
async fn test_drag_commit_resyncs_once() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 0);
    let cells = [
        key("2024-06-01_10:00"),
        key("2024-06-01_11:00"),
        key("2024-06-01_12:00"),
        key("2024-06-02_12:00"),
    ];

    let before = api.list_calls.load(Ordering::SeqCst);
    let report = ann.paint(&cells).await.unwrap();

    assert_eq!(
        report,
        CommitReport {
            sent: 4,
            failed: 0,
            resynced: true
        }
    );
    assert_eq!(api.list_calls.load(Ordering::SeqCst), before + 1);
    assert_eq!(canonical(&api).len(), 4);
    assert_eq!(ann.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_drag_remove_from_occupied_cell() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 0);
    let bo = viewer(&api, "Bo", 0);

    ann.paint(&[key("2024-06-01_10:00"), key("2024-06-01_11:00")])
        .await
        .unwrap();
    bo.click(key("2024-06-01_11:00")).await.unwrap();

    ann.refresh().await.unwrap();
    ann.paint(&[key("2024-06-01_10:00"), key("2024-06-01_11:00"), key("2024-06-01_12:00")])
        .await
        .unwrap();

    let map = canonical(&api);
    assert!(!map.contains_key(&key("2024-06-01_10:00")));
    assert_eq!(map[&key("2024-06-01_11:00")], vec!["Bo".to_string()]);
    assert!(!map.contains_key(&key("2024-06-01_12:00")));
}

#[tokio::test]
async fn test_polling_suspended_during_drag() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 0);
    let bo = viewer(&api, "Bo", 0);
    let at = Instant::now();

    ann.pointer_down(&PointerEvent::mouse(
        Some(key("2024-06-01_10:00")),
        Point::default(),
        at,
    ));
    ann.pointer_move(&PointerEvent::mouse(
        Some(key("2024-06-01_11:00")),
        Point::new(0.0, 40.0),
        at,
    ))
    .await;
    assert!(ann.is_interacting());

    bo.click(key("2024-06-01_15:00")).await.unwrap();
    assert_eq!(ann.poll().await.unwrap(), PollOutcome::Suspended);
    assert!(!ann.view().slots().contains_key(&key("2024-06-01_15:00")));

    ann.pointer_up(&PointerEvent::mouse(
        Some(key("2024-06-01_11:00")),
        Point::new(0.0, 40.0),
        at,
    ))
    .await;

    assert!(!ann.is_interacting());
    let view = ann.view();
    assert!(view.is_mine(&key("2024-06-01_10:00"), "Ann"));
    assert!(view.is_mine(&key("2024-06-01_11:00"), "Ann"));
    assert_eq!(view.cell(&key("2024-06-01_15:00"), "Ann"), CellState::Others);
}

#[tokio::test]
async fn test_failed_toggle_refetches_authoritative_state() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 0);
    api.fail_mutations.store(true, Ordering::SeqCst);

    let before = api.list_calls.load(Ordering::SeqCst);
    let result = ann.click(key("2024-06-01_10:00")).await;

    assert!(matches!(result, Err(SyncError::Network(_))));
    assert_eq!(api.list_calls.load(Ordering::SeqCst), before + 1);
    assert!(ann.view().slots().is_empty());
    assert!(ann.view().is_loaded());
}

#[tokio::test]
async fn test_failed_drag_writes_are_counted() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 0);
    api.fail_mutations.store(true, Ordering::SeqCst);

    let report = ann
        .paint(&[key("2024-06-01_10:00"), key("2024-06-01_11:00")])
        .await
        .unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 2);
    assert!(report.resynced);
    assert!(ann.view().slots().is_empty());
}

#[tokio::test]
async fn test_poll_in_flight_during_toggle_is_discarded() {
    let api = Arc::new(TestApi::default());
    let ann = Arc::new(viewer(&api, "Ann", 0));

    api.hold_next_list.store(true, Ordering::SeqCst);
    let poller = {
        let ann = ann.clone();
        tokio::spawn(async move { ann.poll().await })
    };
    api.list_entered.notified().await;

    ann.click(key("2024-06-01_10:00")).await.unwrap();
    api.list_release.notify_one();

    assert_eq!(poller.await.unwrap().unwrap(), PollOutcome::Stale);
    assert!(ann.view().is_mine(&key("2024-06-01_10:00"), "Ann"));
}

#[tokio::test]
async fn test_timezone_resolution_and_publish() {
    let api = Arc::new(TestApi::default());
    let ann = GridSession::connect(
        api.clone(),
        CalendarId::default(),
        Nickname::parse("Ann").unwrap(),
        None,
    )
    .await;
    ann.publish_timezone(TimezoneOffset::new(3).unwrap())
        .await
        .unwrap();
    assert_eq!(ann.offset().hours(), 3);

    let bo = GridSession::connect(
        api.clone(),
        CalendarId::default(),
        Nickname::parse("Bo").unwrap(),
        None,
    )
    .await;
    assert_eq!(bo.offset().hours(), 3);

    api.set_timezone(&CalendarId::default(), TimezoneOffset::UTC)
        .await
        .unwrap();
    let cy = GridSession::connect(
        api,
        CalendarId::default(),
        Nickname::parse("Cy").unwrap(),
        None,
    )
    .await;
    assert_eq!(cy.offset(), TimezoneOffset::UTC);
}

#[tokio::test]
async fn test_scrolled_touch_drag_reverts_view() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 0);
    let at = Instant::now();

    ann.pointer_down(&PointerEvent::touch(
        Some(key("2024-06-01_10:00")),
        Point::default(),
        at,
    ));
    let step = ann
        .pointer_move(&PointerEvent::touch(
            Some(key("2024-06-02_10:00")),
            Point::new(60.0, 0.0),
            at,
        ))
        .await;
    assert!(matches!(step, Step::Painted(_)));
    assert_eq!(ann.view().slots().len(), 2);

    let before = api.list_calls.load(Ordering::SeqCst);
    let step = ann
        .pointer_move(
            &PointerEvent::touch(Some(key("2024-06-03_10:00")), Point::new(120.0, 1.0), at)
                .with_scroll(Point::new(0.0, 12.0)),
        )
        .await;

    assert!(matches!(step, Step::Aborted { .. }));
    assert_eq!(api.list_calls.load(Ordering::SeqCst), before + 1);
    assert!(ann.view().slots().is_empty());
    assert!(canonical(&api).is_empty());
    assert_eq!(ann.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_cancel_mid_drag_reverts_view() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 0);
    let at = Instant::now();

    ann.pointer_down(&PointerEvent::mouse(
        Some(key("2024-06-01_10:00")),
        Point::default(),
        at,
    ));
    ann.pointer_move(&PointerEvent::mouse(
        Some(key("2024-06-01_11:00")),
        Point::new(0.0, 40.0),
        at,
    ))
    .await;
    assert_eq!(ann.view().slots().len(), 2);

    let before = api.list_calls.load(Ordering::SeqCst);
    let step = ann.cancel().await;

    assert!(matches!(step, Step::Aborted { .. }));
    assert_eq!(api.list_calls.load(Ordering::SeqCst), before + 1);
    assert!(ann.view().slots().is_empty());
    assert!(canonical(&api).is_empty());
    assert_eq!(ann.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_click_during_drag_is_refused() {
    let api = Arc::new(TestApi::default());
    let ann = viewer(&api, "Ann", 0);
    let at = Instant::now();

    ann.pointer_down(&PointerEvent::mouse(
        Some(key("2024-06-01_10:00")),
        Point::default(),
        at,
    ));
    ann.pointer_move(&PointerEvent::mouse(
        Some(key("2024-06-01_11:00")),
        Point::new(0.0, 40.0),
        at,
    ))
    .await;

    let result = ann.click(key("2024-06-01_15:00")).await;
    assert!(matches!(result, Err(SyncError::Busy)));
    assert!(canonical(&api).is_empty());

    let view = ann.view();
    assert!(view.is_mine(&key("2024-06-01_10:00"), "Ann"));
    assert!(view.is_mine(&key("2024-06-01_11:00"), "Ann"));
    assert!(!view.slots().contains_key(&key("2024-06-01_15:00")));
    assert_eq!(ann.phase(), Phase::Dragging);
}
