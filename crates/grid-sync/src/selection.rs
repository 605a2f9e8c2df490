/// Pointer/touch gesture state machine for the slot grid.
///
/// Idle -> ArmedPointerDown -> (click) Idle
///                          -> Dragging -> Committing -> Idle
///
/// The controller is pure: it never touches the network or the view. Each
/// transition returns a [`Step`] telling the caller what to apply.
use slots::{Nickname, SlotAction, SlotKey, TimezoneCodec};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{Result, SyncError};

/// A press shorter than this (and not moved) is a click.
pub const CLICK_WINDOW: Duration = Duration::from_millis(300);
/// Pointer travel in pixels separating a click from a drag.
pub const MOVE_THRESHOLD_PX: f32 = 15.0;
/// Scroll container movement that marks a touch as a scroll.
pub const SCROLL_OFFSET_PX: f32 = 3.0;
/// Vertical finger travel that marks a touch as a scroll when it dominates.
pub const SCROLL_AXIS_PX: f32 = 10.0;
pub const SCROLL_AXIS_RATIO: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One pointer sample. `cell` is the local slot under the pointer, if any;
/// `scroll` is the grid container's scroll offset at that moment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub position: Point,
    pub scroll: Point,
    pub cell: Option<SlotKey>,
    pub at: Instant,
}

impl PointerEvent {
    pub fn mouse(cell: Option<SlotKey>, position: Point, at: Instant) -> Self {
        Self {
            kind: PointerKind::Mouse,
            position,
            scroll: Point::default(),
            cell,
            at,
        }
    }

    pub fn touch(cell: Option<SlotKey>, position: Point, at: Instant) -> Self {
        Self {
            kind: PointerKind::Touch,
            ..Self::mouse(cell, position, at)
        }
    }

    pub fn with_scroll(mut self, scroll: Point) -> Self {
        self.scroll = scroll;
        self
    }
}

/// A single add/remove the viewer wants applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub local: SlotKey,
    pub canonical: SlotKey,
    pub nickname: String,
    pub action: SlotAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ArmedPointerDown,
    Dragging,
    Committing,
}

/// What the caller must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing happened.
    Ignored,
    /// A gesture started; its action is fixed from here on.
    Armed { action: SlotAction },
    /// Newly entered cells, in discovery order. Apply optimistically.
    Painted(Vec<Intent>),
    /// A click: send this one mutation now.
    Toggle(Intent),
    /// The drag ended: flush these, resync, then call `finish_commit`.
    Commit(Vec<Intent>),
    /// The gesture was dropped. `painted` lists optimistic edits to undo.
    Aborted { painted: Vec<Intent> },
    /// Released without qualifying as a click or a drag.
    Released,
}

#[derive(Debug, Clone)]
struct Gesture {
    origin: SlotKey,
    origin_pos: Point,
    origin_scroll: Point,
    started_at: Instant,
    kind: PointerKind,
    action: SlotAction,
}

impl Gesture {
    fn is_scroll(&self, event: &PointerEvent) -> bool {
        let scrolled = (event.scroll.x - self.origin_scroll.x).abs() > SCROLL_OFFSET_PX
            || (event.scroll.y - self.origin_scroll.y).abs() > SCROLL_OFFSET_PX;
        let dx = (event.position.x - self.origin_pos.x).abs();
        let dy = (event.position.y - self.origin_pos.y).abs();
        scrolled || (dy > SCROLL_AXIS_PX && dy > dx * SCROLL_AXIS_RATIO)
    }
}

#[derive(Debug, Clone)]
struct Drag {
    gesture: Gesture,
    visited: HashSet<SlotKey>,
    intents: Vec<Intent>,
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Idle,
    Armed(Gesture),
    Dragging(Drag),
    Committing,
}

pub struct SelectionController {
    nickname: Nickname,
    codec: TimezoneCodec,
    state: State,
}

impl SelectionController {
    pub fn new(nickname: Nickname, codec: TimezoneCodec) -> Self {
        Self {
            nickname,
            codec,
            state: State::Idle,
        }
    }

    pub fn nickname(&self) -> &Nickname {
        &self.nickname
    }

    pub fn codec(&self) -> TimezoneCodec {
        self.codec
    }

    /// The offset may only change between gestures.
    pub fn set_codec(&mut self, codec: TimezoneCodec) -> Result<()> {
        if !matches!(self.state, State::Idle) {
            return Err(SyncError::Busy);
        }
        self.codec = codec;
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::Armed(_) => Phase::ArmedPointerDown,
            State::Dragging(_) => Phase::Dragging,
            State::Committing => Phase::Committing,
        }
    }

    /// Polling must not overwrite the view while this is true.
    pub fn blocks_sync(&self) -> bool {
        !matches!(self.state, State::Idle)
    }

    pub fn gesture_action(&self) -> Option<SlotAction> {
        match &self.state {
            State::Armed(g) => Some(g.action),
            State::Dragging(d) => Some(d.gesture.action),
            _ => None,
        }
    }

    /// Intents buffered by the current drag.
    pub fn pending(&self) -> &[Intent] {
        match &self.state {
            State::Dragging(d) => &d.intents,
            _ => &[],
        }
    }

    /// `occupied` says whether the viewer is already present in the cell
    /// under the pointer; it fixes the gesture's action.
    pub fn pointer_down(&mut self, event: &PointerEvent, occupied: bool) -> Step {
        if !matches!(self.state, State::Idle) {
            debug!("pointer down ignored in {:?}", self.phase());
            return Step::Ignored;
        }
        let Some(origin) = event.cell else {
            return Step::Ignored;
        };

        let action = SlotAction::for_occupancy(occupied);
        self.state = State::Armed(Gesture {
            origin,
            origin_pos: event.position,
            origin_scroll: event.scroll,
            started_at: event.at,
            kind: event.kind,
            action,
        });
        Step::Armed { action }
    }

    pub fn pointer_move(&mut self, event: &PointerEvent) -> Step {
        match std::mem::take(&mut self.state) {
            State::Armed(gesture) => {
                if gesture.kind == PointerKind::Touch && gesture.is_scroll(event) {
                    debug!("touch on {} classified as scroll", gesture.origin);
                    return Step::Aborted {
                        painted: Vec::new(),
                    };
                }

                let entered_other = event.cell.is_some_and(|cell| cell != gesture.origin);
                let moved_far = gesture.kind == PointerKind::Touch
                    && gesture.origin_pos.distance(event.position) > MOVE_THRESHOLD_PX;
                if !entered_other && !moved_far {
                    self.state = State::Armed(gesture);
                    return Step::Ignored;
                }

                let origin = gesture.origin;
                debug!("drag started on {} ({})", origin, gesture.action);
                let mut drag = Drag {
                    gesture,
                    visited: HashSet::new(),
                    intents: Vec::new(),
                };
                let mut painted: Vec<Intent> = self.paint(&mut drag, origin).into_iter().collect();
                if let Some(cell) = event.cell {
                    painted.extend(self.paint(&mut drag, cell));
                }
                self.state = State::Dragging(drag);
                Step::Painted(painted)
            }
            State::Dragging(mut drag) => {
                if drag.gesture.kind == PointerKind::Touch && drag.gesture.is_scroll(event) {
                    debug!(
                        "touch drag from {} became a scroll, dropping {} intents",
                        drag.gesture.origin,
                        drag.intents.len()
                    );
                    return Step::Aborted {
                        painted: drag.intents,
                    };
                }

                let painted = event.cell.and_then(|cell| self.paint(&mut drag, cell));
                self.state = State::Dragging(drag);
                match painted {
                    Some(intent) => Step::Painted(vec![intent]),
                    None => Step::Ignored,
                }
            }
            other => {
                self.state = other;
                Step::Ignored
            }
        }
    }

    pub fn pointer_up(&mut self, event: &PointerEvent) -> Step {
        match std::mem::take(&mut self.state) {
            State::Armed(gesture) => {
                if gesture.kind == PointerKind::Touch && gesture.is_scroll(event) {
                    return Step::Aborted {
                        painted: Vec::new(),
                    };
                }
                let elapsed = event.at.saturating_duration_since(gesture.started_at);
                let moved = gesture.origin_pos.distance(event.position);
                if elapsed >= CLICK_WINDOW || moved >= MOVE_THRESHOLD_PX {
                    debug!(
                        "release on {} after {:?} / {:.1}px is not a click",
                        gesture.origin, elapsed, moved
                    );
                    return Step::Released;
                }
                match self.intent(gesture.origin, gesture.action) {
                    Some(intent) => Step::Toggle(intent),
                    None => Step::Released,
                }
            }
            State::Dragging(drag) => {
                debug!("drag ended with {} intents", drag.intents.len());
                self.state = State::Committing;
                Step::Commit(drag.intents)
            }
            other => {
                self.state = other;
                Step::Ignored
            }
        }
    }

    /// Pointer cancel (e.g. `touchcancel`): drop the gesture.
    pub fn cancel(&mut self) -> Step {
        match std::mem::take(&mut self.state) {
            State::Armed(_) => Step::Aborted {
                painted: Vec::new(),
            },
            State::Dragging(drag) => Step::Aborted {
                painted: drag.intents,
            },
            other => {
                self.state = other;
                Step::Ignored
            }
        }
    }

    /// Called once the post-drag flush and resync are done.
    pub fn finish_commit(&mut self) {
        if matches!(self.state, State::Committing) {
            self.state = State::Idle;
        }
    }

    fn paint(&self, drag: &mut Drag, cell: SlotKey) -> Option<Intent> {
        if !drag.visited.insert(cell) {
            return None;
        }
        let intent = self.intent(cell, drag.gesture.action)?;
        drag.intents.push(intent.clone());
        Some(intent)
    }

    fn intent(&self, local: SlotKey, action: SlotAction) -> Option<Intent> {
        match self.codec.to_canonical(local) {
            Ok(canonical) => Some(Intent {
                local,
                canonical,
                nickname: self.nickname.as_str().to_string(),
                action,
            }),
            Err(e) => {
                warn!("cannot convert {} at {}: {}", local, self.codec.offset, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slots::TimezoneOffset;

    fn key(s: &str) -> SlotKey {
        s.parse().unwrap()
    }

    fn controller(offset: i64) -> SelectionController {
        SelectionController::new(
            Nickname::parse("Ann").unwrap(),
            TimezoneCodec::new(TimezoneOffset::new(offset).unwrap()),
        )
    }

    fn cell_at(k: &str, x: f32, y: f32, at: Instant) -> PointerEvent {
        PointerEvent::mouse(Some(key(k)), Point::new(x, y), at)
    }

    #[test]
    fn test_quick_release_is_a_click() {
        let mut c = controller(0);
        let t0 = Instant::now();
        let down = cell_at("2024-06-01_10:00", 5.0, 5.0, t0);

        assert_eq!(c.pointer_down(&down, false), Step::Armed { action: SlotAction::Add });
        assert_eq!(c.phase(), Phase::ArmedPointerDown);
        assert!(c.blocks_sync());

        let up = cell_at("2024-06-01_10:00", 7.0, 6.0, t0 + Duration::from_millis(120));
        match c.pointer_up(&up) {
            Step::Toggle(intent) => {
                assert_eq!(intent.action, SlotAction::Add);
                assert_eq!(intent.local, key("2024-06-01_10:00"));
                assert_eq!(intent.nickname, "Ann");
            }
            other => panic!("expected toggle, got {:?}", other),
        }
        assert_eq!(c.phase(), Phase::Idle);
        assert!(!c.blocks_sync());
    }

    #[test]
    fn test_click_on_own_slot_removes() {
        let mut c = controller(0);
        let t0 = Instant::now();
        c.pointer_down(&cell_at("2024-06-01_10:00", 0.0, 0.0, t0), true);
        let step = c.pointer_up(&cell_at("2024-06-01_10:00", 0.0, 0.0, t0 + Duration::from_millis(50)));
        assert!(matches!(step, Step::Toggle(Intent { action: SlotAction::Remove, .. })));
    }

    #[test]
    fn test_long_press_is_not_a_click() {
        let mut c = controller(0);
        let t0 = Instant::now();
        c.pointer_down(&cell_at("2024-06-01_10:00", 0.0, 0.0, t0), false);
        let step = c.pointer_up(&cell_at("2024-06-01_10:00", 0.0, 0.0, t0 + Duration::from_millis(450)));
        assert_eq!(step, Step::Released);
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn test_drag_from_occupied_slot_removes_each_cell_once() {
        let mut c = controller(0);
        let t0 = Instant::now();
        assert_eq!(
            c.pointer_down(&cell_at("2024-06-01_10:00", 0.0, 0.0, t0), true),
            Step::Armed { action: SlotAction::Remove }
        );

        // Wiggling inside the origin does not start a drag or paint it.
        assert_eq!(c.pointer_move(&cell_at("2024-06-01_10:00", 4.0, 2.0, t0)), Step::Ignored);
        assert!(c.pending().is_empty());

        let entered = [
            "2024-06-01_11:00",
            "2024-06-01_12:00",
            "2024-06-01_13:00",
            "2024-06-01_12:00",
            "2024-06-02_13:00",
            "2024-06-02_12:00",
            "2024-06-01_11:00",
        ];
        let mut entered_intents = Vec::new();
        for (i, k) in entered.iter().enumerate() {
            if let Step::Painted(intents) = c.pointer_move(&cell_at(k, 0.0, 40.0 * i as f32, t0)) {
                entered_intents.extend(intents.into_iter().filter(|i| i.local != key("2024-06-01_10:00")));
            }
        }
        assert_eq!(entered_intents.len(), 5);
        assert!(entered_intents.iter().all(|i| i.action == SlotAction::Remove));
        assert_eq!(c.gesture_action(), Some(SlotAction::Remove));

        let Step::Commit(intents) = c.pointer_up(&cell_at("2024-06-01_11:00", 0.0, 0.0, t0)) else {
            panic!("expected commit");
        };
        // origin first, then discovery order
        let locals: Vec<String> = intents.iter().map(|i| i.local.to_string()).collect();
        assert_eq!(
            locals,
            vec![
                "2024-06-01_10:00",
                "2024-06-01_11:00",
                "2024-06-01_12:00",
                "2024-06-01_13:00",
                "2024-06-02_13:00",
                "2024-06-02_12:00",
            ]
        );
        assert_eq!(c.phase(), Phase::Committing);
        assert!(c.blocks_sync());

        c.finish_commit();
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn test_intents_carry_canonical_keys() {
        let mut c = controller(3);
        let t0 = Instant::now();
        c.pointer_down(&cell_at("2024-06-01_08:00", 0.0, 0.0, t0), false);
        let Step::Painted(intents) = c.pointer_move(&cell_at("2024-06-01_09:00", 0.0, 40.0, t0)) else {
            panic!("expected paint");
        };
        assert_eq!(intents[0].canonical, key("2024-06-01_05:00"));
        assert_eq!(intents[1].canonical, key("2024-06-01_06:00"));
    }

    #[test]
    fn test_second_pointer_down_is_ignored() {
        let mut c = controller(0);
        let t0 = Instant::now();
        c.pointer_down(&cell_at("2024-06-01_10:00", 0.0, 0.0, t0), false);
        c.pointer_move(&cell_at("2024-06-01_11:00", 0.0, 40.0, t0));
        assert_eq!(c.pointer_down(&cell_at("2024-06-03_10:00", 0.0, 0.0, t0), true), Step::Ignored);
        assert_eq!(c.gesture_action(), Some(SlotAction::Add));
    }

    #[test]
    fn test_touch_vertical_swipe_is_a_scroll() {
        let mut c = controller(0);
        let t0 = Instant::now();
        let k = Some(key("2024-06-01_10:00"));
        c.pointer_down(&PointerEvent::touch(k, Point::new(100.0, 100.0), t0), false);
        let step = c.pointer_move(&PointerEvent::touch(k, Point::new(102.0, 125.0), t0));
        assert_eq!(step, Step::Aborted { painted: vec![] });
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn test_touch_travel_starts_drag_within_origin() {
        let mut c = controller(0);
        let t0 = Instant::now();
        let k = Some(key("2024-06-01_10:00"));
        c.pointer_down(&PointerEvent::touch(k, Point::new(100.0, 100.0), t0), false);
        let Step::Painted(intents) = c.pointer_move(&PointerEvent::touch(k, Point::new(120.0, 102.0), t0)) else {
            panic!("expected paint");
        };
        assert_eq!(intents.len(), 1);
        assert_eq!(c.phase(), Phase::Dragging);
    }

    #[test]
    fn test_container_scroll_aborts_touch_drag() {
        let mut c = controller(0);
        let t0 = Instant::now();
        c.pointer_down(
            &PointerEvent::touch(Some(key("2024-06-01_10:00")), Point::new(100.0, 100.0), t0),
            false,
        );
        c.pointer_move(&PointerEvent::touch(
            Some(key("2024-06-02_10:00")),
            Point::new(160.0, 100.0),
            t0,
        ));
        assert_eq!(c.pending().len(), 2);

        let scrolled = PointerEvent::touch(
            Some(key("2024-06-03_10:00")),
            Point::new(220.0, 101.0),
            t0,
        )
        .with_scroll(Point::new(0.0, 12.0));
        match c.pointer_move(&scrolled) {
            Step::Aborted { painted } => assert_eq!(painted.len(), 2),
            other => panic!("expected abort, got {:?}", other),
        }
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn test_mouse_is_never_treated_as_scroll() {
        let mut c = controller(0);
        let t0 = Instant::now();
        c.pointer_down(&cell_at("2024-06-01_10:00", 0.0, 0.0, t0), false);
        let step = c.pointer_move(&cell_at("2024-06-01_11:00", 0.0, 80.0, t0));
        assert!(matches!(step, Step::Painted(_)));
    }

    #[test]
    fn test_codec_locked_during_gesture() {
        let mut c = controller(0);
        let t0 = Instant::now();
        c.pointer_down(&cell_at("2024-06-01_10:00", 0.0, 0.0, t0), false);
        assert!(c.set_codec(TimezoneCodec::new(TimezoneOffset::new(2).unwrap())).is_err());
        assert_eq!(c.cancel(), Step::Aborted { painted: vec![] });
        assert!(c.set_codec(TimezoneCodec::new(TimezoneOffset::new(2).unwrap())).is_ok());
        assert_eq!(c.codec().offset.hours(), 2);
    }

    #[test]
    fn test_pointer_down_outside_grid_is_ignored() {
        let mut c = controller(0);
        let ev = PointerEvent::mouse(None, Point::default(), Instant::now());
        assert_eq!(c.pointer_down(&ev, false), Step::Ignored);
        assert_eq!(c.phase(), Phase::Idle);
    }
}
