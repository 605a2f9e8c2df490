use grid_sync::ViewState;
use slots::{CellState, GridWindow, SlotKey, SlotTime};
use std::fmt::Write;

/// Text rendering of one viewer's grid: every occupied cell inside the
/// window, grouped by local date. Cells where all filtered nicknames meet
/// are marked with `>`.
pub fn render_view(
    view: &ViewState,
    window: &GridWindow,
    nickname: &str,
    filter: &[String],
) -> String {
    let mut out = String::new();

    let everyone = view.all_nicknames();
    if !everyone.is_empty() {
        let _ = writeln!(out, "Participants: {}", everyone.join(", "));
    }
    if !filter.is_empty() {
        let _ = writeln!(out, "Highlighting cells with: {}", filter.join(", "));
    }

    let mut shown = 0usize;
    for date in window.dates() {
        let mut header_written = false;
        for key in SlotTime::grid_hours().map(|time| SlotKey::new(date, time)) {
            let names = view.nicknames(&key);
            if names.is_empty() {
                continue;
            }
            if !header_written {
                let _ = writeln!(out, "\n{}", date.format("%Y-%m-%d %a"));
                header_written = true;
            }
            let marker = if view.is_highlighted(&key, filter) { '>' } else { ' ' };
            let mine = match view.cell(&key, nickname) {
                CellState::Mine => "[x]",
                _ => "[ ]",
            };
            let _ = writeln!(out, "  {} {}  {} {}", marker, key.time, mine, names.join(", "));
            shown += 1;
        }
    }

    if shown == 0 {
        let _ = writeln!(out, "No selections in the next {} days.", window.days);
    }
    out
}
