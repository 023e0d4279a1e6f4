//! Keyboard builder — inline buttons for a session's grid.
//!
//! Callback data formats:
//! - `{session_id}|{row}|{col}`: toggle a cell
//! - `{session_id}|mode`: switch between star and bomb
//! - `{session_id}|clear`: remove every mark
//!
//! Button labels carry no per-cell state; the rendered image is the only view
//! of the marks.

use crate::state::{Cell, Tap};
use crate::telegram::types::{InlineKeyboardButton, InlineKeyboardMarkup};

const SEPARATOR: char = '|';
const CELL_LABEL: &str = "◻️";
const MODE_LABEL: &str = "⭐/❌";
const CLEAR_LABEL: &str = "🧽 مسح";
const MODE_ACTION: &str = "mode";
const CLEAR_ACTION: &str = "clear";

/// Encode a tap on `session_id` as callback data.
#[must_use]
pub fn callback_data(session_id: &str, tap: Tap) -> String {
    match tap {
        Tap::Cell(Cell { row, col }) => format!("{session_id}{SEPARATOR}{row}{SEPARATOR}{col}"),
        Tap::ToggleMode => format!("{session_id}{SEPARATOR}{MODE_ACTION}"),
        Tap::Clear => format!("{session_id}{SEPARATOR}{CLEAR_ACTION}"),
    }
}

/// Decode callback data into a session id and tap. Returns `None` for
/// anything this bot did not produce.
#[must_use]
pub fn parse_callback_data(data: &str) -> Option<(String, Tap)> {
    let mut parts = data.split(SEPARATOR);
    let session_id = parts.next().filter(|s| !s.is_empty())?;
    let tap = match (parts.next()?, parts.next(), parts.next()) {
        (MODE_ACTION, None, None) => Tap::ToggleMode,
        (CLEAR_ACTION, None, None) => Tap::Clear,
        (row, Some(col), None) => Tap::Cell(Cell::new(row.parse().ok()?, col.parse().ok()?)),
        _ => return None,
    };
    Some((session_id.to_string(), tap))
}

/// `rows × cols` cell buttons followed by a mode/clear row.
#[must_use]
pub fn build_keyboard(session_id: &str, rows: u32, cols: u32) -> InlineKeyboardMarkup {
    let mut inline_keyboard: Vec<Vec<InlineKeyboardButton>> = (0..rows)
        .map(|row| {
            (0..cols)
                .map(|col| InlineKeyboardButton::callback(CELL_LABEL, callback_data(session_id, Tap::Cell(Cell::new(row, col)))))
                .collect()
        })
        .collect();

    inline_keyboard.push(vec![
        InlineKeyboardButton::callback(MODE_LABEL, callback_data(session_id, Tap::ToggleMode)),
        InlineKeyboardButton::callback(CLEAR_LABEL, callback_data(session_id, Tap::Clear)),
    ]);

    InlineKeyboardMarkup { inline_keyboard }
}

#[cfg(test)]
#[path = "keyboard_test.rs"]
mod tests;
