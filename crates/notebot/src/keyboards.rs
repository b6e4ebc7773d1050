//! Keyboard layouts and the button labels the dispatcher matches on.

use crate::dispatch::{CallbackAction, MenuAction, NoteField};
use crate::transport::{InlineButton, KeyboardSpec};

pub const BTN_ABOUT: &str = "❓ About";
pub const BTN_WEATHER: &str = "☀️ Weather";
pub const BTN_HELP: &str = "🤝 Help";
pub const BTN_NOTES: &str = "📝 Notes";
pub const BTN_HIDE_KEYBOARD: &str = "⬇️ Hide keyboard";

pub const BTN_NOTE_NEW: &str = "📝 New note";
pub const BTN_NOTE_LIST: &str = "📋 My notes";
pub const BTN_NOTE_SEARCH: &str = "🔍 Search notes";
pub const BTN_NOTE_STATS: &str = "📊 Statistics";
pub const BTN_NOTE_EXPORT: &str = "📁 Export notes";
pub const BTN_MAIN_MENU: &str = "🔙 Main menu";

pub const BTN_CANCEL: &str = "❌ Cancel";

/// Main menu shown on /start and after unrecognized input.
pub fn main_menu() -> KeyboardSpec {
    KeyboardSpec::Reply {
        rows: vec![
            vec![BTN_ABOUT.to_string(), BTN_WEATHER.to_string()],
            vec![BTN_HELP.to_string(), BTN_NOTES.to_string()],
            vec![BTN_HIDE_KEYBOARD.to_string()],
        ],
    }
}

/// Notes submenu shown by the Notes button.
pub fn notes_menu() -> KeyboardSpec {
    KeyboardSpec::Reply {
        rows: vec![
            vec![BTN_NOTE_NEW.to_string(), BTN_NOTE_LIST.to_string()],
            vec![BTN_NOTE_SEARCH.to_string(), BTN_NOTE_STATS.to_string()],
            vec![BTN_NOTE_EXPORT.to_string(), BTN_MAIN_MENU.to_string()],
        ],
    }
}

/// Single cancel button, shown while a flow is waiting for input.
pub fn cancel_keyboard() -> KeyboardSpec {
    KeyboardSpec::Reply {
        rows: vec![vec![BTN_CANCEL.to_string()]],
    }
}

pub fn remove_keyboard() -> KeyboardSpec {
    KeyboardSpec::Remove
}

/// Inline actions under a note list.
pub fn note_list_actions() -> KeyboardSpec {
    KeyboardSpec::Inline {
        rows: vec![
            vec![
                InlineButton::new("📥 Export", CallbackAction::Menu(MenuAction::Export).encode()),
                InlineButton::new("🔍 Search", CallbackAction::Menu(MenuAction::Search).encode()),
                InlineButton::new("📊 Stats", CallbackAction::Menu(MenuAction::Stats).encode()),
            ],
            vec![
                InlineButton::new("➕ New", CallbackAction::Menu(MenuAction::AddNew).encode()),
            ],
        ],
    }
}

/// Per-field edit menu for one note.
pub fn note_edit_actions(local_id: i64) -> KeyboardSpec {
    KeyboardSpec::Inline {
        rows: vec![
            vec![
                InlineButton::new(
                    "📝 Title",
                    CallbackAction::EditField(local_id, NoteField::Title).encode(),
                ),
                InlineButton::new(
                    "📄 Content",
                    CallbackAction::EditField(local_id, NoteField::Content).encode(),
                ),
            ],
            vec![
                InlineButton::new(
                    "🏷 Tags",
                    CallbackAction::EditField(local_id, NoteField::Tags).encode(),
                ),
                InlineButton::new(
                    "📁 Category",
                    CallbackAction::EditField(local_id, NoteField::Category).encode(),
                ),
            ],
            vec![
                InlineButton::new("❌ Delete", CallbackAction::RequestDelete(local_id).encode()),
                InlineButton::new("🔙 Back", CallbackAction::Menu(MenuAction::List).encode()),
            ],
        ],
    }
}

/// Yes/no confirmation attached to a delete prompt.
pub fn delete_confirmation(local_id: i64) -> KeyboardSpec {
    KeyboardSpec::Inline {
        rows: vec![vec![
            InlineButton::new("✅ Yes, delete", CallbackAction::ConfirmDelete(local_id).encode()),
            InlineButton::new("❌ No, keep it", CallbackAction::CancelDelete.encode()),
        ]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::CallbackAction;

    #[test]
    fn test_inline_payloads_round_trip_through_decoder() {
        let keyboards = [
            note_list_actions(),
            note_edit_actions(7),
            delete_confirmation(7),
        ];
        for keyboard in keyboards {
            if let KeyboardSpec::Inline { rows } = keyboard {
                for button in rows.into_iter().flatten() {
                    assert!(
                        CallbackAction::decode(&button.data).is_some(),
                        "undecodable payload: {}",
                        button.data
                    );
                }
            } else {
                panic!("expected inline keyboard");
            }
        }
    }
}
