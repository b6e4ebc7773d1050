//! Event classification: one ordered routing table instead of handler
//! registration order deciding precedence.
//!
//! Precedence, evaluated once per inbound text event:
//! 1. a recognized `/command` — commands always win, even mid-flow
//!    (issuing one abandons the active flow, last-flow-wins),
//! 2. the active conversation state consumes the text,
//! 3. a known button label,
//! 4. fallback.

use crate::keyboards;

/// Every command the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    About,
    Sum,
    Weather,
    NoteAdd,
    NoteList,
    NoteFind,
    NoteEdit,
    NoteDel,
    NoteCount,
    NoteExport,
}

impl Command {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "about" => Some(Self::About),
            "sum" => Some(Self::Sum),
            "weather" => Some(Self::Weather),
            "note_add" => Some(Self::NoteAdd),
            "note_list" => Some(Self::NoteList),
            "note_find" => Some(Self::NoteFind),
            "note_edit" => Some(Self::NoteEdit),
            "note_del" => Some(Self::NoteDel),
            "note_count" => Some(Self::NoteCount),
            "note_export" => Some(Self::NoteExport),
            _ => None,
        }
    }
}

/// Parse `/command[@botname] [args…]`. Unrecognized commands return
/// `None` and fall through the table like ordinary text.
pub fn parse_command(text: &str) -> Option<(Command, &str)> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (word, args) = match rest.split_once(char::is_whitespace) {
        Some((word, args)) => (word, args.trim()),
        None => (rest, ""),
    };
    // Group chats address commands as /cmd@BotName.
    let word = word.split('@').next().unwrap_or(word);
    Command::from_word(word).map(|command| (command, args))
}

/// Known reply-button labels, in display order.
const BUTTON_LABELS: &[&str] = &[
    keyboards::BTN_ABOUT,
    keyboards::BTN_WEATHER,
    keyboards::BTN_HELP,
    keyboards::BTN_NOTES,
    keyboards::BTN_HIDE_KEYBOARD,
    keyboards::BTN_NOTE_NEW,
    keyboards::BTN_NOTE_LIST,
    keyboards::BTN_NOTE_SEARCH,
    keyboards::BTN_NOTE_STATS,
    keyboards::BTN_NOTE_EXPORT,
    keyboards::BTN_MAIN_MENU,
];

/// Where a text event is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Command(Command, String),
    /// Consumed by the user's active conversation state.
    Flow(String),
    Button(&'static str),
    Fallback(String),
}

pub fn classify(text: &str, has_active_flow: bool) -> Route {
    if let Some((command, args)) = parse_command(text) {
        return Route::Command(command, args.to_string());
    }
    if has_active_flow {
        return Route::Flow(text.to_string());
    }
    if let Some(label) = BUTTON_LABELS.iter().copied().find(|label| *label == text.trim()) {
        return Route::Button(label);
    }
    Route::Fallback(text.to_string())
}

/// Which note field an inline edit button targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    Title,
    Content,
    Tags,
    Category,
}

impl NoteField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Content => "content",
            Self::Tags => "tags",
            Self::Category => "category",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "title" => Some(Self::Title),
            "content" => Some(Self::Content),
            "tags" => Some(Self::Tags),
            "category" => Some(Self::Category),
            _ => None,
        }
    }
}

/// One-shot menu actions reachable from inline keyboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    List,
    AddNew,
    Search,
    Stats,
    Export,
}

/// Callback payloads, decoded once into a tagged variant and then
/// matched exhaustively; no string-prefix chains in handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Show the delete confirmation for a note.
    RequestDelete(i64),
    /// The user confirmed deletion.
    ConfirmDelete(i64),
    /// The user backed out of deletion.
    CancelDelete,
    /// An edit-field button under a note.
    EditField(i64, NoteField),
    Menu(MenuAction),
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            Self::RequestDelete(id) => format!("delete_note:{}", id),
            Self::ConfirmDelete(id) => format!("confirm_delete:{}", id),
            Self::CancelDelete => "cancel_delete".to_string(),
            Self::EditField(id, field) => format!("edit_{}:{}", field.as_str(), id),
            Self::Menu(MenuAction::List) => "notes_list".to_string(),
            Self::Menu(MenuAction::AddNew) => "notes_add_new".to_string(),
            Self::Menu(MenuAction::Search) => "notes_search".to_string(),
            Self::Menu(MenuAction::Stats) => "notes_stats".to_string(),
            Self::Menu(MenuAction::Export) => "notes_export".to_string(),
        }
    }

    pub fn decode(data: &str) -> Option<Self> {
        match data {
            "cancel_delete" => return Some(Self::CancelDelete),
            "notes_list" => return Some(Self::Menu(MenuAction::List)),
            "notes_add_new" => return Some(Self::Menu(MenuAction::AddNew)),
            "notes_search" => return Some(Self::Menu(MenuAction::Search)),
            "notes_stats" => return Some(Self::Menu(MenuAction::Stats)),
            "notes_export" => return Some(Self::Menu(MenuAction::Export)),
            _ => {}
        }
        let (head, id) = data.split_once(':')?;
        let id: i64 = id.parse().ok()?;
        match head {
            "delete_note" => Some(Self::RequestDelete(id)),
            "confirm_delete" => Some(Self::ConfirmDelete(id)),
            _ => {
                let field = head.strip_prefix("edit_")?;
                Some(Self::EditField(id, NoteField::from_str(field)?))
            }
        }
    }
}
