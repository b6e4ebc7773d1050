// notebot/crates/notebot/src/lib.rs

pub mod bot;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod export;
pub mod flows;
pub mod keyboards;
pub mod notes_db;
pub mod telegram;
pub mod telemetry;
pub mod transport;
pub mod weather;

// Public API exports
pub use bot::{run, BotService};
pub use config::Config;
pub use conversation::{ConversationState, ConversationTracker};
pub use dispatch::{classify, CallbackAction, Command, MenuAction, NoteField, Route};
pub use notes_db::{Note, NoteStore, NoteUpdate, NotesDatabase, User};
pub use transport::{ChatTransport, Event, EventPayload, InlineButton, KeyboardSpec};
pub use weather::{WeatherClient, WeatherReport};
