//! Bot core: owns storage, conversation state, the weather client and
//! the transport, and routes every inbound event through the dispatch
//! table. Command and flow handlers live in `commands` and `flows`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::conversation::ConversationTracker;
use crate::dispatch::{classify, CallbackAction, Command, MenuAction, Route};
use crate::keyboards;
use crate::notes_db::{NoteStore, NotesDatabase};
use crate::telegram::TelegramTransport;
use crate::transport::{ChatTransport, Event, EventPayload, KeyboardSpec};
use crate::weather::WeatherClient;

pub struct BotService {
    pub(crate) store: NoteStore,
    pub(crate) conversations: ConversationTracker,
    pub(crate) weather: WeatherClient,
    pub(crate) transport: Arc<dyn ChatTransport>,
    pub(crate) config: Config,
}

impl BotService {
    pub fn new(store: NoteStore, transport: Arc<dyn ChatTransport>, config: Config) -> Self {
        let weather = WeatherClient::new(
            config.weather_base_url.clone(),
            Duration::from_secs(config.weather_timeout_seconds),
        );
        Self {
            store,
            conversations: ConversationTracker::new(),
            weather,
            transport,
            config,
        }
    }

    /// Send a reply, logging (but otherwise ignoring) transport errors.
    /// A failed send never alters conversation or storage state.
    pub(crate) async fn say(&self, chat_id: i64, text: &str, keyboard: Option<KeyboardSpec>) {
        if let Err(e) = self.transport.send_message(chat_id, text, keyboard).await {
            error!("Failed to send message to chat {}: {:#}", chat_id, e);
        }
    }

    pub(crate) async fn say_with_inline(&self, chat_id: i64, text: &str, keyboard: KeyboardSpec) {
        self.say(chat_id, text, Some(keyboard)).await;
    }

    async fn answer(&self, callback_id: &str, toast: Option<&str>) {
        if let Err(e) = self.transport.answer_callback(callback_id, toast).await {
            error!("Failed to answer callback {}: {:#}", callback_id, e);
        }
    }

    async fn edit(&self, chat_id: i64, message_id: i64, text: &str) {
        if let Err(e) = self.transport.edit_message(chat_id, message_id, text).await {
            error!("Failed to edit message {} in chat {}: {:#}", message_id, chat_id, e);
        }
    }

    /// Entry point for every inbound event.
    pub async fn handle_event(&self, event: Event) {
        // Any contact refreshes the user row; a failed write is logged
        // by the store and must not block the reply.
        self.store.upsert_user(
            event.user_id,
            event.username.as_deref(),
            event.first_name.as_deref(),
            event.last_name.as_deref(),
        );

        match event.payload.clone() {
            EventPayload::Text(text) => self.handle_text(&event, &text).await,
            EventPayload::Callback {
                callback_id,
                message_id,
                data,
            } => {
                self.handle_callback(&event, &callback_id, message_id, &data)
                    .await
            }
        }
    }

    async fn handle_text(&self, event: &Event, text: &str) {
        match classify(text, self.conversations.is_active(event.user_id)) {
            Route::Command(command, args) => {
                // A recognized command abandons whatever flow was active.
                self.conversations.clear(event.user_id);
                self.handle_command(event, command, &args).await;
            }
            Route::Flow(text) => self.handle_flow_text(event, &text).await,
            Route::Button(label) => self.handle_button(event, label).await,
            Route::Fallback(_) => self.handle_fallback(event).await,
        }
    }

    async fn handle_command(&self, event: &Event, command: Command, args: &str) {
        info!("Command {:?} from user {}", command, event.user_id);
        match command {
            Command::Start => self.cmd_start(event).await,
            Command::Help => self.cmd_help(event).await,
            Command::About => self.cmd_about(event).await,
            Command::Sum => self.cmd_sum(event, args).await,
            Command::Weather => self.cmd_weather(event).await,
            Command::NoteAdd => self.begin_add_note(event).await,
            Command::NoteList => self.cmd_note_list(event).await,
            Command::NoteCount => self.cmd_note_count(event).await,
            Command::NoteExport => self.cmd_note_export(event).await,
            // The id-taking commands accept an inline argument and only
            // open a selection flow when it is missing or malformed.
            Command::NoteFind => {
                let query = args.trim();
                if query.is_empty() {
                    self.begin_search(event).await;
                } else {
                    self.run_search(event, query).await;
                }
            }
            Command::NoteEdit => match args.trim().parse::<i64>() {
                Ok(local_id) => self.show_note_for_edit(event, local_id).await,
                Err(_) => self.begin_edit_select(event).await,
            },
            Command::NoteDel => match args.trim().parse::<i64>() {
                Ok(local_id) => self.confirm_note_delete(event, local_id).await,
                Err(_) => self.begin_delete_select(event).await,
            },
        }
    }

    async fn handle_button(&self, event: &Event, label: &'static str) {
        match label {
            keyboards::BTN_ABOUT => self.cmd_about(event).await,
            keyboards::BTN_WEATHER => self.cmd_weather(event).await,
            keyboards::BTN_HELP => self.cmd_help(event).await,
            keyboards::BTN_NOTES => self.cmd_notes_menu(event).await,
            keyboards::BTN_HIDE_KEYBOARD => self.cmd_hide_keyboard(event).await,
            keyboards::BTN_NOTE_NEW => self.begin_add_note(event).await,
            keyboards::BTN_NOTE_LIST => self.cmd_note_list(event).await,
            keyboards::BTN_NOTE_SEARCH => self.begin_search(event).await,
            keyboards::BTN_NOTE_STATS => self.cmd_note_count(event).await,
            keyboards::BTN_NOTE_EXPORT => self.cmd_note_export(event).await,
            keyboards::BTN_MAIN_MENU => self.cmd_main_menu(event).await,
            _ => self.handle_fallback(event).await,
        }
    }

    async fn handle_callback(
        &self,
        event: &Event,
        callback_id: &str,
        message_id: i64,
        data: &str,
    ) {
        let Some(action) = CallbackAction::decode(data) else {
            warn!("Undecodable callback payload from user {}", event.user_id);
            self.answer(callback_id, Some("Action not recognized")).await;
            return;
        };

        match action {
            CallbackAction::RequestDelete(local_id) => {
                self.answer(callback_id, None).await;
                self.confirm_note_delete(event, local_id).await;
            }
            CallbackAction::ConfirmDelete(local_id) => {
                if self.store.delete_note(event.user_id, local_id) {
                    info!(
                        "NOTE_DEL completed: user_id={}, local_id={}",
                        event.user_id, local_id
                    );
                    self.answer(callback_id, Some("Note deleted")).await;
                    self.edit(
                        event.chat_id,
                        message_id,
                        &format!("✅ Note {} deleted.", local_id),
                    )
                    .await;
                } else {
                    // Already gone, or never this user's note; same reply.
                    self.answer(callback_id, Some("Note not found")).await;
                    self.edit(
                        event.chat_id,
                        message_id,
                        &format!("❌ Note {} was not found.", local_id),
                    )
                    .await;
                }
            }
            CallbackAction::CancelDelete => {
                self.answer(callback_id, Some("Cancelled")).await;
                self.edit(event.chat_id, message_id, "❌ Deletion cancelled.").await;
            }
            CallbackAction::EditField(local_id, field) => {
                self.answer(callback_id, None).await;
                self.say(
                    event.chat_id,
                    &format!(
                        "✏️ Editing the {} of note #{} from chat is coming in an \
                         upcoming update. For now, delete the note with /note_del {} \
                         and create it again.",
                        field.as_str(),
                        local_id,
                        local_id
                    ),
                    None,
                )
                .await;
            }
            CallbackAction::Menu(action) => {
                self.answer(callback_id, None).await;
                match action {
                    MenuAction::List => self.cmd_note_list(event).await,
                    MenuAction::AddNew => self.begin_add_note(event).await,
                    MenuAction::Search => self.begin_search(event).await,
                    MenuAction::Stats => self.cmd_note_count(event).await,
                    MenuAction::Export => self.cmd_note_export(event).await,
                }
            }
        }
    }
}

/// Build everything from configuration and poll until the process is
/// stopped. Polling errors back off and retry; they never exit the loop.
pub async fn run(config: Config) -> Result<()> {
    config.log_summary();

    let db = NotesDatabase::open(&config.db_path)?;
    let transport = Arc::new(TelegramTransport::new(
        &config.bot_token,
        Duration::from_secs(config.poll_timeout_seconds + 10),
    ));
    let service = BotService::new(db.note_store(), transport.clone(), config.clone());

    info!("Bot started, polling for updates");
    let mut offset: i64 = 0;
    loop {
        match transport
            .poll_updates(offset, config.poll_timeout_seconds)
            .await
        {
            Ok(updates) => {
                for (update_id, event) in updates {
                    offset = offset.max(update_id + 1);
                    if let Some(event) = event {
                        service.handle_event(event).await;
                    }
                }
            }
            Err(e) => {
                error!("Polling failed: {:#}", e);
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
        }
    }
}
