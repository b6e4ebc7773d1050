//! One-shot command handlers: each takes a single event, produces its
//! replies and finishes. Anything multi-step lives in `flows`.

use chrono::Utc;
use tracing::info;

use crate::bot::BotService;
use crate::export::render_export;
use crate::keyboards;
use crate::transport::Event;
use crate::weather::format_report;

const START_TEXT: &str = "\
👋 Hi! I'm your notes assistant.

Available commands:
• /start — show this message
• /help — detailed help
• /about — about this bot
• /sum 5 10 15 — add numbers
• /weather — current weather
• /note_add — create a note
• /note_list — list your notes
• /note_find — search your notes

Or use the buttons below ⬇️";

const HELP_TEXT: &str = "\
🤝 Help

Notes:
• /note_add — create a note (title, then content)
• /note_list — list your notes
• /note_find [text] — search titles and contents
• /note_edit [ID] — edit a note
• /note_del [ID] — delete a note
• /note_count — notes statistics
• /note_export — download all notes as a text file

Other:
• /sum 5 10 15 — add numbers
• /weather — current weather
• /about — about this bot

Send \"cancel\" at any step to abort an operation.";

const ABOUT_TEXT: &str = "\
❓ About

I keep your notes safe and close at hand: create, search, edit and
export them right from the chat. I can also add numbers for you and
report the current weather.

Send /help for the full command list.";

impl BotService {
    pub(crate) async fn cmd_start(&self, event: &Event) {
        self.say(event.chat_id, START_TEXT, Some(keyboards::main_menu()))
            .await;
    }

    pub(crate) async fn cmd_help(&self, event: &Event) {
        self.say(event.chat_id, HELP_TEXT, Some(keyboards::main_menu()))
            .await;
    }

    pub(crate) async fn cmd_about(&self, event: &Event) {
        self.say(event.chat_id, ABOUT_TEXT, Some(keyboards::main_menu()))
            .await;
    }

    pub(crate) async fn cmd_hide_keyboard(&self, event: &Event) {
        self.say(
            event.chat_id,
            "⌨️ Keyboard hidden. Send /start to bring it back.",
            Some(keyboards::remove_keyboard()),
        )
        .await;
    }

    pub(crate) async fn cmd_notes_menu(&self, event: &Event) {
        self.say(
            event.chat_id,
            "📝 Notes manager\n\nPick an action:",
            Some(keyboards::notes_menu()),
        )
        .await;
    }

    pub(crate) async fn cmd_main_menu(&self, event: &Event) {
        self.say(event.chat_id, "🔙 Main menu:", Some(keyboards::main_menu()))
            .await;
    }

    /// `/sum 5 10 15` → "5 + 10 + 15 = 30". Any non-integer word fails
    /// the whole command with a usage hint.
    pub(crate) async fn cmd_sum(&self, event: &Event, args: &str) {
        if args.trim().is_empty() {
            self.say(
                event.chat_id,
                "🔢 Usage: /sum 5 10 15\n\nSend the numbers to add after the command.",
                None,
            )
            .await;
            return;
        }

        let mut numbers = Vec::new();
        for word in args.split_whitespace() {
            match word.parse::<i64>() {
                Ok(n) => numbers.push(n),
                Err(_) => {
                    self.say(
                        event.chat_id,
                        &format!("❌ \"{}\" is not a whole number. Example: /sum 5 10 15", word),
                        None,
                    )
                    .await;
                    return;
                }
            }
        }

        let total: i64 = numbers.iter().sum();
        let expression = numbers
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" + ");
        self.say(
            event.chat_id,
            &format!("🔢 Result: {} = {}", expression, total),
            None,
        )
        .await;
    }

    /// Weather is the one handler that talks to the network; the
    /// placeholder message goes out before the request starts.
    pub(crate) async fn cmd_weather(&self, event: &Event) {
        self.say(event.chat_id, "⏳ Fetching weather data...", None).await;
        match self
            .weather
            .fetch_current(self.config.weather_latitude, self.config.weather_longitude)
            .await
        {
            Ok(report) => {
                self.say(event.chat_id, &format_report(&report), None).await;
            }
            Err(e) => {
                tracing::error!("Weather lookup failed: {:#}", e);
                self.say(
                    event.chat_id,
                    "❌ The weather service is temporarily unavailable. Please try again later.",
                    None,
                )
                .await;
            }
        }
    }

    pub(crate) async fn cmd_note_list(&self, event: &Event) {
        let notes = self
            .store
            .get_notes(event.user_id, self.config.list_fetch_limit, 0, None);
        if notes.is_empty() {
            self.say(
                event.chat_id,
                "📭 You have no notes yet.\n\nAdd your first one with /note_add!",
                None,
            )
            .await;
            return;
        }

        let mut response = String::from("📋 Your notes:\n\n");
        let shown = self.config.list_preview_count;
        for (i, note) in notes.iter().take(shown).enumerate() {
            let preview: String = note.content.chars().take(50).collect();
            let ellipsis = if note.content.chars().count() > 50 { "..." } else { "" };
            response.push_str(&format!(
                "{}. {}\n   📅 {} | 📁 {}\n   {}{}\n   ID: {}\n\n",
                i + 1,
                note.title,
                note.created_at.format("%d.%m.%Y"),
                note.category,
                preview,
                ellipsis,
                note.local_id,
            ));
        }
        if notes.len() > shown {
            response.push_str(&format!("... and {} more notes\n\n", notes.len() - shown));
        }
        response.push_str("Use /note_find to search or /note_del to delete.");

        self.say_with_inline(event.chat_id, &response, keyboards::note_list_actions())
            .await;
    }

    pub(crate) async fn cmd_note_count(&self, event: &Event) {
        let total = self.store.count_notes(event.user_id, None);
        let text = if total == 0 {
            "📊 Notes statistics\n\nTotal notes: 0\n\nAdd your first one with /note_add!"
                .to_string()
        } else {
            format!(
                "📊 Notes statistics\n\n\
                 Total notes: {}\n\n\
                 • /note_list — view them\n\
                 • /note_find — search\n\
                 • /note_export — download everything",
                total
            )
        };
        self.say(event.chat_id, &text, None).await;
    }

    /// Full export as an attached plain-text document.
    pub(crate) async fn cmd_note_export(&self, event: &Event) {
        let notes = self.store.export_all(event.user_id);
        if notes.is_empty() {
            self.say(event.chat_id, "📭 You have no notes to export.", None)
                .await;
            return;
        }

        let display_name = self
            .store
            .get_user(event.user_id)
            .map(|user| user.display_name())
            .unwrap_or_else(|| format!("user {}", event.user_id));
        let document = render_export(&display_name, Utc::now(), &notes);
        info!(
            "NOTE_EXPORT: user_id={}, notes={}, bytes={}",
            event.user_id,
            notes.len(),
            document.len()
        );

        if let Err(e) = self
            .transport
            .send_document(
                event.chat_id,
                "notes_export.txt",
                document.into_bytes(),
                &format!("📁 Notes export\nTotal notes: {}", notes.len()),
            )
            .await
        {
            tracing::error!("Failed to send export document: {:#}", e);
            self.say(
                event.chat_id,
                "❌ Could not send the export file. Please try again.",
                None,
            )
            .await;
        }
    }
}
