//! Multi-step conversation flows: add, edit-select, delete-select and
//! search. Each handler interprets one free-text message according to
//! the user's active state and either advances, re-prompts, or clears
//! the flow.

use tracing::{info, warn};

use crate::bot::BotService;
use crate::conversation::ConversationState;
use crate::keyboards;
use crate::notes_db::{MAX_CONTENT_CHARS, MAX_TITLE_CHARS};
use crate::transport::Event;

/// The literal cancel token accepted in every state.
fn is_cancel(text: &str) -> bool {
    let text = text.trim();
    text == keyboards::BTN_CANCEL || text.eq_ignore_ascii_case("cancel")
}

impl BotService {
    /// Route one free-text message through the user's active state.
    /// Precondition: the dispatcher already established a state exists.
    pub(crate) async fn handle_flow_text(&self, event: &Event, text: &str) {
        let Some(state) = self.conversations.state(event.user_id) else {
            // Raced with a concurrent clear; treat as unrecognized input.
            self.handle_fallback(event).await;
            return;
        };

        if is_cancel(text) {
            self.conversations.clear(event.user_id);
            self.say(event.chat_id, "❌ Operation cancelled.", Some(keyboards::remove_keyboard()))
                .await;
            return;
        }

        match state {
            ConversationState::AddingTitle => self.handle_title_input(event, text).await,
            ConversationState::AddingContent { title } => {
                self.handle_content_input(event, &title, text).await
            }
            ConversationState::EditingSelectId => self.handle_edit_id_input(event, text).await,
            ConversationState::DeletingSelectId => self.handle_delete_id_input(event, text).await,
            ConversationState::Searching => self.run_search(event, text.trim()).await,
        }
    }

    // ===== Add-note flow =====

    pub(crate) async fn begin_add_note(&self, event: &Event) {
        info!("NOTE_ADD started: user_id={}", event.user_id);
        self.conversations
            .begin(event.user_id, ConversationState::AddingTitle);
        self.say(
            event.chat_id,
            &format!(
                "📝 Adding a new note\n\n\
                 Step 1/2: enter the note title\n\
                 (at most {} characters)",
                MAX_TITLE_CHARS
            ),
            Some(keyboards::cancel_keyboard()),
        )
        .await;
    }

    async fn handle_title_input(&self, event: &Event, text: &str) {
        let title = text.trim();
        if title.chars().count() > MAX_TITLE_CHARS {
            // Validation failure: stay in AddingTitle and let the user retry.
            self.say(
                event.chat_id,
                &format!(
                    "❌ That title is too long (max {} characters). Try again:",
                    MAX_TITLE_CHARS
                ),
                None,
            )
            .await;
            return;
        }

        self.conversations.begin(
            event.user_id,
            ConversationState::AddingContent {
                title: title.to_string(),
            },
        );
        self.say(
            event.chat_id,
            &format!(
                "📝 Title saved: {}\n\n\
                 Step 2/2: enter the note content\n\
                 (at most {} characters)",
                title, MAX_CONTENT_CHARS
            ),
            Some(keyboards::cancel_keyboard()),
        )
        .await;
    }

    async fn handle_content_input(&self, event: &Event, title: &str, text: &str) {
        let content = text.trim();
        if content.chars().count() > MAX_CONTENT_CHARS {
            self.say(
                event.chat_id,
                &format!(
                    "❌ That content is too long (max {} characters). Try again:",
                    MAX_CONTENT_CHARS
                ),
                None,
            )
            .await;
            return;
        }

        // The note is written once, here, with both parts known; a cancel
        // at any earlier step never leaves a partial row behind.
        match self.store.add_note(event.user_id, title, content, None, None) {
            Some(local_id) => {
                self.conversations.clear(event.user_id);
                info!(
                    "NOTE_ADD completed: user_id={}, local_id={}",
                    event.user_id, local_id
                );
                self.say(event.chat_id, "✅ Note saved!", Some(keyboards::remove_keyboard()))
                    .await;
                self.say_with_inline(
                    event.chat_id,
                    &format!(
                        "Title: {}\n\
                         Note ID: {}\n\n\
                         View your notes: /note_list\n\
                         Edit this note: /note_edit {}",
                        title, local_id, local_id
                    ),
                    keyboards::note_list_actions(),
                )
                .await;
            }
            None => {
                // Storage already logged the cause; the flow ends here, no retry.
                self.conversations.clear(event.user_id);
                self.say(
                    event.chat_id,
                    "❌ Could not save the note. Please try again.",
                    Some(keyboards::remove_keyboard()),
                )
                .await;
            }
        }
    }

    // ===== Edit flow (id selection) =====

    pub(crate) async fn begin_edit_select(&self, event: &Event) {
        info!("NOTE_EDIT started: user_id={}", event.user_id);
        self.conversations
            .begin(event.user_id, ConversationState::EditingSelectId);
        self.say(
            event.chat_id,
            "✏️ Editing a note\n\n\
             Enter the ID of the note to edit.\n\
             You can look IDs up with /note_list, or send \"cancel\" to stop.",
            Some(keyboards::cancel_keyboard()),
        )
        .await;
    }

    async fn handle_edit_id_input(&self, event: &Event, text: &str) {
        match text.trim().parse::<i64>() {
            Ok(local_id) => self.show_note_for_edit(event, local_id).await,
            Err(_) => {
                self.say(
                    event.chat_id,
                    "❌ That is not a numeric ID. Enter a number, or send \"cancel\":",
                    None,
                )
                .await;
            }
        }
    }

    /// Present the edit menu for a note. Clears the flow either way:
    /// not-found ends the interaction, found hands over to one-shot
    /// inline actions.
    pub(crate) async fn show_note_for_edit(&self, event: &Event, local_id: i64) {
        self.conversations.clear(event.user_id);
        let Some(note) = self.store.get_note(event.user_id, local_id) else {
            self.say(
                event.chat_id,
                &format!("❌ Note with ID {} was not found.", local_id),
                None,
            )
            .await;
            return;
        };

        let tags_line = note
            .tags
            .as_ref()
            .filter(|tags| !tags.is_empty())
            .map(|tags| tags.join(", "))
            .unwrap_or_else(|| "none".to_string());
        let preview: String = note.content.chars().take(500).collect();
        let ellipsis = if note.content.chars().count() > 500 { "..." } else { "" };

        self.say_with_inline(
            event.chat_id,
            &format!(
                "✏️ Editing note #{}\n\n\
                 Title: {}\n\
                 Category: {}\n\
                 Tags: {}\n\
                 Created: {}\n\
                 Updated: {}\n\n\
                 Content:\n{}{}\n\n\
                 Pick what to change:",
                note.local_id,
                note.title,
                note.category,
                tags_line,
                note.created_at.format("%d.%m.%Y %H:%M"),
                note.updated_at.format("%d.%m.%Y %H:%M"),
                preview,
                ellipsis,
            ),
            keyboards::note_edit_actions(note.local_id),
        )
        .await;
    }

    // ===== Delete flow (id selection) =====

    pub(crate) async fn begin_delete_select(&self, event: &Event) {
        info!("NOTE_DEL started: user_id={}", event.user_id);
        self.conversations
            .begin(event.user_id, ConversationState::DeletingSelectId);
        self.say(
            event.chat_id,
            "🗑 Deleting a note\n\n\
             Enter the ID of the note to delete.\n\
             You can look IDs up with /note_list, or send \"cancel\" to stop.",
            Some(keyboards::cancel_keyboard()),
        )
        .await;
    }

    async fn handle_delete_id_input(&self, event: &Event, text: &str) {
        match text.trim().parse::<i64>() {
            Ok(local_id) => self.confirm_note_delete(event, local_id).await,
            Err(_) => {
                self.say(
                    event.chat_id,
                    "❌ That is not a numeric ID. Enter a number, or send \"cancel\":",
                    None,
                )
                .await;
            }
        }
    }

    /// Ask for confirmation before deleting. No store mutation yet.
    pub(crate) async fn confirm_note_delete(&self, event: &Event, local_id: i64) {
        self.conversations.clear(event.user_id);
        let Some(note) = self.store.get_note(event.user_id, local_id) else {
            self.say(
                event.chat_id,
                &format!("❌ Note with ID {} was not found.", local_id),
                None,
            )
            .await;
            return;
        };

        self.say_with_inline(
            event.chat_id,
            &format!(
                "🗑 Confirm deletion\n\n\
                 Delete this note?\n\n\
                 {}\n\
                 ID: {}\n\
                 Category: {}\n\n\
                 ⚠️ This cannot be undone!",
                note.title, note.local_id, note.category
            ),
            keyboards::delete_confirmation(note.local_id),
        )
        .await;
    }

    // ===== Search flow =====

    pub(crate) async fn begin_search(&self, event: &Event) {
        info!("NOTE_FIND started: user_id={}", event.user_id);
        self.conversations
            .begin(event.user_id, ConversationState::Searching);
        self.say(
            event.chat_id,
            "🔍 Searching notes\n\n\
             Enter the text to search for.\n\
             Titles and contents are both searched.",
            Some(keyboards::cancel_keyboard()),
        )
        .await;
    }

    /// Execute a search and clear the flow unconditionally; an empty
    /// result set is a normal outcome.
    pub(crate) async fn run_search(&self, event: &Event, query: &str) {
        self.conversations.clear(event.user_id);
        let notes = self.store.search_notes(event.user_id, query, true);
        info!(
            "NOTE_SEARCH done: user_id={}, found={}",
            event.user_id,
            notes.len()
        );

        if notes.is_empty() {
            self.say(
                event.chat_id,
                &format!(
                    "🔍 Search results for: {}\n\n\
                     ❌ No notes found.\n\n\
                     Try a different query, or list everything with /note_list.",
                    query
                ),
                Some(keyboards::remove_keyboard()),
            )
            .await;
            return;
        }

        let mut response = format!(
            "🔍 Search results for: {}\n\nFound notes: {}\n\n",
            query,
            notes.len()
        );
        let shown = self.config.search_preview_count;
        for (i, note) in notes.iter().take(shown).enumerate() {
            let preview: String = note.content.chars().take(100).collect();
            let ellipsis = if note.content.chars().count() > 100 { "..." } else { "" };
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
            response.push_str(&format!("... and {} more notes\n", notes.len() - shown));
        }
        response.push_str("\nUse /note_list to see everything or /note_del to delete.");

        self.say(event.chat_id, &response, Some(keyboards::remove_keyboard()))
            .await;
    }

    pub(crate) async fn handle_fallback(&self, event: &Event) {
        warn!(
            "Unrecognized input from user {} (len {})",
            event.user_id,
            match &event.payload {
                crate::transport::EventPayload::Text(text) => text.len(),
                _ => 0,
            }
        );
        self.say(
            event.chat_id,
            "I don't understand that. 😕\n\n\
             Use the menu buttons below, or /help for the command list.",
            Some(keyboards::main_menu()),
        )
        .await;
    }
}
