//! Chat transport boundary.
//!
//! The bot core only knows this trait and these event shapes; the
//! concrete wire client lives behind it (see `telegram`). Effects are
//! fire-and-forget from the core's point of view: a failed send is
//! logged by the caller and never alters dispatch state.

use async_trait::async_trait;

/// An inbound event delivered by the transport.
#[derive(Debug, Clone)]
pub struct Event {
    pub user_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone)]
pub enum EventPayload {
    /// A plain message: command, button label, or free text.
    Text(String),
    /// A button-press callback attached to a previously sent message.
    Callback {
        callback_id: String,
        message_id: i64,
        data: String,
    },
}

/// A renderable keyboard, kept transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardSpec {
    /// Rows of reply buttons shown under the input field.
    Reply { rows: Vec<Vec<String>> },
    /// Rows of inline buttons attached to a message.
    Inline { rows: Vec<Vec<InlineButton>> },
    /// Remove any visible reply keyboard.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Capability set consumed from the chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<KeyboardSpec>,
    ) -> anyhow::Result<()>;

    async fn send_document(
        &self,
        chat_id: i64,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> anyhow::Result<()>;

    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> anyhow::Result<()>;

    async fn answer_callback(&self, callback_id: &str, toast: Option<&str>) -> anyhow::Result<()>;
}

/// Outbound effect captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum SentEffect {
    Message {
        chat_id: i64,
        text: String,
        keyboard: Option<KeyboardSpec>,
    },
    Document {
        chat_id: i64,
        filename: String,
        bytes: Vec<u8>,
        caption: String,
    },
    Edit {
        chat_id: i64,
        message_id: i64,
        text: String,
    },
    CallbackAnswer {
        callback_id: String,
        toast: Option<String>,
    },
}

/// In-memory transport that records every effect instead of sending it.
/// Backs the conversation-scenario tests.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    effects: std::sync::Arc<std::sync::Mutex<Vec<SentEffect>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> Vec<SentEffect> {
        self.effects.lock().expect("effects lock").clone()
    }

    /// Text of every plain message sent so far, in order.
    pub fn message_texts(&self) -> Vec<String> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                SentEffect::Message { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_message_text(&self) -> Option<String> {
        self.message_texts().pop()
    }

    fn record(&self, effect: SentEffect) {
        self.effects.lock().expect("effects lock").push(effect);
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<KeyboardSpec>,
    ) -> anyhow::Result<()> {
        self.record(SentEffect::Message {
            chat_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> anyhow::Result<()> {
        self.record(SentEffect::Document {
            chat_id,
            filename: filename.to_string(),
            bytes,
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> anyhow::Result<()> {
        self.record(SentEffect::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, toast: Option<&str>) -> anyhow::Result<()> {
        self.record(SentEffect::CallbackAnswer {
            callback_id: callback_id.to_string(),
            toast: toast.map(str::to_string),
        });
        Ok(())
    }
}
