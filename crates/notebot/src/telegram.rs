//! Telegram Bot API adapter: long polling in, `ChatTransport` out.
//!
//! Only the handful of methods the bot needs are wrapped. Responses
//! are checked for the API-level `ok` flag; a `false` becomes an error
//! carrying the server's description.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::transport::{ChatTransport, Event, EventPayload, KeyboardSpec};

pub struct TelegramTransport {
    api_base: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    from: Option<TgUser>,
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: TgUser,
    message: Option<Message>,
    data: Option<String>,
}

impl TelegramTransport {
    pub fn new(token: &str, timeout: Duration) -> Self {
        Self::with_api_base(format!("https://api.telegram.org/bot{}", token), timeout)
    }

    pub(crate) fn with_api_base(api_base: String, timeout: Duration) -> Self {
        Self {
            api_base,
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    async fn invoke<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> Result<T> {
        let response: ApiResponse<T> = self
            .http_client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?
            .json()
            .await
            .with_context(|| format!("malformed {} response", method))?;

        if !response.ok {
            bail!(
                "{} rejected: {}",
                method,
                response.description.unwrap_or_else(|| "no description".to_string())
            );
        }
        response
            .result
            .with_context(|| format!("{} response missing result", method))
    }

    /// One long-poll round. Returns `(update_id, event)` pairs; updates
    /// the bot does not understand still carry their id so the caller
    /// can advance the offset past them.
    pub async fn poll_updates(
        &self,
        offset: i64,
        timeout_seconds: u64,
    ) -> Result<Vec<(i64, Option<Event>)>> {
        let updates: Vec<Update> = self
            .invoke(
                "getUpdates",
                &json!({
                    "offset": offset,
                    "timeout": timeout_seconds,
                    "allowed_updates": ["message", "callback_query"],
                }),
            )
            .await?;
        debug!("Received {} updates", updates.len());
        Ok(updates
            .into_iter()
            .map(|update| (update.update_id, into_event(update)))
            .collect())
    }
}

fn into_event(update: Update) -> Option<Event> {
    if let Some(message) = update.message {
        let from = message.from?;
        let text = message.text?;
        return Some(Event {
            user_id: from.id,
            chat_id: message.chat.id,
            username: from.username,
            first_name: from.first_name,
            last_name: from.last_name,
            payload: EventPayload::Text(text),
        });
    }
    if let Some(callback) = update.callback_query {
        let message = callback.message?;
        let data = callback.data?;
        return Some(Event {
            user_id: callback.from.id,
            chat_id: message.chat.id,
            username: callback.from.username,
            first_name: callback.from.first_name,
            last_name: callback.from.last_name,
            payload: EventPayload::Callback {
                callback_id: callback.id,
                message_id: message.message_id,
                data,
            },
        });
    }
    None
}

/// Lower a [`KeyboardSpec`] into the wire `reply_markup` object.
fn reply_markup(keyboard: &KeyboardSpec) -> Value {
    match keyboard {
        KeyboardSpec::Reply { rows } => json!({
            "keyboard": rows
                .iter()
                .map(|row| row.iter().map(|text| json!({ "text": text })).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            "resize_keyboard": true,
        }),
        KeyboardSpec::Inline { rows } => json!({
            "inline_keyboard": rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| {
                            json!({ "text": button.label, "callback_data": button.data })
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>(),
        }),
        KeyboardSpec::Remove => json!({ "remove_keyboard": true }),
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<KeyboardSpec>,
    ) -> Result<()> {
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = reply_markup(&keyboard);
        }
        self.invoke::<Value>("sendMessage", &payload).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<()> {
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part(
                "document",
                multipart::Part::bytes(bytes).file_name(filename.to_string()),
            );

        let response: ApiResponse<Value> = self
            .http_client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .context("sendDocument request failed")?
            .json()
            .await
            .context("malformed sendDocument response")?;
        if !response.ok {
            bail!(
                "sendDocument rejected: {}",
                response.description.unwrap_or_else(|| "no description".to_string())
            );
        }
        Ok(())
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        self.invoke::<Value>(
            "editMessageText",
            &json!({ "chat_id": chat_id, "message_id": message_id, "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, toast: Option<&str>) -> Result<()> {
        let mut payload = json!({ "callback_query_id": callback_id });
        if let Some(toast) = toast {
            payload["text"] = json!(toast);
        }
        // answerCallbackQuery returns a bare boolean result.
        let response: ApiResponse<bool> = self
            .http_client
            .post(self.method_url("answerCallbackQuery"))
            .json(&payload)
            .send()
            .await
            .context("answerCallbackQuery request failed")?
            .json()
            .await
            .context("malformed answerCallbackQuery response")?;
        if !response.ok {
            bail!(
                "answerCallbackQuery rejected: {}",
                response.description.unwrap_or_else(|| "no description".to_string())
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_for(server: &mockito::Server) -> TelegramTransport {
        TelegramTransport::with_api_base(server.url(), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_poll_maps_messages_and_callbacks() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/getUpdates")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ok":true,"result":[
                    {"update_id":10,"message":{"message_id":1,
                        "from":{"id":7,"username":"ann","first_name":"Ann"},
                        "chat":{"id":7},"text":"/start"}},
                    {"update_id":11,"callback_query":{"id":"cb9",
                        "from":{"id":7,"username":"ann","first_name":"Ann"},
                        "message":{"message_id":2,"chat":{"id":7}},
                        "data":"cancel_delete"}},
                    {"update_id":12,"message":{"message_id":3,
                        "from":{"id":7,"first_name":"Ann"},"chat":{"id":7}}}
                ]}"#,
            )
            .create_async()
            .await;

        let transport = transport_for(&server);
        let updates = transport.poll_updates(0, 0).await.expect("updates");
        assert_eq!(updates.len(), 3);

        let (id, event) = &updates[0];
        assert_eq!(*id, 10);
        let event = event.as_ref().expect("text event");
        assert_eq!(event.user_id, 7);
        assert!(matches!(&event.payload, EventPayload::Text(text) if text == "/start"));

        let (_, event) = &updates[1];
        let event = event.as_ref().expect("callback event");
        assert!(matches!(
            &event.payload,
            EventPayload::Callback { callback_id, message_id: 2, data }
                if callback_id == "cb9" && data == "cancel_delete"
        ));

        // Textless message: id still advances, no event.
        assert_eq!(updates[2].0, 12);
        assert!(updates[2].1.is_none());
    }

    #[tokio::test]
    async fn test_api_level_error_becomes_err() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sendMessage")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":false,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let err = transport
            .send_message(1, "hi", None)
            .await
            .expect_err("rejected send");
        assert!(err.to_string().contains("chat not found"));
    }

    #[test]
    fn test_reply_markup_shapes() {
        let reply = reply_markup(&crate::keyboards::cancel_keyboard());
        assert!(reply["keyboard"].is_array());
        assert_eq!(reply["resize_keyboard"], json!(true));

        let inline = reply_markup(&crate::keyboards::delete_confirmation(4));
        let buttons = inline["inline_keyboard"][0].as_array().expect("row");
        assert_eq!(buttons[0]["callback_data"], json!("confirm_delete:4"));

        let removed = reply_markup(&KeyboardSpec::Remove);
        assert_eq!(removed, json!({ "remove_keyboard": true }));
    }
}
