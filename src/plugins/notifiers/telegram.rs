use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::models::MessageId;
use crate::plugins::traits::{IncomingCommand, Notifier};
use crate::utils::error::{AppError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const NOT_MODIFIED: &str = "message is not modified";

/// Bot API envelope: `{"ok": bool, "result": ..., "description": ...}`.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    description: Option<String>,
}

/// Talks to the Telegram Bot API in HTML parse mode with link previews off.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    poll_timeout: u64,
}

impl TelegramNotifier {
    /// Requires both `bot_token` and `chat_id`.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let (Some(bot_token), Some(chat_id)) = (&config.bot_token, &config.chat_id) else {
            return Err(AppError::Delivery(
                "telegram bot_token and chat_id are required".to_string(),
            ));
        };

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.clone(),
            chat_id: chat_id.clone(),
            poll_timeout: config.poll_timeout,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    async fn call(&self, method: &str, payload: Value, timeout: Duration) -> Result<Value> {
        let response = self
            .client
            .post(self.endpoint(method))
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        let body: ApiResponse = response.json().await.map_err(|e| {
            AppError::Delivery(format!("{} returned unreadable response ({}): {}", method, status, e))
        })?;

        if body.ok {
            Ok(body.result)
        } else {
            Err(AppError::Delivery(format!(
                "{} failed ({}): {}",
                method,
                status,
                body.description.unwrap_or_default()
            )))
        }
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<MessageId> {
        let result = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
                REQUEST_TIMEOUT,
            )
            .await?;

        result
            .get("message_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| AppError::Delivery("sendMessage returned no message_id".to_string()))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<MessageId> {
        self.send_message(&self.chat_id, text).await
    }

    async fn send_to(&self, chat_id: &str, text: &str) -> Result<MessageId> {
        self.send_message(chat_id, text).await
    }

    async fn edit(&self, message_id: MessageId, text: &str) -> Result<()> {
        let outcome = self
            .call(
                "editMessageText",
                json!({
                    "chat_id": self.chat_id,
                    "message_id": message_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
                REQUEST_TIMEOUT,
            )
            .await;

        match outcome {
            Ok(_) => Ok(()),
            Err(AppError::Delivery(msg)) if msg.contains(NOT_MODIFIED) => {
                debug!(message_id, "message already up to date");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, message_id: MessageId) -> Result<()> {
        self.call(
            "deleteMessage",
            json!({ "chat_id": self.chat_id, "message_id": message_id }),
            REQUEST_TIMEOUT,
        )
        .await
        .map(|_| ())
    }

    async fn receive_commands(&self, offset: i64) -> Result<Vec<IncomingCommand>> {
        let result = self
            .call(
                "getUpdates",
                json!({ "offset": offset, "timeout": self.poll_timeout }),
                Duration::from_secs(self.poll_timeout + 10),
            )
            .await?;

        let updates = result
            .as_array()
            .ok_or_else(|| AppError::Delivery("getUpdates returned no list".to_string()))?;

        Ok(updates.iter().filter_map(parse_update).collect())
    }
}

/// Updates without a text message still come back, with empty text, so the
/// caller can advance its offset past them.
fn parse_update(update: &Value) -> Option<IncomingCommand> {
    let update_id = update.get("update_id")?.as_i64()?;
    let message = update
        .get("message")
        .or_else(|| update.get("channel_post"));

    let text = message
        .and_then(|m| m.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let chat_id = message
        .and_then(|m| m.get("chat"))
        .and_then(|c| c.get("id"))
        .map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();

    Some(IncomingCommand {
        update_id,
        chat_id,
        text,
    })
}
