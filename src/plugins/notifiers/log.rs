use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;

use crate::models::MessageId;
use crate::plugins::traits::{IncomingCommand, Notifier};
use crate::utils::error::Result;

/// Writes messages to the log instead of a chat. Used when no chat
/// credentials are configured.
#[derive(Debug, Default)]
pub struct LogNotifier {
    next_id: AtomicI64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<MessageId> {
        let message_id = self.allocate();
        info!(message_id, "notification:\n{}", text);
        Ok(message_id)
    }

    async fn send_to(&self, chat_id: &str, text: &str) -> Result<MessageId> {
        let message_id = self.allocate();
        info!(message_id, chat_id, "reply:\n{}", text);
        Ok(message_id)
    }

    async fn edit(&self, message_id: MessageId, text: &str) -> Result<()> {
        info!(message_id, "edit:\n{}", text);
        Ok(())
    }

    async fn delete(&self, message_id: MessageId) -> Result<()> {
        info!(message_id, "delete");
        Ok(())
    }

    async fn receive_commands(&self, _offset: i64) -> Result<Vec<IncomingCommand>> {
        Ok(Vec::new())
    }
}
