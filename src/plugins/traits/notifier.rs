use async_trait::async_trait;

use crate::models::MessageId;
use crate::utils::error::Result;

/// A text message received from the chat provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCommand {
    pub update_id: i64,
    pub chat_id: String,
    pub text: String,
}

/// Outbound messaging channel. Texts are HTML-formatted.
///
/// All operations are best-effort from the caller's point of view: failures
/// come back as [`AppError::Delivery`](crate::utils::error::AppError::Delivery)
/// and are logged, never propagated out of a scan cycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send to the configured chat.
    async fn send(&self, text: &str) -> Result<MessageId>;

    /// Send to an explicit chat, used for command replies.
    async fn send_to(&self, chat_id: &str, text: &str) -> Result<MessageId>;

    /// Replace the text of a message sent earlier. Editing to identical
    /// content succeeds.
    async fn edit(&self, message_id: MessageId, text: &str) -> Result<()>;

    async fn delete(&self, message_id: MessageId) -> Result<()>;

    /// Updates with an id of at least `offset`. Providers without an inbound
    /// channel return an empty list.
    async fn receive_commands(&self, offset: i64) -> Result<Vec<IncomingCommand>>;
}
