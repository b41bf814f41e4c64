use crate::error::SendError;

/// Outbound chat transport.
#[async_trait::async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), SendError>;
}

/// Logs outbound messages instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSender;

#[async_trait::async_trait]
impl MessageSender for DryRunSender {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        tracing::info!(target: "anima::telegram", chat_id, chars = text.chars().count(), "dry run: message not sent");
        Ok(())
    }
}
