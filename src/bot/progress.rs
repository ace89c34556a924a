/// Progress narration through a single status message
use tracing::debug;

use super::client::ChatPlatform;
use crate::error::PlatformError;

/// A status message that is edited as a request moves through its phases
/// and deleted when the request is done.
pub struct StatusMessage<'a> {
    platform: &'a dyn ChatPlatform,
    chat_id: i64,
    message_id: i64,
}

impl<'a> StatusMessage<'a> {
    /// Post the first status line as a reply to the request
    pub async fn start(
        platform: &'a dyn ChatPlatform,
        chat_id: i64,
        reply_to: i64,
        text: &str,
    ) -> Result<StatusMessage<'a>, PlatformError> {
        let message = platform.send_message(chat_id, text, Some(reply_to)).await?;
        Ok(StatusMessage {
            platform,
            chat_id,
            message_id: message.message_id,
        })
    }

    /// Narration is best effort: a failed edit is logged, never fatal
    pub async fn update(&self, text: &str) {
        if let Err(e) = self.platform.edit_message(self.chat_id, self.message_id, text).await {
            debug!("Status edit failed: {}", e);
        }
    }

    pub async fn finish(self) {
        if let Err(e) = self.platform.delete_message(self.chat_id, self.message_id).await {
            debug!("Status delete failed: {}", e);
        }
    }
}
