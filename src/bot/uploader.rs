//! Telegram upload sink
//!
//! Sends audio to a private chat and keeps the resulting `file_id`, which
//! inline answers can reference without uploading the file again.

use crate::media::{AudioUpload, AudioUploader, UploadError};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::debug;

/// [`AudioUploader`] backed by `send_audio` into a fixed chat
pub struct TelegramUploader {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramUploader {
    /// Create an uploader that posts into `chat_id`
    #[must_use]
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    async fn send_once(&self, upload: &AudioUpload) -> anyhow::Result<Message> {
        let audio = InputFile::memory(upload.audio.to_vec()).file_name(upload.file_name.clone());

        let mut req = self
            .bot
            .send_audio(self.chat_id, audio)
            .duration(upload.duration_secs)
            .performer(upload.performer.clone())
            .title(upload.title.clone())
            .caption(upload.caption.clone());
        if let Some(thumbnail) = &upload.thumbnail {
            req = req.thumbnail(InputFile::memory(thumbnail.to_vec()));
        }

        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send_audio error: {e}"))
    }
}

#[async_trait]
impl AudioUploader for TelegramUploader {
    async fn upload(&self, upload: AudioUpload) -> Result<String, UploadError> {
        let message = crate::utils::retry_telegram_operation(|| self.send_once(&upload))
            .await
            .map_err(|e| UploadError::Telegram(e.to_string()))?;

        let token = message
            .audio()
            .map(|audio| audio.file.id.to_string())
            .ok_or(UploadError::MissingAudio)?;

        debug!(file_name = %upload.file_name, message_id = message.id.0, "Audio uploaded");
        Ok(token)
    }
}
