//! Telegram client using teloxide.

use std::path::Path;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, MessageId, ReplyParameters};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Hard cap Telegram puts on a text message, in UTF-16 code units.
pub const MAX_MESSAGE_UNITS: usize = 4096;

/// Content budget for long replies, leaving room for the truncation notice.
pub const REPLY_BUDGET_UNITS: usize = 4000;

/// The slice of the Bot API the gateway needs.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str, reply_to_message_id: Option<i64>) -> Result<(), String>;

    /// Download a file by its Telegram file id into `dest`, returning the size.
    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<u64, String>;
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str, reply_to_message_id: Option<i64>) -> Result<(), String> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);

        if let Some(msg_id) = reply_to_message_id {
            let reply_params = ReplyParameters::new(MessageId(msg_id as i32));
            request = request.reply_parameters(reply_params);
        }

        request.await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }

    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<u64, String> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| format!("Failed to get file info: {e}"))?;

        let mut out = tokio::fs::File::create(dest)
            .await
            .map_err(|e| format!("Failed to create {}: {e}", dest.display()))?;

        self.bot
            .download_file(&file.path, &mut out)
            .await
            .map_err(|e| format!("Failed to download file: {e}"))?;
        out.flush()
            .await
            .map_err(|e| format!("Failed to write {}: {e}", dest.display()))?;

        let size = out
            .metadata()
            .await
            .map(|m| m.len())
            .map_err(|e| format!("Failed to stat {}: {e}", dest.display()))?;

        info!("📥 Downloaded voice ({} bytes)", size);
        Ok(size)
    }
}

/// Length of `text` the way Telegram measures it.
pub fn message_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Cut `text` to the reply budget and append `notice` when it does not fit.
///
/// The result never exceeds [`MAX_MESSAGE_UNITS`] as long as the notice is
/// shorter than the headroom between the budget and the cap.
pub fn fit_to_message(text: &str, notice: &str) -> String {
    if message_len(text) <= REPLY_BUDGET_UNITS {
        return text.to_string();
    }

    let mut used = 0;
    let mut end = 0;
    for (idx, ch) in text.char_indices() {
        if used + ch.len_utf16() > REPLY_BUDGET_UNITS {
            break;
        }
        used += ch.len_utf16();
        end = idx + ch.len_utf8();
    }

    let mut fitted = text[..end].to_string();
    fitted.push_str(notice);
    fitted
}
