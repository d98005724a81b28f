//! User-facing handlers: greeting, table listing and voice diagnosis.
//!
//! Every handler terminates its own failures by replying in chat. Nothing
//! here panics or returns an error the dispatcher has to deal with; the
//! voice handler returns its [`GatewayError`] only so callers can log it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::gemini::{DiagnosisError, Diagnoser};
use super::knowledge::TableState;
use super::listing::render_listing;
use super::prompt::PromptBuilder;
use super::telegram::{ChatApi, fit_to_message};

pub const DEFAULT_AUDIO_MIME: &str = "audio/ogg";

pub const ANALYZING_MESSAGE: &str = "🎧 Analyzing the sound against the fault database...";
pub const NOT_VOICE_MESSAGE: &str = "⚠️ Please send a voice message.";
pub const TABLE_MISSING_MESSAGE: &str = "❌ Fault database is not loaded. Check the database file.";
pub const LISTING_MISSING_MESSAGE: &str = "❌ Fault database is not loaded";
pub const PROMPT_FAILED_MESSAGE: &str = "❌ Failed to form the diagnosis request";
pub const REPLY_TRUNCATED_NOTICE: &str = "\n\n... (reply too long, truncated)";

/// What the incoming message carries.
#[derive(Debug, Clone)]
pub enum Attachment {
    Voice { file_id: String, mime_type: Option<String> },
    /// Any other media; `kind` is only used for logging.
    Other { kind: &'static str },
}

#[derive(Debug, Clone)]
pub struct VoiceRequest {
    pub chat_id: i64,
    pub message_id: i64,
    pub attachment: Attachment,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("message has no voice attachment")]
    NotVoice,
    #[error("fault table has no rows")]
    EmptyTable,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("fault table is not loaded: {reason}")]
    TableUnavailable { reason: String },
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    Transport(#[from] DiagnosisError),
    #[error("{0}")]
    Unexpected(String),
}

impl GatewayError {
    /// The chat reply for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::TableUnavailable { .. } => TABLE_MISSING_MESSAGE.to_string(),
            Self::InvalidInput(InputError::NotVoice) => NOT_VOICE_MESSAGE.to_string(),
            Self::InvalidInput(InputError::EmptyTable) => PROMPT_FAILED_MESSAGE.to_string(),
            Self::Transport(e) => format!("❌ Analysis failed: {e}"),
            Self::Unexpected(detail) => format!("❌ Analysis failed: {detail}"),
        }
    }
}

pub struct GatewaySettings {
    /// Directory voice downloads are staged in.
    pub temp_dir: PathBuf,
    pub diagnosis_timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            diagnosis_timeout: Duration::from_secs(60),
        }
    }
}

pub struct BotGateway {
    table: TableState,
    diagnoser: Arc<dyn Diagnoser>,
    chat: Arc<dyn ChatApi>,
    prompts: PromptBuilder,
    settings: GatewaySettings,
}

impl BotGateway {
    pub fn new(
        table: TableState,
        diagnoser: Arc<dyn Diagnoser>,
        chat: Arc<dyn ChatApi>,
        prompts: PromptBuilder,
        settings: GatewaySettings,
    ) -> Self {
        Self { table, diagnoser, chat, prompts, settings }
    }

    pub fn table_state(&self) -> &TableState {
        &self.table
    }

    pub async fn on_start(&self, chat_id: i64) {
        let status = match &self.table {
            TableState::Loaded(table) => format!("✅ Fault database loaded ({} entries)", table.len()),
            TableState::Absent { .. } => "⚠️ Fault database not loaded".to_string(),
        };
        let text = format!(
            "👋 Hi! Send a voice message 🚜 with a running tractor engine, \
             and I'll determine its condition using the fault database.\n\n{status}"
        );
        self.reply(chat_id, None, &text).await;
    }

    pub async fn on_list_table(&self, chat_id: i64) {
        let text = match &self.table {
            TableState::Loaded(table) => render_listing(table),
            TableState::Absent { reason } => {
                warn!("Listing requested but fault table is absent: {reason}");
                LISTING_MISSING_MESSAGE.to_string()
            }
        };
        self.reply(chat_id, None, &text).await;
    }

    /// Diagnose a voice message. Failures are already reported in chat
    /// when this returns `Err`.
    pub async fn on_voice(&self, request: VoiceRequest) -> Result<(), GatewayError> {
        let result = self.diagnose_voice(&request).await;
        if let Err(ref e) = result {
            warn!("Voice diagnosis in chat {} failed: {e}", request.chat_id);
            let text = fit_to_message(&e.user_message(), REPLY_TRUNCATED_NOTICE);
            self.reply(request.chat_id, Some(request.message_id), &text).await;
        }
        result
    }

    async fn diagnose_voice(&self, request: &VoiceRequest) -> Result<(), GatewayError> {
        let (file_id, mime_type) = match &request.attachment {
            Attachment::Voice { file_id, mime_type } => {
                (file_id.as_str(), mime_type.as_deref().unwrap_or(DEFAULT_AUDIO_MIME))
            }
            Attachment::Other { kind } => {
                info!("Rejecting {kind} in chat {}", request.chat_id);
                return Err(InputError::NotVoice.into());
            }
        };

        let table = match &self.table {
            TableState::Loaded(table) => table,
            TableState::Absent { reason } => {
                return Err(GatewayError::TableUnavailable { reason: reason.clone() });
            }
        };

        // Removed when dropped, on every return path below.
        let audio_file = tempfile::Builder::new()
            .prefix("voice-")
            .suffix(".ogg")
            .tempfile_in(&self.settings.temp_dir)
            .map_err(|e| GatewayError::Unexpected(format!("failed to create temp file: {e}")))?;

        self.chat
            .download_file(file_id, audio_file.path())
            .await
            .map_err(GatewayError::Unexpected)?;

        self.chat
            .send_message(request.chat_id, ANALYZING_MESSAGE, None)
            .await
            .map_err(GatewayError::Unexpected)?;

        let prompt = self.prompts.build(Some(table)).ok_or(InputError::EmptyTable)?;

        let audio = tokio::fs::read(audio_file.path())
            .await
            .map_err(|e| GatewayError::Unexpected(format!("failed to read downloaded audio: {e}")))?;

        let timeout = self.settings.diagnosis_timeout;
        let text = tokio::time::timeout(timeout, self.diagnoser.diagnose(&prompt, &audio, mime_type))
            .await
            .map_err(|_| DiagnosisError::Timeout(timeout))??;

        let text = fit_to_message(&text, REPLY_TRUNCATED_NOTICE);
        self.chat
            .send_message(request.chat_id, &text, Some(request.message_id))
            .await
            .map_err(GatewayError::Unexpected)?;

        info!("✅ Diagnosis delivered to chat {}", request.chat_id);
        Ok(())
    }

    async fn reply(&self, chat_id: i64, reply_to: Option<i64>, text: &str) {
        if let Err(e) = self.chat.send_message(chat_id, text, reply_to).await {
            warn!("Failed to reply in chat {chat_id}: {e}");
        }
    }
}
