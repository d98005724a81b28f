//! Diagnosis module - relays Telegram voice messages to Gemini together
//! with the fault table.

pub mod gateway;
pub mod gemini;
pub mod knowledge;
pub mod listing;
pub mod prompt;
pub mod telegram;


pub use gateway::{Attachment, BotGateway, GatewayError, GatewaySettings, InputError, VoiceRequest};
pub use gemini::{DiagnosisError, Diagnoser, GeminiClient};
pub use knowledge::{KnowledgeRow, KnowledgeTable, LoadError, TableState};
pub use prompt::PromptBuilder;
pub use telegram::{ChatApi, TelegramClient};
