use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use teloxide::types::ChatId;

use crate::diagnosis::gemini::DEFAULT_API_BASE;

const DEFAULT_DATABASE_PATH: &str = "sounddefbase.xlsx";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_REPLY_LANGUAGE: &str = "English";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{}': {source}", path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    #[error("failed to parse config file '{}': {source}", path.display())]
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Falls back to TELEGRAM_BOT_TOKEN when empty.
    #[serde(default)]
    telegram_bot_token: String,
    /// Falls back to GEMINI_API_KEY when empty.
    #[serde(default)]
    gemini_api_key: String,
    /// Spreadsheet with the symptom/fault table.
    #[serde(default = "default_database_path")]
    database_path: String,
    #[serde(default = "default_gemini_model")]
    gemini_model: String,
    #[serde(default = "default_gemini_api_base")]
    gemini_api_base: String,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_reply_language")]
    reply_language: String,
    /// Directory for state files (logs). Defaults to the config file's directory.
    data_dir: Option<String>,
    /// Where voice downloads are staged. Defaults to the system temp dir.
    temp_dir: Option<String>,
    log_chat_id: Option<i64>,
}

/// Relative paths in the config file are relative to the file itself.
fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_relative() && !base_dir.as_os_str().is_empty() {
        base_dir.join(path)
    } else {
        path
    }
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_gemini_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_reply_language() -> String {
    DEFAULT_REPLY_LANGUAGE.to_string()
}

#[derive(Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    /// Resolved against the config file's directory when relative,
    /// like `data_dir` and `temp_dir`.
    pub database_path: PathBuf,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub request_timeout: Duration,
    pub reply_language: String,
    pub data_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub log_chat_id: Option<ChatId>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// Same as [`Config::load`] with an injectable environment lookup.
    pub fn load_with_env<P, F>(path: P, env: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        let telegram_bot_token = non_empty_or_env(file.telegram_bot_token, "TELEGRAM_BOT_TOKEN", &env);
        let gemini_api_key = non_empty_or_env(file.gemini_api_key, "GEMINI_API_KEY", &env);

        if telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }
        if gemini_api_key.is_empty() {
            return Err(ConfigError::Validation("gemini_api_key is required".into()));
        }
        if file.database_path.trim().is_empty() {
            return Err(ConfigError::Validation("database_path must not be empty".into()));
        }
        if file.request_timeout_secs == 0 {
            return Err(ConfigError::Validation("request_timeout_secs must be greater than zero".into()));
        }

        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let database_path = resolve(&base_dir, file.database_path.trim());
        let data_dir = resolve(&base_dir, file.data_dir.as_deref().unwrap_or("."));
        let temp_dir = file
            .temp_dir
            .map(|dir| resolve(&base_dir, &dir))
            .unwrap_or_else(std::env::temp_dir);

        Ok(Self {
            telegram_bot_token,
            gemini_api_key,
            database_path,
            gemini_model: file.gemini_model,
            gemini_api_base: file.gemini_api_base.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(file.request_timeout_secs),
            reply_language: file.reply_language,
            data_dir,
            temp_dir,
            log_chat_id: file.log_chat_id.map(ChatId),
        })
    }
}

fn non_empty_or_env<F>(value: String, var: &str, env: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if value.trim().is_empty() {
        env(var).map(|v| v.trim().to_string()).unwrap_or_default()
    } else {
        value.trim().to_string()
    }
}
