pub mod config;
pub mod diagnosis;
pub mod telegram_log;
