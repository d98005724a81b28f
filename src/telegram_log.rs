//! Mirrors WARN and ERROR log events into an operator chat.

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::diagnosis::telegram::fit_to_message;

pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<String>,
}

impl TelegramLogLayer {
    /// Must be called inside a Tokio runtime; spawns the sender task.
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                let text = fit_to_message(&text, "...");
                if let Err(e) = bot.send_message(chat_id, text).await {
                    eprintln!("Failed to send log to Telegram: {e}");
                }
            }
        });

        Self { tx }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message
                .push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

/// WARN and above, minus teloxide's own targets.
fn forwards(level: Level, target: &str) -> bool {
    // teloxide's own failures would loop back through this layer
    level <= Level::WARN && !target.starts_with("teloxide")
}

fn format_event(level: Level, target: &str, message: &str) -> Option<String> {
    match level {
        Level::ERROR => Some(format!("❌ [{target}] {message}")),
        Level::WARN => Some(format!("⚠️ [{target}] {message}")),
        _ => None,
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !forwards(*metadata.level(), metadata.target()) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let Some(text) = format_event(*metadata.level(), metadata.target(), &visitor.message) else {
            return;
        };

        if self.tx.send(text).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}
