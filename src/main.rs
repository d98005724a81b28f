use std::sync::Arc;

use teloxide::dispatching::HandlerExt;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

use motordiag::config::Config;
use motordiag::diagnosis::{
    Attachment, BotGateway, GatewaySettings, GeminiClient, KnowledgeTable, PromptBuilder, TableState,
    TelegramClient, VoiceRequest,
};
use motordiag::telegram_log::TelegramLogLayer;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
enum Command {
    #[command(description = "greeting and fault database status")]
    Start,
    #[command(description = "show the fault database")]
    Database,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "motordiag.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("motordiag.log"));
    let (file_writer, _guard) = match log_file {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            (Some(writer), Some(guard))
        }
        Err(e) => {
            eprintln!("⚠️ Failed to open log file in {}: {e}", log_dir.display());
            (None, None)
        }
    };

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                )
        }));

    if let Some(log_chat_id) = config.log_chat_id {
        registry
            .with(TelegramLogLayer::new(bot.clone(), log_chat_id).with_filter(LevelFilter::WARN))
            .init();
    } else {
        registry.init();
    }

    info!("🚀 Starting motordiag...");
    info!("Loaded config from {config_path}");

    let table = TableState::from_load(KnowledgeTable::load(&config.database_path));
    match &table {
        TableState::Loaded(t) => info!("✅ Fault database loaded: {} entries", t.len()),
        TableState::Absent { reason } => {
            warn!("⚠️ Fault database not loaded: {reason}");
            warn!("Make sure {} exists and has at least two columns", config.database_path.display());
        }
    }

    let gemini = match GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_api_base.clone(),
        config.request_timeout,
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create Gemini client: {e}");
            std::process::exit(1);
        }
    };

    let gateway = Arc::new(BotGateway::new(
        table,
        Arc::new(gemini),
        Arc::new(TelegramClient::new(bot.clone())),
        PromptBuilder::new(config.reply_language.clone()),
        GatewaySettings {
            temp_dir: config.temp_dir.clone(),
            diagnosis_timeout: config.request_timeout,
        },
    ));

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {e}");
    }

    let handler = Update::filter_message()
        .branch(dptree::entry().filter_command::<Command>().endpoint(handle_command))
        .branch(dptree::filter_map(media_attachment).endpoint(handle_media));

    info!("✅ Bot is running and waiting for voice messages...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![gateway])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_command(msg: Message, cmd: Command, gateway: Arc<BotGateway>) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;
    match cmd {
        Command::Start => {
            info!("/start in chat {chat_id}");
            gateway.on_start(chat_id).await;
        }
        Command::Database => {
            info!("/database in chat {chat_id}");
            gateway.on_list_table(chat_id).await;
        }
    }
    Ok(())
}

async fn handle_media(msg: Message, attachment: Attachment, gateway: Arc<BotGateway>) -> ResponseResult<()> {
    let request = VoiceRequest {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0 as i64,
        attachment,
    };
    info!("🎙️ Media message {} in chat {}", request.message_id, request.chat_id);

    // Already reported to the user and logged by the gateway.
    let _ = gateway.on_voice(request).await;
    Ok(())
}

/// Voice notes go to diagnosis; other media is routed too so it gets the
/// "send a voice message" reply. Plain text falls through.
fn media_attachment(msg: Message) -> Option<Attachment> {
    if let Some(voice) = msg.voice() {
        return Some(Attachment::Voice {
            file_id: voice.file.id.0.clone(),
            mime_type: voice.mime_type.as_ref().map(|m| m.to_string()),
        });
    }

    let kind = if msg.audio().is_some() {
        "audio file"
    } else if msg.video_note().is_some() {
        "video note"
    } else if msg.video().is_some() {
        "video"
    } else if msg.document().is_some() {
        "document"
    } else if msg.photo().is_some() {
        "photo"
    } else if msg.sticker().is_some() {
        "sticker"
    } else {
        return None;
    };
    Some(Attachment::Other { kind })
}
