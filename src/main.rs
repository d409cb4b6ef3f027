use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use turnip_bot::client::TurnipBot;
use turnip_bot::config::Config;
use turnip_bot::error::Result;
use turnip_bot::interfaces::transport::{ChatKind, IncomingMessage, ObservedChat, ObservedUser};
use turnip_bot::transports::console::ConsoleTransport;

#[derive(Parser, Debug)]
#[command(name = "turnip-bot")]
#[command(about = "Turnip price tracker, console transport")]
struct Cli {
    #[arg(long, default_value_t = turnip_bot::runtime_paths::default_config_path())]
    config: String,

    /// Overrides `sqlite_path`; `:memory:` keeps everything in memory.
    #[arg(long)]
    db: Option<String>,

    #[arg(long, default_value_t = 1)]
    user_id: i64,

    #[arg(long, default_value = "Villager")]
    first_name: String,

    #[arg(long, default_value = "")]
    username: String,

    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    chat_id: i64,

    #[arg(long, default_value = "Island")]
    chat_title: String,

    /// Treat the chat as a private conversation with the bot.
    #[arg(long, default_value_t = false)]
    private: bool,

    /// Send messages as a group admin.
    #[arg(long, default_value_t = false)]
    admin: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    turnip_bot::logging::init_tracing("turnip_bot_console");
    let cli = Cli::parse();

    let default_db = cli
        .db
        .clone()
        .unwrap_or_else(turnip_bot::runtime_paths::default_db_path);
    let mut config = Config::load_or_default(&cli.config, &default_db)?;
    if let Some(db) = &cli.db {
        config.sqlite_path = Some(db.clone());
    }

    let bot = TurnipBot::from_config(&config).await?;
    let transport = ConsoleTransport::stdout();
    let user = ObservedUser {
        id: cli.user_id,
        first_name: cli.first_name,
        last_name: String::new(),
        username: cli.username,
    };
    let chat = if cli.private {
        ObservedChat {
            id: cli.user_id,
            title: String::new(),
            kind: ChatKind::Private,
        }
    } else {
        ObservedChat {
            id: cli.chat_id,
            title: cli.chat_title,
            kind: ChatKind::Group,
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| turnip_bot::error::TurnipBotError::Runtime(e.to_string()))?
    {
        if line.trim().is_empty() {
            continue;
        }
        let message = IncomingMessage {
            user: user.clone(),
            chat: chat.clone(),
            text: line,
            sender_is_admin: cli.admin,
        };
        bot.dispatch(&message, &transport).await?;
    }
    Ok(())
}
