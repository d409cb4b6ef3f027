use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::interfaces::clock::{Clock, SystemClock};
use crate::interfaces::storage::TurnipStore;
use crate::interfaces::transport::{ChatTransport, IncomingMessage};
use crate::providers::memory::InMemoryStore;
use crate::providers::sqlite::SqliteStore;
use crate::services::commands::CommandHandler;
use crate::services::turnips::TurnipService;
use crate::texts::Texts;
use crate::timebucket::TimeBucketer;

pub const MEMORY_DB: &str = ":memory:";

/// The assembled bot: storage, clock, texts and command handling.
pub struct TurnipBot {
    handler: Arc<CommandHandler>,
}

impl TurnipBot {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let sqlite_path = config.resolve_sqlite_path();
        let store: Arc<dyn TurnipStore> = if sqlite_path == MEMORY_DB {
            tracing::warn!("Using in-memory storage; records are lost on exit");
            Arc::new(InMemoryStore::new())
        } else {
            Arc::new(SqliteStore::new(&sqlite_path).await?)
        };
        Self::with_parts(config, store, Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: &Config,
        store: Arc<dyn TurnipStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let texts = Texts::load(config.resolve_texts_dir(), &config.language)?;
        let service = TurnipService::new(
            store,
            clock,
            TimeBucketer::new(config.week_start_day()?),
            config.timezone()?,
        );
        tracing::info!(
            language = %config.language,
            timezone = %config.default_timezone,
            week_start = %config.week_start,
            "Turnip bot ready"
        );
        Ok(Self {
            handler: Arc::new(CommandHandler::new(
                Arc::new(service),
                Arc::new(texts),
                config.allow_delete,
            )),
        })
    }

    pub fn handler(&self) -> Arc<CommandHandler> {
        self.handler.clone()
    }

    pub async fn process(&self, message: &IncomingMessage) -> Option<String> {
        self.handler.handle(message).await
    }

    pub async fn dispatch(
        &self,
        message: &IncomingMessage,
        transport: &dyn ChatTransport,
    ) -> Result<()> {
        self.handler.dispatch(message, transport).await
    }
}
