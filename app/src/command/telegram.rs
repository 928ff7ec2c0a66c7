use crate::command::{CommandStrategy, build_engine, build_service, open_store};
use lookup_config::Config;
use lookup_telegram::TelegramBot;
use std::sync::Arc;
use tracing::info;

/// Input for the `run` command.
pub struct TelegramInput {
    /// Optional bot token (overrides config and environment)
    pub token: Option<String>,
    pub memory: bool,
}

/// Strategy for running the Telegram bot.
pub struct TelegramStrategy;

impl CommandStrategy for TelegramStrategy {
    type Input = TelegramInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let mut config = Config::load()?;

        if let Some(token) = input.token.filter(|t| !t.trim().is_empty()) {
            config.telegram.token = token;
        }
        if config.telegram.token.trim().is_empty() {
            anyhow::bail!(
                "Telegram bot token not configured. Set \"telegram.token\", BOT_TOKEN or --token"
            );
        }

        info!("Starting lookup bot (token {})...", config.masked_token());

        let store = open_store(&config, input.memory).await?;
        let engine = build_engine(&config, store);
        let service = Arc::new(build_service(&config, engine)?);

        let bot = TelegramBot::new(config.telegram.clone(), service)?;

        info!("Telegram bot is starting. Press Ctrl+C to stop.");
        bot.run().await?;

        Ok(())
    }
}
