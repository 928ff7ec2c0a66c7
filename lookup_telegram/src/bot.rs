use crate::command::Command;
use crate::render::Signature;
use crate::{Error, Result};
use lookup_config::TelegramConfig;
use lookup_core::{Administration, EntitlementEngine, LookupService, UserId};
use std::{sync::Arc, time::Duration};
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::time::sleep;
use tracing::{info, warn};

/// Telegram bot in front of the lookup service
#[derive(Clone)]
pub struct TelegramBot {
    /// Teloxide bot instance
    pub bot: Bot,
    service: Arc<LookupService>,
    admin: Administration,
    /// Configuration
    pub config: TelegramConfig,
    signature: Signature,
    /// Our own @username, used to recognise `/cmd@name` mentions.
    username: String,
}

impl TelegramBot {
    /// Create a new Telegram bot
    pub fn new(config: TelegramConfig, service: Arc<LookupService>) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(Error::Config(
                "Bot token is empty. Set telegram.token or BOT_TOKEN.".to_string(),
            ));
        }

        let bot = Bot::new(config.token.trim());
        let admin = Administration::new(Arc::clone(service.engine()));
        let signature = Signature {
            owner: service.engine().owner().cloned(),
            owner_name: config.owner_name.clone(),
        };

        Ok(Self {
            bot,
            service,
            admin,
            config,
            signature,
            username: String::new(),
        })
    }

    #[must_use]
    pub fn service(&self) -> &LookupService {
        &self.service
    }

    #[must_use]
    pub fn engine(&self) -> &EntitlementEngine {
        self.service.engine()
    }

    #[must_use]
    pub const fn admin(&self) -> &Administration {
        &self.admin
    }

    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn is_owner(&self, user: &UserId) -> bool {
        self.engine().is_owner(user)
    }

    #[must_use]
    pub const fn broadcast_delay(&self) -> Duration {
        Duration::from_millis(self.config.broadcast_delay_ms)
    }

    #[must_use]
    pub fn log_chat(&self) -> Option<ChatId> {
        self.config.log_chat_id.map(ChatId)
    }

    /// Private chat with a user; Telegram uses the user id as chat id.
    #[must_use]
    pub fn chat_of(user: &UserId) -> Option<ChatId> {
        user.as_str().parse().ok().map(ChatId)
    }

    /// Test connection to Telegram API with backoff retry.
    /// Starts at 2s, increases by 2s each attempt, max 10s delay.
    /// Retries indefinitely until connection succeeds.
    async fn test_connection(&self) -> String {
        const INITIAL_DELAY_SECS: u64 = 2;
        const MAX_DELAY_SECS: u64 = 10;

        let mut attempt = 1u64;
        loop {
            match self.bot.get_me().await {
                Ok(me) => {
                    let username = me.user.username.clone().unwrap_or_default();
                    info!(
                        "Connected to Telegram API: @{} (id: {})",
                        if username.is_empty() {
                            "no username"
                        } else {
                            username.as_str()
                        },
                        me.user.id
                    );
                    return username;
                }
                Err(e) => {
                    let delay_secs = (INITIAL_DELAY_SECS * attempt).min(MAX_DELAY_SECS);

                    warn!("Connection attempt {attempt} failed: {e}. Retrying in {delay_secs}s...");

                    if attempt == 1 {
                        warn!("This may be due to:");
                        warn!("  - Network connectivity issues");
                        warn!("  - Firewall blocking api.telegram.org");
                        warn!("  - Invalid bot token");
                        warn!("  - Telegram API being temporarily unavailable");
                    }

                    sleep(Duration::from_secs(delay_secs)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Advertise the user commands in the client menu. Best-effort.
    async fn register_commands(&self) {
        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!("Failed to register bot commands: {e}");
        }
    }

    /// Run the bot
    pub async fn run(mut self) -> Result<()> {
        use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
        use teloxide::dptree;
        use teloxide::types::{CallbackQuery, Message, Update};

        self.username = self.test_connection().await;
        self.register_commands().await;

        if self.engine().owner().is_none() {
            warn!("No owner configured; owner commands are disabled");
        }

        let bot = self.bot.clone();

        let schema = dptree::entry()
            .branch(Update::filter_message().endpoint({
                let bot_clone = self.clone();
                move |_bot: Bot, msg: Message| {
                    let bot_clone = bot_clone.clone();
                    async move { crate::handler::handle_message(bot_clone, msg).await }
                }
            }))
            .branch(Update::filter_callback_query().endpoint({
                let bot_clone = self.clone();
                move |_bot: Bot, query: CallbackQuery| {
                    let bot_clone = bot_clone.clone();
                    async move { crate::handler::handle_callback(bot_clone, query).await }
                }
            }));

        info!("Lookup bot is running");

        Dispatcher::builder(bot, schema)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}
