//! Construction-time behavior of the Telegram front end.
//!
//! No request reaches Telegram here; these tests only verify that:
//! - A missing token is a configuration error
//! - Owner attribution and chat routing follow the configuration

use async_trait::async_trait;
use lookup_config::TelegramConfig;
use lookup_core::{EntitlementEngine, Fetcher, LookupService, MemoryStore, UserId};
use lookup_telegram::{Error, TelegramBot};
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::ChatId;

struct NoFetch;

#[async_trait]
impl Fetcher for NoFetch {
    async fn fetch(&self, _query: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

fn config(token: &str) -> TelegramConfig {
    let json = format!(
        r#"{{"token": "{token}", "owner_id": 42, "owner_name": "Boss", "log_chat_id": -100123, "broadcast_delay_ms": 75}}"#
    );
    match serde_json::from_str(&json) {
        Ok(config) => config,
        Err(e) => panic!("Failed to parse config: {e}"),
    }
}

fn service() -> Arc<LookupService> {
    let engine = EntitlementEngine::new(Arc::new(MemoryStore::new()), Some(UserId::from(42_u64)));
    Arc::new(LookupService::new(Arc::new(engine), Arc::new(NoFetch)))
}

#[test]
fn test_empty_token_is_rejected() {
    let result = TelegramBot::new(config("  "), service());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_bot_follows_configuration() {
    let Ok(bot) = TelegramBot::new(config("123:abc"), service()) else {
        panic!("Failed to create bot");
    };

    assert!(bot.is_owner(&UserId::from("42")));
    assert!(!bot.is_owner(&UserId::from("43")));
    assert_eq!(bot.log_chat(), Some(ChatId(-100_123)));
    assert_eq!(bot.broadcast_delay(), Duration::from_millis(75));
    assert!(bot.signature().footer().contains("user_id=42"));
    assert!(bot.signature().owner_url().is_some());
}

#[test]
fn test_private_chat_of_user() {
    assert_eq!(TelegramBot::chat_of(&UserId::from("777")), Some(ChatId(777)));
    assert_eq!(TelegramBot::chat_of(&UserId::from("abc")), None);
}
