use lookup_fetch::{FetchConfig, QUERY_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_DIR_NAME: &str = "lookupbot";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub lookup: LookupConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<u64>,
    #[serde(default = "TelegramConfig::default_owner_name")]
    pub owner_name: String,
    /// Chat that receives a copy of every successful lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_chat_id: Option<i64>,
    #[serde(default = "TelegramConfig::default_broadcast_delay_ms")]
    pub broadcast_delay_ms: u64,
}

impl TelegramConfig {
    fn default_owner_name() -> String {
        "Owner".to_string()
    }

    const fn default_broadcast_delay_ms() -> u64 {
        50
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LookupConfig {
    pub url_template: String,
    #[serde(flatten)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct QuotaConfig {
    /// Offset of the timezone whose calendar day keys the quota.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "DatabaseConfig::default_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
        }
    }
}

impl DatabaseConfig {
    fn default_url() -> String {
        dirs::home_dir().map_or_else(
            || "sqlite://lookupbot.db?mode=rwc".to_string(),
            |home| {
                format!(
                    "sqlite://{}?mode=rwc",
                    home.join(CONFIG_DIR_NAME).join("lookupbot.db").display()
                )
            },
        )
    }
}

impl Config {
    fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join(CONFIG_DIR_NAME))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load `~/lookupbot/config.json`, then apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'lookupbot init' to create config.",
                config_path.display()
            );
        }

        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Apply `BOT_TOKEN`, `OWNER_ID`, `OWNER_NAME`, `DATABASE_URL` and
    /// `LOOKUP_URL_TEMPLATE` as read through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = var("BOT_TOKEN") {
            self.telegram.token = token;
        }
        if let Some(owner) = var("OWNER_ID") {
            match owner.trim().parse() {
                Ok(id) => self.telegram.owner_id = Some(id),
                Err(_) => warn!("Ignoring non-numeric OWNER_ID: {owner}"),
            }
        }
        if let Some(name) = var("OWNER_NAME") {
            self.telegram.owner_name = name;
        }
        if let Some(url) = var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(template) = var("LOOKUP_URL_TEMPLATE") {
            self.lookup.url_template = template;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.lookup.url_template.contains(QUERY_PLACEHOLDER) {
            anyhow::bail!(
                "lookup.url_template must contain {QUERY_PLACEHOLDER}: {}",
                self.lookup.url_template
            );
        }
        if self.telegram.owner_id.is_none() {
            warn!("telegram.owner_id is not set, owner commands are disabled");
        }
        Ok(())
    }

    /// Token with everything but the bot id hidden, for display.
    #[must_use]
    pub fn masked_token(&self) -> String {
        let token = &self.telegram.token;
        if token.is_empty() {
            return "(not set)".to_string();
        }
        token.split_once(':').map_or_else(
            || "****".to_string(),
            |(bot_id, _)| format!("{bot_id}:****"),
        )
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        std::fs::write(&config_path, Self::template())?;
        info!("Created config file at {}", config_path.display());

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Put your bot token from @BotFather into telegram.token");
        println!("   2. Set telegram.owner_id to your numeric Telegram id");
        println!("   3. Point lookup.url_template at the lookup page, keeping {{query}}");
        println!("   4. Run 'lookupbot run' to start the bot");
        println!();
        println!("🔧 Environment overrides:");
        println!("   BOT_TOKEN, OWNER_ID, OWNER_NAME, DATABASE_URL, LOOKUP_URL_TEMPLATE");
        println!();
        Ok(())
    }

    fn template() -> String {
        let database_url = DatabaseConfig::default_url();
        format!(
            r#"{{
  "telegram": {{
    "token": "your-bot-token-here",
    "owner_id": 123456789,
    "owner_name": "Owner",
    "broadcast_delay_ms": 50
  }},
  "lookup": {{
    "url_template": "https://example.com/lookup?number={{query}}",
    "timeout": 30,
    "max_size": 1000000
  }},
  "quota": {{
    "utc_offset_minutes": 0
  }},
  "database": {{
    "url": "{database_url}"
  }}
}}"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(json: &str) -> Config {
        match serde_json::from_str(json) {
            Ok(config) => config,
            Err(e) => panic!("Failed to parse config: {e}"),
        }
    }

    #[test]
    fn test_template_parses_and_validates() {
        let config = parse(&Config::template());
        assert_eq!(config.telegram.owner_id, Some(123_456_789));
        assert_eq!(config.telegram.broadcast_delay_ms, 50);
        assert_eq!(config.lookup.fetch.timeout, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(
            r#"{"telegram": {"token": "1:abc"}, "lookup": {"url_template": "https://x/{query}"}}"#,
        );
        assert_eq!(config.telegram.owner_name, "Owner");
        assert_eq!(config.telegram.owner_id, None);
        assert_eq!(config.telegram.log_chat_id, None);
        assert_eq!(config.quota.utc_offset_minutes, 0);
        assert_eq!(config.lookup.fetch.max_size, 1_000_000);
        assert!(config.database.url.starts_with("sqlite://"));
    }

    #[test]
    fn test_template_without_placeholder_is_rejected() {
        let config = parse(
            r#"{"telegram": {"token": "1:abc"}, "lookup": {"url_template": "https://x/lookup"}}"#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let mut config = parse(
            r#"{"telegram": {"token": "1:abc", "owner_id": 5}, "lookup": {"url_template": "https://x/{query}"}}"#,
        );
        let env: HashMap<&str, &str> = [
            ("BOT_TOKEN", "2:def"),
            ("OWNER_ID", "not-a-number"),
            ("OWNER_NAME", "Boss"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("LOOKUP_URL_TEMPLATE", "   "),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|name| env.get(name).map(ToString::to_string));

        assert_eq!(config.telegram.token, "2:def");
        assert_eq!(config.telegram.owner_id, Some(5));
        assert_eq!(config.telegram.owner_name, "Boss");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.lookup.url_template, "https://x/{query}");
    }

    #[test]
    fn test_masked_token() {
        let mut config = parse(&Config::template());
        config.telegram.token = "12345:SECRET".to_string();
        assert_eq!(config.masked_token(), "12345:****");
        config.telegram.token.clear();
        assert_eq!(config.masked_token(), "(not set)");
    }
}
