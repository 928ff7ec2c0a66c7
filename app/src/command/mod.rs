//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy with its own input type. The helpers
//! below assemble the store, engine and lookup service the same way for every
//! command that needs them.

use lookup_config::Config;
use lookup_core::{EntitlementEngine, LookupService, MemoryStore, QuotaLedger, UserId, UserStore};
use lookup_fetch::HttpFetcher;
use lookup_storage::DocumentStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

mod info;
mod init;
mod lookup;
mod telegram;
mod version;

pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use lookup::{LookupInput, LookupStrategy};
pub use telegram::{TelegramInput, TelegramStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// Each strategy defines its own input type via the associated type, so
/// parameters are passed without runtime casting or boxing.
pub trait CommandStrategy: Send + Sync + 'static {
    type Input;

    /// Execute the command with the given input.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Connect to the document store with capped backoff.
///
/// # Retry Behavior
/// - First retry: 1s
/// - Second retry: 2s
/// - Third and beyond: 3s (capped)
/// - Gives up after `MAX_ATTEMPTS`; an unreachable store is fatal
async fn connect_with_retry(database_url: &str) -> anyhow::Result<DocumentStore> {
    const MAX_ATTEMPTS: u32 = 5;
    const MAX_DELAY: Duration = Duration::from_secs(3);
    const INITIAL_DELAY: Duration = Duration::from_secs(1);

    let mut attempt = 0u32;
    let mut delay = INITIAL_DELAY;

    loop {
        attempt += 1;
        match DocumentStore::new(database_url).await {
            Ok(store) => {
                info!("Document store connected on attempt {attempt}");
                return Ok(store);
            }
            Err(e) if attempt >= MAX_ATTEMPTS => {
                return Err(e.context(format!(
                    "Giving up on the database after {attempt} attempts"
                )));
            }
            Err(e) => {
                warn!(
                    "Failed to connect to database (attempt {attempt}): {e}. Retrying in {}s...",
                    delay.as_secs()
                );
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Open the configured store, or a throwaway in-memory one.
async fn open_store(config: &Config, memory: bool) -> anyhow::Result<Arc<dyn UserStore>> {
    if memory {
        warn!("Using in-memory store; nothing will be persisted");
        return Ok(Arc::new(MemoryStore::new()));
    }
    Config::ensure_config_dir()?;
    Ok(Arc::new(connect_with_retry(&config.database.url).await?))
}

fn build_engine(config: &Config, store: Arc<dyn UserStore>) -> EntitlementEngine {
    let owner = config.telegram.owner_id.map(UserId::from);
    EntitlementEngine::new(store, owner)
        .with_ledger(QuotaLedger::new(config.quota.utc_offset_minutes))
}

fn build_service(config: &Config, engine: EntitlementEngine) -> anyhow::Result<LookupService> {
    let fetcher = HttpFetcher::new(config.lookup.url_template.clone(), config.lookup.fetch.clone())?;
    Ok(LookupService::new(Arc::new(engine), Arc::new(fetcher))
        .with_timeout(config.lookup.fetch.timeout()))
}
