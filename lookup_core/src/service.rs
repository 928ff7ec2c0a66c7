//! The single entry point the bot layer calls for a lookup request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::Fetcher;
use crate::entitlement::{EntitlementDecision, EntitlementEngine};
use crate::error::Result;
use crate::extraction::{ExtractedRecord, extract};
use crate::model::UserId;

/// Queries shorter than this are ignored without consulting entitlements.
pub const MIN_QUERY_CHARS: usize = 3;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// What a completed lookup produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Records(Vec<ExtractedRecord>),
    /// Page text with no recognizable structure, to be shown escaped.
    RawText(String),
    /// Fetch failed, timed out or returned an empty page.
    NoData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Query too short; no reply is expected.
    Ignored,
    Denied(EntitlementDecision),
    Completed {
        decision: EntitlementDecision,
        query: String,
        payload: Payload,
    },
}

pub struct LookupService {
    engine: Arc<EntitlementEngine>,
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
    /// One lock per user in flight, so a user's requests run one at a time.
    in_flight: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl LookupService {
    #[must_use]
    pub fn new(engine: Arc<EntitlementEngine>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            engine,
            fetcher,
            timeout: DEFAULT_FETCH_TIMEOUT,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<EntitlementEngine> {
        &self.engine
    }

    /// Authorize, fetch, extract and account for one lookup request.
    ///
    /// Every attempt that passes authorization is charged against the
    /// user's quota, including ones whose fetch fails.
    pub async fn handle_lookup_request(
        &self,
        user: &UserId,
        raw_query: &str,
        maintenance: bool,
    ) -> Result<LookupOutcome> {
        let query = raw_query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(LookupOutcome::Ignored);
        }

        let user_lock = self.user_lock(user).await;
        let outcome = {
            let _guard = user_lock.lock().await;
            self.run(user, query, maintenance).await
        };
        drop(user_lock);
        self.release_idle_locks().await;
        outcome
    }

    async fn run(&self, user: &UserId, query: &str, maintenance: bool) -> Result<LookupOutcome> {
        let decision = self.engine.authorize(user, maintenance).await?;
        if !decision.allowed {
            info!("[{user}] Lookup denied: {:?}", decision.reason);
            return Ok(LookupOutcome::Denied(decision));
        }

        let text = self.fetch_text(query).await;
        self.engine.record_usage(user, text.is_some()).await?;
        self.engine
            .append_history(user, query, text.as_deref())
            .await?;

        let payload = match text {
            None => Payload::NoData,
            Some(text) => {
                let records = extract(&text);
                if records.is_empty() {
                    Payload::RawText(text)
                } else {
                    Payload::Records(records)
                }
            }
        };

        info!(
            "[{user}] Lookup completed: {} ({} remaining before this request)",
            match &payload {
                Payload::Records(records) => format!("{} record(s)", records.len()),
                Payload::RawText(_) => "raw text".to_string(),
                Payload::NoData => "no data".to_string(),
            },
            decision.remaining
        );

        Ok(LookupOutcome::Completed {
            decision,
            query: query.to_string(),
            payload,
        })
    }

    /// Fetch with a timeout, collapsing every failure into `None`.
    async fn fetch_text(&self, query: &str) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.fetcher.fetch(query)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => {
                warn!("Fetch for {query:?} returned an empty page");
                None
            }
            Ok(Err(e)) => {
                warn!("Fetch for {query:?} failed: {e}");
                None
            }
            Err(_) => {
                warn!(
                    "Fetch for {query:?} timed out after {}s",
                    self.timeout.as_secs()
                );
                None
            }
        }
    }

    async fn user_lock(&self, user: &UserId) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        Arc::clone(in_flight.entry(user.clone()).or_default())
    }

    async fn release_idle_locks(&self) {
        self.in_flight
            .lock()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
