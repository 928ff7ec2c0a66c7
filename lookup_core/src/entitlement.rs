//! Allow/deny decisions and usage accounting.
//!
//! [`EntitlementEngine`] is the only place that combines role, ban,
//! subscription and quota state, so the order of checks lives here and
//! nowhere else.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::model::{HistoryEntry, Role, Subscription, UserId, UserSet};
use crate::quota::QuotaLedger;
use crate::UserStore;

/// Entries kept in the store per user.
pub const STORED_HISTORY: usize = 50;
/// Entries exposed when history is read back.
pub const VISIBLE_HISTORY: usize = 20;
const PREVIEW_CHARS: usize = 100;
const NO_DATA_PREVIEW: &str = "No data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DecisionReason {
    Banned,
    Unauthorized,
    MaintenanceMode,
    QuotaExceeded,
    Allowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntitlementDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
    pub remaining: u64,
    pub ceiling: u64,
}

impl EntitlementDecision {
    const fn deny(reason: DecisionReason, ceiling: u64) -> Self {
        Self {
            allowed: false,
            reason,
            remaining: 0,
            ceiling,
        }
    }

    const fn allow(ceiling: u64, consumed: u64) -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::Allowed,
            remaining: ceiling.saturating_sub(consumed),
            ceiling,
        }
    }
}

/// Read-only summary of a user's access and usage, for status replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub role: Role,
    pub subscription: Option<Subscription>,
    pub banned: bool,
    pub used_today: u64,
    pub ceiling: u64,
    pub lifetime: u64,
}

impl Standing {
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.ceiling.saturating_sub(self.used_today)
    }

    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        !self.banned && (!matches!(self.role, Role::Regular) || self.subscription.is_some())
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match (self.role, self.subscription) {
            (Role::Owner, _) => "Owner",
            (_, Some(_)) => "Premium",
            (Role::Delegate, None) => "Sudo",
            (Role::Regular, None) => "Unauthorized",
        }
    }
}

pub struct EntitlementEngine {
    store: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    ledger: QuotaLedger,
    owner: Option<UserId>,
    /// Serializes read-modify-write cycles on shared documents.
    write_lock: Mutex<()>,
}

impl EntitlementEngine {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, owner: Option<UserId>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ledger: QuotaLedger::default(),
            owner,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn with_ledger(mut self, ledger: QuotaLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub(crate) fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) const fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub(crate) const fn write_lock(&self) -> &Mutex<()> {
        &self.write_lock
    }

    #[must_use]
    pub const fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    #[must_use]
    pub fn is_owner(&self, user: &UserId) -> bool {
        self.owner.as_ref() == Some(user)
    }

    pub async fn role(&self, user: &UserId) -> Result<Role> {
        if self.is_owner(user) {
            return Ok(Role::Owner);
        }
        let delegates = self
            .store
            .get_user_set(UserSet::Delegates)
            .await
            .map_err(Error::storage)?;
        Ok(if delegates.contains(user) {
            Role::Delegate
        } else {
            Role::Regular
        })
    }

    pub async fn is_banned(&self, user: &UserId) -> Result<bool> {
        let banned = self
            .store
            .get_user_set(UserSet::Banned)
            .await
            .map_err(Error::storage)?;
        Ok(banned.contains(user))
    }

    /// The user's subscription, if one exists and has not expired yet.
    pub async fn active_subscription(&self, user: &UserId) -> Result<Option<Subscription>> {
        let now = self.clock.now();
        let subscriptions = self
            .store
            .get_subscriptions()
            .await
            .map_err(Error::storage)?;
        Ok(subscriptions
            .get(user)
            .copied()
            .filter(|sub| sub.is_active_at(now)))
    }

    /// Decide whether `user` may run a lookup right now.
    ///
    /// Checks run in a fixed order and the first match wins: maintenance,
    /// ban, authorization, quota. Has no side effects.
    pub async fn authorize(&self, user: &UserId, maintenance: bool) -> Result<EntitlementDecision> {
        if maintenance && !self.is_owner(user) {
            return Ok(EntitlementDecision::deny(DecisionReason::MaintenanceMode, 0));
        }

        if self.is_banned(user).await? {
            return Ok(EntitlementDecision::deny(DecisionReason::Banned, 0));
        }

        let role = self.role(user).await?;
        let subscription = self.active_subscription(user).await?;
        if role == Role::Regular && subscription.is_none() {
            return Ok(EntitlementDecision::deny(DecisionReason::Unauthorized, 0));
        }

        let ceiling = QuotaLedger::ceiling(role, subscription.map(|s| s.tier));
        let consumed = self.consumed_today(user).await?;
        if consumed >= ceiling {
            return Ok(EntitlementDecision::deny(
                DecisionReason::QuotaExceeded,
                ceiling,
            ));
        }

        Ok(EntitlementDecision::allow(ceiling, consumed))
    }

    /// Lookups charged to `user` on the current day.
    pub async fn consumed_today(&self, user: &UserId) -> Result<u64> {
        let counters = self.store.get_counters().await.map_err(Error::storage)?;
        Ok(self.ledger.consumed(&counters, user, self.clock.now()))
    }

    /// Account for one lookup attempt. Quota is charged whether or not the
    /// attempt produced data.
    pub async fn record_usage(&self, user: &UserId, succeeded: bool) -> Result<()> {
        let now = self.clock.now();
        let day = self.ledger.day_key(now);

        let _guard = self.write_lock.lock().await;
        let mut counters = self.store.get_counters().await.map_err(Error::storage)?;

        counters.total += 1;
        if succeeded {
            counters.success += 1;
        } else {
            counters.failure += 1;
        }
        *counters.daily_totals.entry(day.clone()).or_insert(0) += 1;
        *counters
            .per_user_lifetime
            .entry(user.clone())
            .or_insert(0) += 1;
        let used = self.ledger.charge(&mut counters, user, now);

        self.store
            .set_counters(&counters)
            .await
            .map_err(Error::storage)?;

        debug!("[{user}] usage recorded: day={day} used={used} succeeded={succeeded}");
        Ok(())
    }

    /// Append a history entry, keeping only the newest [`STORED_HISTORY`].
    pub async fn append_history(
        &self,
        user: &UserId,
        query: &str,
        result: Option<&str>,
    ) -> Result<()> {
        let preview = match result {
            Some(text) if !text.is_empty() => text.chars().take(PREVIEW_CHARS).collect(),
            _ => NO_DATA_PREVIEW.to_string(),
        };
        let entry = HistoryEntry {
            query: query.to_string(),
            time: self.clock.now(),
            result_preview: preview,
        };

        let _guard = self.write_lock.lock().await;
        let mut history = self
            .store
            .get_history(user)
            .await
            .map_err(Error::storage)?;
        history.push(entry);
        let overflow = history.len().saturating_sub(STORED_HISTORY);
        history.drain(..overflow);

        self.store
            .set_history(user, &history)
            .await
            .map_err(Error::storage)
    }

    /// The newest [`VISIBLE_HISTORY`] entries, oldest first.
    pub async fn history(&self, user: &UserId) -> Result<Vec<HistoryEntry>> {
        let mut history = self
            .store
            .get_history(user)
            .await
            .map_err(Error::storage)?;
        let skip = history.len().saturating_sub(VISIBLE_HISTORY);
        history.drain(..skip);
        Ok(history)
    }

    pub async fn standing(&self, user: &UserId) -> Result<Standing> {
        let role = self.role(user).await?;
        let subscription = self.active_subscription(user).await?;
        let banned = self.is_banned(user).await?;

        let counters = self.store.get_counters().await.map_err(Error::storage)?;

        let standing = Standing {
            role,
            subscription,
            banned,
            used_today: self.ledger.consumed(&counters, user, self.clock.now()),
            ceiling: QuotaLedger::ceiling(role, subscription.map(|s| s.tier)),
            lifetime: counters.per_user_lifetime.get(user).copied().unwrap_or(0),
        };
        info!(
            "[{user}] standing: {} {}/{}",
            standing.label(),
            standing.used_today,
            standing.ceiling
        );
        Ok(standing)
    }
}
