//! Owner-side management of delegates, bans, subscriptions and flags.
//!
//! Callers are expected to have checked that the acting user is the owner;
//! this layer only validates its arguments.

use chrono::TimeDelta;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

use crate::entitlement::EntitlementEngine;
use crate::error::{Error, Result};
use crate::model::{Subscription, Tier, UserId, UserSet};
use crate::UserStore;

/// Default subscription length when the owner does not give one.
pub const DEFAULT_SUBSCRIPTION_DAYS: i64 = 30;

/// Whether a set/map mutation actually changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetChange {
    Changed,
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotStats {
    pub known_users: usize,
    pub delegates: usize,
    pub subscriptions: usize,
    pub banned: usize,
    pub total_lookups: u64,
    pub today_lookups: u64,
    pub successful: u64,
    pub failed: u64,
}

#[derive(Clone)]
pub struct Administration {
    engine: Arc<EntitlementEngine>,
}

impl Administration {
    #[must_use]
    pub const fn new(engine: Arc<EntitlementEngine>) -> Self {
        Self { engine }
    }

    async fn members(&self, set: UserSet) -> Result<BTreeSet<UserId>> {
        self.engine
            .store()
            .get_user_set(set)
            .await
            .map_err(Error::storage)
    }

    async fn update_set(
        &self,
        set: UserSet,
        user: &UserId,
        insert: bool,
    ) -> Result<SetChange> {
        let _guard = self.engine.write_lock().lock().await;
        let mut members = self.members(set).await?;
        let changed = if insert {
            members.insert(user.clone())
        } else {
            members.remove(user)
        };
        if !changed {
            return Ok(SetChange::Unchanged);
        }
        self.engine
            .store()
            .set_user_set(set, &members)
            .await
            .map_err(Error::storage)?;
        info!("{set:?} updated: {user} {}", if insert { "added" } else { "removed" });
        Ok(SetChange::Changed)
    }

    pub async fn add_delegate(&self, user: &UserId) -> Result<SetChange> {
        self.update_set(UserSet::Delegates, user, true).await
    }

    pub async fn remove_delegate(&self, user: &UserId) -> Result<SetChange> {
        self.update_set(UserSet::Delegates, user, false).await
    }

    pub async fn delegates(&self) -> Result<BTreeSet<UserId>> {
        self.members(UserSet::Delegates).await
    }

    pub async fn ban(&self, user: &UserId) -> Result<SetChange> {
        self.update_set(UserSet::Banned, user, true).await
    }

    pub async fn unban(&self, user: &UserId) -> Result<SetChange> {
        self.update_set(UserSet::Banned, user, false).await
    }

    pub async fn banned(&self) -> Result<BTreeSet<UserId>> {
        self.members(UserSet::Banned).await
    }

    /// Remember a user for broadcasts and statistics.
    pub async fn register_user(&self, user: &UserId) -> Result<SetChange> {
        self.update_set(UserSet::Known, user, true).await
    }

    pub async fn known_users(&self) -> Result<BTreeSet<UserId>> {
        self.members(UserSet::Known).await
    }

    /// Grant (or replace) a subscription running `days` from now.
    pub async fn grant_subscription(
        &self,
        user: &UserId,
        days: i64,
        tier: Tier,
    ) -> Result<Subscription> {
        if days <= 0 {
            return Err(Error::InvalidArgument(format!(
                "subscription length must be positive, got {days}"
            )));
        }
        let length = TimeDelta::try_days(days)
            .ok_or_else(|| Error::InvalidArgument(format!("{days} days is out of range")))?;
        let expires_at = self
            .engine
            .now()
            .checked_add_signed(length)
            .ok_or_else(|| Error::InvalidArgument(format!("{days} days is out of range")))?;
        let subscription = Subscription { tier, expires_at };

        let _guard = self.engine.write_lock().lock().await;
        let mut subscriptions = self.subscriptions().await?;
        subscriptions.insert(user.clone(), subscription);
        self.engine
            .store()
            .set_subscriptions(&subscriptions)
            .await
            .map_err(Error::storage)?;

        info!("Subscription granted: {user} tier={tier} days={days}");
        Ok(subscription)
    }

    pub async fn revoke_subscription(&self, user: &UserId) -> Result<SetChange> {
        let _guard = self.engine.write_lock().lock().await;
        let mut subscriptions = self.subscriptions().await?;
        if subscriptions.remove(user).is_none() {
            return Ok(SetChange::Unchanged);
        }
        self.engine
            .store()
            .set_subscriptions(&subscriptions)
            .await
            .map_err(Error::storage)?;
        info!("Subscription revoked: {user}");
        Ok(SetChange::Changed)
    }

    /// Every subscription record, expired ones included.
    pub async fn subscriptions(&self) -> Result<BTreeMap<UserId, Subscription>> {
        self.engine
            .store()
            .get_subscriptions()
            .await
            .map_err(Error::storage)
    }

    pub async fn maintenance(&self) -> Result<bool> {
        let flags = self.engine.store().get_flags().await.map_err(Error::storage)?;
        Ok(flags.maintenance)
    }

    pub async fn set_maintenance(&self, enabled: bool) -> Result<()> {
        let _guard = self.engine.write_lock().lock().await;
        let mut flags = self.engine.store().get_flags().await.map_err(Error::storage)?;
        flags.maintenance = enabled;
        self.engine
            .store()
            .set_flags(&flags)
            .await
            .map_err(Error::storage)?;
        info!("Maintenance mode: {}", if enabled { "on" } else { "off" });
        Ok(())
    }

    /// Flip maintenance mode and return the new state.
    pub async fn toggle_maintenance(&self) -> Result<bool> {
        let enabled = !self.maintenance().await?;
        self.set_maintenance(enabled).await?;
        Ok(enabled)
    }

    pub async fn stats(&self) -> Result<BotStats> {
        let store = self.engine.store();
        let counters = store.get_counters().await.map_err(Error::storage)?;
        let today = self.engine.ledger().day_key(self.engine.now());

        Ok(BotStats {
            known_users: self.members(UserSet::Known).await?.len(),
            delegates: self.members(UserSet::Delegates).await?.len(),
            subscriptions: self.subscriptions().await?.len(),
            banned: self.members(UserSet::Banned).await?.len(),
            total_lookups: counters.total,
            today_lookups: counters.daily_totals.get(&today).copied().unwrap_or(0),
            successful: counters.success,
            failed: counters.failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{DateTime, Utc};

    fn admin() -> (Administration, Arc<EntitlementEngine>) {
        let start: DateTime<Utc> = DateTime::from_timestamp(1_767_268_800, 0).unwrap_or_default();
        let engine = Arc::new(
            EntitlementEngine::new(Arc::new(MemoryStore::new()), Some(UserId::from("1")))
                .with_clock(Arc::new(ManualClock::new(start))),
        );
        (Administration::new(engine.clone()), engine)
    }

    #[tokio::test]
    async fn delegate_membership_round_trip() {
        let (admin, engine) = admin();
        let user = UserId::from("22");

        assert!(matches!(admin.add_delegate(&user).await, Ok(SetChange::Changed)));
        assert!(matches!(admin.add_delegate(&user).await, Ok(SetChange::Unchanged)));
        assert!(matches!(engine.role(&user).await, Ok(crate::Role::Delegate)));

        assert!(matches!(admin.remove_delegate(&user).await, Ok(SetChange::Changed)));
        assert!(matches!(engine.role(&user).await, Ok(crate::Role::Regular)));
    }

    #[tokio::test]
    async fn grant_rejects_non_positive_days() {
        let (admin, _) = admin();
        let result = admin.grant_subscription(&UserId::from("5"), 0, Tier::Pro).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn granted_subscription_is_active() {
        let (admin, engine) = admin();
        let user = UserId::from("5");
        assert!(admin.grant_subscription(&user, 7, Tier::Vip).await.is_ok());

        let Ok(Some(sub)) = engine.active_subscription(&user).await else {
            panic!("subscription should be active");
        };
        assert_eq!(sub.tier, Tier::Vip);

        assert!(matches!(admin.revoke_subscription(&user).await, Ok(SetChange::Changed)));
        assert!(matches!(engine.active_subscription(&user).await, Ok(None)));
    }

    #[tokio::test]
    async fn maintenance_toggles() {
        let (admin, _) = admin();
        assert!(matches!(admin.toggle_maintenance().await, Ok(true)));
        assert!(matches!(admin.maintenance().await, Ok(true)));
        assert!(matches!(admin.toggle_maintenance().await, Ok(false)));
    }

    #[tokio::test]
    async fn stats_count_sets_and_lookups() {
        let (admin, engine) = admin();
        let user = UserId::from("8");
        let _ = admin.register_user(&user).await;
        let _ = admin.ban(&UserId::from("9")).await;
        let _ = engine.record_usage(&user, true).await;
        let _ = engine.record_usage(&user, false).await;

        let Ok(stats) = admin.stats().await else {
            panic!("stats failed");
        };
        assert_eq!(stats.known_users, 1);
        assert_eq!(stats.banned, 1);
        assert_eq!(stats.total_lookups, 2);
        assert_eq!(stats.today_lookups, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
    }
}
