//! In-process [`UserStore`] used by tests and the CLI `--memory` mode.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

use crate::UserStore;
use crate::model::{BotFlags, Counters, HistoryEntry, Subscription, UserId, UserSet};

#[derive(Debug, Default)]
struct Inner {
    sets: HashMap<UserSet, BTreeSet<UserId>>,
    subscriptions: BTreeMap<UserId, Subscription>,
    counters: Counters,
    history: HashMap<UserId, Vec<HistoryEntry>>,
    flags: BotFlags,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user_set(&self, set: UserSet) -> anyhow::Result<BTreeSet<UserId>> {
        Ok(self
            .inner
            .read()
            .await
            .sets
            .get(&set)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_user_set(&self, set: UserSet, users: &BTreeSet<UserId>) -> anyhow::Result<()> {
        self.inner.write().await.sets.insert(set, users.clone());
        Ok(())
    }

    async fn get_subscriptions(&self) -> anyhow::Result<BTreeMap<UserId, Subscription>> {
        Ok(self.inner.read().await.subscriptions.clone())
    }

    async fn set_subscriptions(
        &self,
        subscriptions: &BTreeMap<UserId, Subscription>,
    ) -> anyhow::Result<()> {
        self.inner.write().await.subscriptions = subscriptions.clone();
        Ok(())
    }

    async fn get_counters(&self) -> anyhow::Result<Counters> {
        Ok(self.inner.read().await.counters.clone())
    }

    async fn set_counters(&self, counters: &Counters) -> anyhow::Result<()> {
        self.inner.write().await.counters = counters.clone();
        Ok(())
    }

    async fn get_history(&self, user: &UserId) -> anyhow::Result<Vec<HistoryEntry>> {
        Ok(self
            .inner
            .read()
            .await
            .history
            .get(user)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_history(&self, user: &UserId, entries: &[HistoryEntry]) -> anyhow::Result<()> {
        self.inner
            .write()
            .await
            .history
            .insert(user.clone(), entries.to_vec());
        Ok(())
    }

    async fn get_flags(&self) -> anyhow::Result<BotFlags> {
        Ok(self.inner.read().await.flags)
    }

    async fn set_flags(&self, flags: &BotFlags) -> anyhow::Result<()> {
        self.inner.write().await.flags = *flags;
        Ok(())
    }
}
