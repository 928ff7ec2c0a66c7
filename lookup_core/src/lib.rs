#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Entitlement, quota and extraction logic for the lookup bot.
//!
//! The surrounding bot layer talks to this crate through three seams:
//! [`UserStore`] for persistence, [`Fetcher`] for the remote lookup page and
//! [`LookupService`] as the single entry point for a user request.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

pub mod admin;
pub mod clock;
pub mod entitlement;
pub mod error;
pub mod extraction;
pub mod model;
pub mod quota;
pub mod service;
pub mod store;

pub use admin::{Administration, BotStats, SetChange};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entitlement::{DecisionReason, EntitlementDecision, EntitlementEngine, Standing};
pub use error::{Error, Result};
pub use extraction::{ExtractedRecord, Field, Shape, extract};
pub use model::{BotFlags, Counters, HistoryEntry, Role, Subscription, Tier, UserId, UserSet};
pub use quota::{QuotaLedger, UNLIMITED};
pub use service::{LookupOutcome, LookupService, MIN_QUERY_CHARS, Payload};
pub use store::MemoryStore;

/// Durable storage for roles, bans, subscriptions, counters and history.
///
/// Every getter returns an empty/default structure when nothing has been
/// stored yet; only an unreachable or corrupt backend is an error.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_set(&self, set: UserSet) -> anyhow::Result<BTreeSet<UserId>>;
    async fn set_user_set(&self, set: UserSet, users: &BTreeSet<UserId>) -> anyhow::Result<()>;

    async fn get_subscriptions(&self) -> anyhow::Result<BTreeMap<UserId, Subscription>>;
    async fn set_subscriptions(
        &self,
        subscriptions: &BTreeMap<UserId, Subscription>,
    ) -> anyhow::Result<()>;

    async fn get_counters(&self) -> anyhow::Result<Counters>;
    async fn set_counters(&self, counters: &Counters) -> anyhow::Result<()>;

    /// Stored history for one user, most recent last.
    async fn get_history(&self, user: &UserId) -> anyhow::Result<Vec<HistoryEntry>>;
    async fn set_history(&self, user: &UserId, entries: &[HistoryEntry]) -> anyhow::Result<()>;

    async fn get_flags(&self) -> anyhow::Result<BotFlags>;
    async fn set_flags(&self, flags: &BotFlags) -> anyhow::Result<()>;
}

/// Retrieves the raw lookup page for a query.
///
/// Implementations do not need to distinguish failure causes; the caller
/// collapses every error (and empty bodies) into "no usable text".
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, query: &str) -> anyhow::Result<String>;
}
