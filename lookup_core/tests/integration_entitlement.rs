//! Integration tests for entitlement decisions and quota accounting.
//!
//! These tests verify that:
//! - Ceilings follow role and tier, and exhaust after exactly that many uses
//! - `authorize` has no side effects
//! - Consumption is keyed by calendar day
//! - History storage is capped while reads expose a shorter window

use chrono::{DateTime, TimeDelta, Utc};
use lookup_core::{
    DecisionReason, EntitlementEngine, ManualClock, MemoryStore, QuotaLedger, Subscription,
    Tier, UserId, UserSet, UserStore,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const OWNER: &str = "100";

// 2026-05-10 09:00:00 UTC
fn morning() -> DateTime<Utc> {
    DateTime::from_timestamp(1_778_403_600, 0).unwrap_or_default()
}

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    engine: EntitlementEngine,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(morning()));
    let engine = EntitlementEngine::new(store.clone(), Some(UserId::from(OWNER)))
        .with_clock(clock.clone())
        .with_ledger(QuotaLedger::new(0));
    Harness {
        store,
        clock,
        engine,
    }
}

async fn subscribe(store: &MemoryStore, user: &UserId, tier: Tier) {
    let mut subs = BTreeMap::new();
    subs.insert(
        user.clone(),
        Subscription {
            tier,
            expires_at: morning() + TimeDelta::days(30),
        },
    );
    assert!(store.set_subscriptions(&subs).await.is_ok());
}

#[tokio::test]
async fn test_vip_quota_exhausts_after_one_hundred_lookups() {
    let h = harness();
    let user = UserId::from("501");
    subscribe(&h.store, &user, Tier::Vip).await;

    for used in 0..100_u64 {
        let Ok(decision) = h.engine.authorize(&user, false).await else {
            panic!("authorize failed");
        };
        assert!(decision.allowed, "denied after {used} lookups");
        assert_eq!(decision.remaining, 100 - used);
        assert!(h.engine.record_usage(&user, true).await.is_ok());
    }

    let Ok(decision) = h.engine.authorize(&user, false).await else {
        panic!("authorize failed");
    };
    assert_eq!(decision.reason, DecisionReason::QuotaExceeded);
    assert_eq!(decision.remaining, 0);
    assert_eq!(decision.ceiling, 100);
}

#[tokio::test]
async fn test_authorize_is_repeatable() {
    let h = harness();
    let user = UserId::from("502");
    subscribe(&h.store, &user, Tier::Basic).await;
    assert!(h.engine.record_usage(&user, true).await.is_ok());

    let first = h.engine.authorize(&user, false).await.ok();
    let second = h.engine.authorize(&user, false).await.ok();
    assert!(first.is_some());
    assert_eq!(first, second);

    let Ok(counters) = h.store.get_counters().await else {
        panic!("counters unavailable");
    };
    assert_eq!(counters.total, 1);
}

#[tokio::test]
async fn test_quota_resets_on_new_day() {
    let h = harness();
    let user = UserId::from("503");
    let delegates: BTreeSet<UserId> = [user.clone()].into_iter().collect();
    assert!(h.store.set_user_set(UserSet::Delegates, &delegates).await.is_ok());

    for _ in 0..20 {
        assert!(h.engine.record_usage(&user, true).await.is_ok());
    }
    let Ok(decision) = h.engine.authorize(&user, false).await else {
        panic!("authorize failed");
    };
    assert_eq!(decision.reason, DecisionReason::QuotaExceeded);

    h.clock.advance(TimeDelta::days(1));
    let Ok(decision) = h.engine.authorize(&user, false).await else {
        panic!("authorize failed");
    };
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 20);
    assert!(matches!(h.engine.consumed_today(&user).await, Ok(0)));
}

#[tokio::test]
async fn test_banned_owner_is_banned() {
    let h = harness();
    let owner = UserId::from(OWNER);
    let banned: BTreeSet<UserId> = [owner.clone()].into_iter().collect();
    assert!(h.store.set_user_set(UserSet::Banned, &banned).await.is_ok());

    let Ok(decision) = h.engine.authorize(&owner, false).await else {
        panic!("authorize failed");
    };
    assert_eq!(decision.reason, DecisionReason::Banned);
    assert!(!decision.allowed);
}

#[tokio::test]
async fn test_ban_checked_before_maintenance_for_owner_only() {
    let h = harness();
    let user = UserId::from("504");
    let banned: BTreeSet<UserId> = [user.clone()].into_iter().collect();
    assert!(h.store.set_user_set(UserSet::Banned, &banned).await.is_ok());

    let Ok(decision) = h.engine.authorize(&user, true).await else {
        panic!("authorize failed");
    };
    assert_eq!(decision.reason, DecisionReason::MaintenanceMode);
}

#[tokio::test]
async fn test_regular_user_is_unauthorized() {
    let h = harness();
    let Ok(decision) = h.engine.authorize(&UserId::from("505"), false).await else {
        panic!("authorize failed");
    };
    assert_eq!(decision.reason, DecisionReason::Unauthorized);
    assert_eq!(decision.remaining, 0);
}

#[tokio::test]
async fn test_owner_is_effectively_unlimited() {
    let h = harness();
    let owner = UserId::from(OWNER);
    for _ in 0..250 {
        assert!(h.engine.record_usage(&owner, true).await.is_ok());
    }
    let Ok(decision) = h.engine.authorize(&owner, false).await else {
        panic!("authorize failed");
    };
    assert!(decision.allowed);
    assert_eq!(decision.ceiling, lookup_core::UNLIMITED);
}

#[tokio::test]
async fn test_history_is_capped() {
    let h = harness();
    let user = UserId::from("506");

    for i in 0..60 {
        let query = format!("query-{i}");
        assert!(h.engine.append_history(&user, &query, Some("result")).await.is_ok());
        h.clock.advance(TimeDelta::seconds(1));
    }

    let Ok(stored) = h.store.get_history(&user).await else {
        panic!("history unavailable");
    };
    assert_eq!(stored.len(), 50);
    assert_eq!(stored[0].query, "query-10");
    assert_eq!(stored[49].query, "query-59");
    assert!(stored.windows(2).all(|w| w[0].time < w[1].time));

    let Ok(visible) = h.engine.history(&user).await else {
        panic!("history unavailable");
    };
    assert_eq!(visible.len(), 20);
    assert_eq!(visible[0].query, "query-40");
    assert_eq!(visible[19].query, "query-59");
}
