//! Integration tests for the sea-orm document store.
//!
//! These tests run against an in-memory sqlite database and verify that:
//! - Missing documents read back as empty defaults
//! - Writes replace the previous document instead of duplicating it
//! - Corrupt documents surface as errors
//! - The store drives the entitlement engine end to end

use chrono::{DateTime, TimeDelta, Utc};
use lookup_core::{
    Administration, BotFlags, Counters, EntitlementEngine, HistoryEntry, Subscription, Tier,
    UserId, UserSet, UserStore,
};
use lookup_storage::DocumentStore;
use lookup_storage::entity::documents;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

async fn store() -> DocumentStore {
    let Ok(store) = DocumentStore::new("sqlite::memory:").await else {
        panic!("Failed to open in-memory store");
    };
    store
}

#[tokio::test]
async fn test_missing_documents_are_defaults() {
    let store = store().await;

    let Ok(delegates) = store.get_user_set(UserSet::Delegates).await else {
        panic!("read failed");
    };
    assert!(delegates.is_empty());

    let Ok(counters) = store.get_counters().await else {
        panic!("read failed");
    };
    assert_eq!(counters, Counters::default());

    let Ok(flags) = store.get_flags().await else {
        panic!("read failed");
    };
    assert!(!flags.maintenance);

    let Ok(history) = store.get_history(&UserId::from("42")).await else {
        panic!("read failed");
    };
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_documents_are_replaced_in_place() {
    let store = store().await;
    let first: BTreeSet<UserId> = [UserId::from("1")].into_iter().collect();
    let second: BTreeSet<UserId> = [UserId::from("2"), UserId::from("3")].into_iter().collect();

    assert!(store.set_user_set(UserSet::Banned, &first).await.is_ok());
    assert!(store.set_user_set(UserSet::Banned, &second).await.is_ok());

    let Ok(banned) = store.get_user_set(UserSet::Banned).await else {
        panic!("read failed");
    };
    assert_eq!(banned, second);

    let Ok(rows) = documents::Entity::find().all(store.db()).await else {
        panic!("query failed");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].doc_key, "banned");
}

#[tokio::test]
async fn test_structures_round_trip_through_store() {
    let store = store().await;
    let user = UserId::from("77");
    let expires_at = DateTime::from_timestamp(1_800_000_000, 0).unwrap_or_default();

    let mut subs = BTreeMap::new();
    subs.insert(
        user.clone(),
        Subscription {
            tier: Tier::Pro,
            expires_at,
        },
    );
    assert!(store.set_subscriptions(&subs).await.is_ok());
    assert!(matches!(store.get_subscriptions().await, Ok(s) if s == subs));

    let history = vec![HistoryEntry {
        query: "9876543210".to_string(),
        time: expires_at,
        result_preview: "No data".to_string(),
    }];
    assert!(store.set_history(&user, &history).await.is_ok());
    assert!(matches!(store.get_history(&user).await, Ok(h) if h == history));
    assert!(matches!(store.get_history(&UserId::from("78")).await, Ok(h) if h.is_empty()));

    assert!(store.set_flags(&BotFlags { maintenance: true }).await.is_ok());
    assert!(matches!(store.get_flags().await, Ok(f) if f.maintenance));
}

#[tokio::test]
async fn test_corrupt_document_is_an_error() {
    let store = store().await;
    let row = documents::ActiveModel {
        doc_key: Set("counters".to_string()),
        body: Set("{not json".to_string()),
        updated_at: Set(Utc::now()),
    };
    assert!(row.insert(store.db()).await.is_ok());

    assert!(store.get_counters().await.is_err());
}

#[tokio::test]
async fn test_engine_runs_on_document_store() {
    let store = Arc::new(store().await);
    let owner = UserId::from("1");
    let engine = Arc::new(EntitlementEngine::new(store.clone(), Some(owner)));
    let admin = Administration::new(engine.clone());
    let user = UserId::from("55");

    assert!(admin.add_delegate(&user).await.is_ok());
    assert!(admin.grant_subscription(&user, 30, Tier::Basic).await.is_ok());
    assert!(engine.record_usage(&user, true).await.is_ok());
    assert!(engine.record_usage(&user, false).await.is_ok());

    let Ok(decision) = engine.authorize(&user, false).await else {
        panic!("authorize failed");
    };
    assert!(decision.allowed);
    assert_eq!(decision.ceiling, 25);
    assert_eq!(decision.remaining, 23);

    let Ok(counters) = store.get_counters().await else {
        panic!("read failed");
    };
    assert_eq!(counters.total, 2);
    assert_eq!(counters.success, 1);
    assert_eq!(counters.failure, 1);

    let Ok(subs) = store.get_subscriptions().await else {
        panic!("read failed");
    };
    let Some(sub) = subs.get(&user) else {
        panic!("subscription missing");
    };
    assert!(sub.expires_at > Utc::now() + TimeDelta::days(29));
}
