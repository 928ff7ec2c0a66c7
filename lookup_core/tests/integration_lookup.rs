//! Integration tests for the lookup request pipeline.
//!
//! These tests drive `LookupService` with scripted fetchers and verify that:
//! - Short queries never reach authorization or the fetcher
//! - Denials do not consume quota
//! - Fetch failures and timeouts still consume quota and yield `NoData`
//! - Unstructured pages fall back to raw text
//! - Concurrent requests from one user cannot overshoot the ceiling

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use lookup_core::{
    DecisionReason, EntitlementEngine, Fetcher, LookupOutcome, LookupService, ManualClock,
    MemoryStore, Payload, Subscription, Tier, UserId, UserStore,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

enum Script {
    Page(&'static str),
    Fail,
    Hang,
}

struct ScriptedFetcher {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _query: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Page(text) => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(text.to_string())
            }
            Script::Fail => Err(anyhow!("connection reset")),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(String::new())
            }
        }
    }
}

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_778_403_600, 0).unwrap_or_default()
}

async fn service_with(
    fetcher: Arc<ScriptedFetcher>,
    tier: Option<Tier>,
) -> (Arc<LookupService>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    if let Some(tier) = tier {
        let mut subs = BTreeMap::new();
        subs.insert(
            UserId::from("7"),
            Subscription {
                tier,
                expires_at: now() + TimeDelta::days(1),
            },
        );
        assert!(store.set_subscriptions(&subs).await.is_ok());
    }
    let engine = Arc::new(
        EntitlementEngine::new(store.clone(), Some(UserId::from("1")))
            .with_clock(Arc::new(ManualClock::new(now()))),
    );
    let service = LookupService::new(engine, fetcher).with_timeout(Duration::from_millis(200));
    (Arc::new(service), store)
}

#[tokio::test]
async fn test_short_query_is_ignored() {
    let fetcher = ScriptedFetcher::new(Script::Page("[]"));
    let (service, store) = service_with(fetcher.clone(), None).await;

    let outcome = service
        .handle_lookup_request(&UserId::from("7"), "  ab  ", false)
        .await;
    assert!(matches!(outcome, Ok(LookupOutcome::Ignored)));
    assert_eq!(fetcher.calls(), 0);

    let Ok(counters) = store.get_counters().await else {
        panic!("counters unavailable");
    };
    assert_eq!(counters.total, 0);
}

#[tokio::test]
async fn test_unauthorized_user_is_denied_without_fetch() {
    let fetcher = ScriptedFetcher::new(Script::Page("[]"));
    let (service, store) = service_with(fetcher.clone(), None).await;

    let Ok(LookupOutcome::Denied(decision)) = service
        .handle_lookup_request(&UserId::from("7"), "9876543210", false)
        .await
    else {
        panic!("expected denial");
    };
    assert_eq!(decision.reason, DecisionReason::Unauthorized);
    assert_eq!(fetcher.calls(), 0);
    assert!(matches!(store.get_counters().await, Ok(c) if c.total == 0));
}

#[tokio::test]
async fn test_structured_page_yields_records() {
    let fetcher = ScriptedFetcher::new(Script::Page(
        r#"<pre>{"success":true,"result":[{"name":"A","mobile":"1"},{"name":"B"}]}</pre>"#,
    ));
    let (service, store) = service_with(fetcher, Some(Tier::Basic)).await;
    let user = UserId::from("7");

    let Ok(LookupOutcome::Completed {
        decision,
        query,
        payload: Payload::Records(records),
    }) = service.handle_lookup_request(&user, " 9876543210 ", false).await
    else {
        panic!("expected records");
    };
    assert_eq!(query, "9876543210");
    assert_eq!(decision.remaining, 25);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].ordinal, 2);

    let Ok(history) = store.get_history(&user).await else {
        panic!("history unavailable");
    };
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].query, "9876543210");

    let Ok(counters) = store.get_counters().await else {
        panic!("counters unavailable");
    };
    assert_eq!(counters.success, 1);
}

#[tokio::test]
async fn test_unstructured_page_falls_back_to_raw_text() {
    let fetcher = ScriptedFetcher::new(Script::Page("Number not found <b>sorry</b>"));
    let (service, _) = service_with(fetcher, Some(Tier::Pro)).await;

    let outcome = service
        .handle_lookup_request(&UserId::from("7"), "12345", false)
        .await;
    let Ok(LookupOutcome::Completed {
        payload: Payload::RawText(text),
        ..
    }) = outcome
    else {
        panic!("expected raw text fallback");
    };
    assert!(text.contains("<b>sorry</b>"));
}

#[tokio::test]
async fn test_failed_fetch_consumes_quota() {
    let fetcher = ScriptedFetcher::new(Script::Fail);
    let (service, store) = service_with(fetcher, Some(Tier::Basic)).await;
    let user = UserId::from("7");

    let outcome = service.handle_lookup_request(&user, "12345", false).await;
    assert!(matches!(
        outcome,
        Ok(LookupOutcome::Completed {
            payload: Payload::NoData,
            ..
        })
    ));

    let Ok(counters) = store.get_counters().await else {
        panic!("counters unavailable");
    };
    assert_eq!(counters.failure, 1);
    let Ok(history) = store.get_history(&user).await else {
        panic!("history unavailable");
    };
    assert_eq!(history[0].result_preview, "No data");

    let Ok(decision) = service.engine().authorize(&user, false).await else {
        panic!("authorize failed");
    };
    assert_eq!(decision.remaining, 24);
}

#[tokio::test]
async fn test_timeout_is_a_failed_attempt() {
    let fetcher = ScriptedFetcher::new(Script::Hang);
    let (service, store) = service_with(fetcher, Some(Tier::Vip)).await;

    let outcome = service
        .handle_lookup_request(&UserId::from("7"), "12345", false)
        .await;
    assert!(matches!(
        outcome,
        Ok(LookupOutcome::Completed {
            payload: Payload::NoData,
            ..
        })
    ));
    assert!(matches!(store.get_counters().await, Ok(c) if c.failure == 1 && c.total == 1));
}

#[tokio::test]
async fn test_maintenance_denies_regular_users() {
    let fetcher = ScriptedFetcher::new(Script::Page("[]"));
    let (service, _) = service_with(fetcher.clone(), Some(Tier::Vip)).await;

    let outcome = service
        .handle_lookup_request(&UserId::from("7"), "12345", true)
        .await;
    assert!(matches!(
        outcome,
        Ok(LookupOutcome::Denied(d)) if d.reason == DecisionReason::MaintenanceMode
    ));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_respect_ceiling() {
    let fetcher = ScriptedFetcher::new(Script::Page(r#"[{"id":"1"}]"#));
    let (service, store) = service_with(fetcher.clone(), Some(Tier::Basic)).await;

    let mut tasks = Vec::new();
    for _ in 0..40 {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            service
                .handle_lookup_request(&UserId::from("7"), "12345", false)
                .await
        }));
    }

    let mut completed = 0;
    let mut exceeded = 0;
    for task in tasks {
        match task.await {
            Ok(Ok(LookupOutcome::Completed { .. })) => completed += 1,
            Ok(Ok(LookupOutcome::Denied(d))) if d.reason == DecisionReason::QuotaExceeded => {
                exceeded += 1;
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(completed, 25);
    assert_eq!(exceeded, 15);
    assert_eq!(fetcher.calls(), 25);
    assert!(matches!(store.get_counters().await, Ok(c) if c.total == 25));
}
