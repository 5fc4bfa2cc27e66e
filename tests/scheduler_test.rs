//! Aggregator scheduling under a paused tokio clock.
//!
//! Covers fault isolation between providers, the single evaluation per
//! cycle, fetch budgets, and timer replacement while a cycle is in flight.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use tokenmeter::core::budgets::BudgetConfig;
use tokenmeter::core::credentials::CredentialStore;
use tokenmeter::core::models::Fetched;
use tokenmeter::core::provider::Provider;
use tokenmeter::core::scheduler::Aggregator;
use tokenmeter::providers::UsageAdapter;
use tokenmeter::test_utils::{FakeAdapter, MemoryCredentials, RecordingSink, make_test_rate_limit};

use common::logger::TestLogger;

fn build(
    adapters: &[&Arc<FakeAdapter>],
    credentials: &MemoryCredentials,
) -> (Aggregator, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let adapters: Vec<Arc<dyn UsageAdapter>> = adapters
        .iter()
        .map(|a| Arc::clone(a) as Arc<dyn UsageAdapter>)
        .collect();
    let aggregator = Aggregator::builder(adapters, Arc::new(credentials.clone()), sink.clone())
        .fetch_timeout(Duration::from_secs(1))
        .build();
    (aggregator, sink)
}

fn both_keys() -> MemoryCredentials {
    MemoryCredentials::with(&[(Provider::Anthropic, "sk-ant"), (Provider::OpenAI, "sk-oai")])
}

// =============================================================================
// Fault Isolation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn failing_provider_does_not_block_others() {
    let log = TestLogger::new("failing_provider_does_not_block_others");
    log.phase("setup");
    let anthropic = Arc::new(FakeAdapter::new(Provider::Anthropic).failing());
    let openai = Arc::new(FakeAdapter::new(Provider::OpenAI).with_cost(2.0));
    let (agg, _) = build(&[&anthropic, &openai], &both_keys());

    log.phase("execute");
    let report = agg.poll_once().await;

    log.phase("verify");
    assert_eq!(report.providers_polled, vec![Provider::Anthropic, Provider::OpenAI]);
    assert_eq!(report.providers_updated, vec![Provider::OpenAI]);
    assert!(agg.snapshot(Provider::Anthropic).await.is_none());
    let openai_snap = agg.snapshot(Provider::OpenAI).await.unwrap();
    assert!((openai_snap.total_cost_usd - 2.0).abs() < 1e-9);
    log.finish_ok();
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_keeps_previous_snapshot() {
    let anthropic = Arc::new(
        FakeAdapter::new(Provider::Anthropic)
            .with_cost(3.0)
            .with_rate_limit(make_test_rate_limit(40, 50)),
    );
    let (agg, _) = build(&[&anthropic], &both_keys());

    agg.poll_once().await;
    let before = agg.snapshot(Provider::Anthropic).await.unwrap();

    anthropic.set_usage(Fetched::NoData("HTTP 500".to_string()));
    anthropic.set_rate_limit(Fetched::NoData("HTTP 500".to_string()));
    let report = agg.poll_once().await;

    assert!(report.providers_updated.is_empty());
    assert_eq!(agg.snapshot(Provider::Anthropic).await.unwrap(), before);
}

#[tokio::test(start_paused = true)]
async fn fresh_rate_limit_with_failed_usage_keeps_old_models() {
    let anthropic = Arc::new(FakeAdapter::new(Provider::Anthropic).with_cost(4.0));
    let (agg, _) = build(&[&anthropic], &both_keys());
    agg.poll_once().await;

    anthropic.set_usage(Fetched::NoData("HTTP 503".to_string()));
    anthropic.set_rate_limit(Fetched::Data(make_test_rate_limit(10, 50)));
    let report = agg.poll_once().await;

    assert_eq!(report.providers_updated, vec![Provider::Anthropic]);
    let snap = agg.snapshot(Provider::Anthropic).await.unwrap();
    assert!((snap.total_cost_usd - 4.0).abs() < 1e-9);
    assert_eq!(snap.rate_limit.unwrap().requests_remaining, Some(10));
}

#[tokio::test(start_paused = true)]
async fn providers_without_credentials_are_skipped() {
    let anthropic = Arc::new(FakeAdapter::new(Provider::Anthropic).with_cost(1.0));
    let openai = Arc::new(FakeAdapter::new(Provider::OpenAI).with_cost(1.0));
    let credentials = MemoryCredentials::with(&[(Provider::OpenAI, "sk-oai")]);
    let (agg, _) = build(&[&anthropic, &openai], &credentials);

    let report = agg.poll_once().await;

    assert_eq!(report.providers_polled, vec![Provider::OpenAI]);
    assert_eq!(anthropic.calls(), 0);
    assert_eq!(openai.credentials_seen(), vec!["sk-oai".to_string()]);
}

// =============================================================================
// Evaluation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn evaluation_runs_once_after_slowest_provider() {
    let log = TestLogger::new("evaluation_runs_once_after_slowest_provider");
    log.phase("setup");
    let anthropic = Arc::new(FakeAdapter::new(Provider::Anthropic).with_cost(8.5));
    let openai = Arc::new(
        FakeAdapter::new(Provider::OpenAI)
            .with_cost(1.41)
            .with_delay(Duration::from_secs(3)),
    );
    let (agg, sink) = build(&[&anthropic, &openai], &both_keys());

    log.phase("execute");
    let started = Instant::now();
    let report = agg.poll_once().await;

    log.phase("verify");
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(report.alerts_fired.len(), 1);
    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("$9.91"), "body: {}", sent[0].1);
    assert!(sent[0].1.contains("Top: Anthropic ($8.50)"));
    log.finish_ok();
}

#[tokio::test(start_paused = true)]
async fn slow_provider_is_cut_off_at_fetch_budget() {
    // fetch_timeout 1s gives a 7s budget per provider.
    let anthropic = Arc::new(
        FakeAdapter::new(Provider::Anthropic)
            .with_cost(5.0)
            .with_delay(Duration::from_secs(120)),
    );
    let openai = Arc::new(FakeAdapter::new(Provider::OpenAI).with_cost(1.0));
    let (agg, _) = build(&[&anthropic, &openai], &both_keys());

    let started = Instant::now();
    let report = agg.poll_once().await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(7));
    assert!(elapsed < Duration::from_secs(120));
    assert_eq!(report.providers_updated, vec![Provider::OpenAI]);
    assert!(agg.snapshot(Provider::Anthropic).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn save_credential_polls_immediately() {
    let anthropic = Arc::new(FakeAdapter::new(Provider::Anthropic).with_cost(0.5));
    let credentials = MemoryCredentials::default();
    let (agg, _) = build(&[&anthropic], &credentials);

    let report = agg.save_credential(Provider::Anthropic, "sk-new").await.unwrap();

    assert_eq!(report.providers_updated, vec![Provider::Anthropic]);
    assert_eq!(credentials.get(Provider::Anthropic).as_deref(), Some("sk-new"));
    assert_eq!(anthropic.credentials_seen(), vec!["sk-new".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn deleted_credential_stops_polling_that_provider() {
    let anthropic = Arc::new(FakeAdapter::new(Provider::Anthropic).with_cost(0.5));
    let (agg, _) = build(&[&anthropic], &both_keys());

    agg.poll_once().await;
    agg.delete_credential(Provider::Anthropic).unwrap();
    let report = agg.poll_once().await;

    assert!(report.providers_polled.is_empty());
    assert_eq!(anthropic.calls(), 1);
    assert!(agg.snapshot(Provider::Anthropic).await.is_some());
}

// =============================================================================
// Timer
// =============================================================================

#[tokio::test(start_paused = true)]
async fn polling_runs_immediately_then_every_period() {
    let anthropic = Arc::new(FakeAdapter::new(Provider::Anthropic).with_cost(1.0));
    let (agg, _) = build(&[&anthropic], &both_keys());

    agg.start_polling_with_period(Duration::from_secs(60)).await;
    sleep(Duration::from_secs(1)).await;
    assert_eq!(anthropic.calls(), 1);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(anthropic.calls(), 2);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(anthropic.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn reconfiguring_mid_cycle_leaves_one_timer() {
    let log = TestLogger::new("reconfiguring_mid_cycle_leaves_one_timer");
    log.phase("setup");
    let anthropic = Arc::new(
        FakeAdapter::new(Provider::Anthropic)
            .with_cost(1.0)
            .with_delay(Duration::from_secs(5)),
    );
    let (agg, _) = build(&[&anthropic], &both_keys());
    let mut reports = agg.subscribe();

    log.phase("execute");
    agg.start_polling_with_period(Duration::from_secs(60)).await;
    sleep(Duration::from_secs(1)).await;
    assert_eq!(anthropic.calls(), 1, "first cycle in flight");

    // Replace the schedule while cycle 1 is still fetching.
    agg.start_polling_with_period(Duration::from_secs(120)).await;
    sleep(Duration::from_secs(30)).await;

    log.phase("verify");
    // Cycle 1 completed; the new timer's immediate cycle ran after it.
    assert_eq!(anthropic.calls(), 2);
    assert_eq!(agg.cycles_started(), 2);
    assert_eq!(reports.borrow_and_update().as_ref().map(|r| r.cycle), Some(2));

    // The old 60s timer is gone: nothing at t=61.
    sleep(Duration::from_secs(60)).await;
    assert_eq!(anthropic.calls(), 2);

    // The new one fires at t=121.
    sleep(Duration::from_secs(40)).await;
    assert_eq!(anthropic.calls(), 3);
    assert_eq!(agg.polling_period().await, Some(Duration::from_secs(120)));
    log.finish_ok();
}

#[tokio::test(start_paused = true)]
async fn stop_polling_cancels_future_cycles() {
    let anthropic = Arc::new(FakeAdapter::new(Provider::Anthropic).with_cost(1.0));
    let (agg, _) = build(&[&anthropic], &both_keys());

    agg.start_polling(1).await;
    sleep(Duration::from_secs(1)).await;
    assert!(agg.is_polling().await);

    agg.stop_polling().await;
    sleep(Duration::from_secs(600)).await;

    assert!(!agg.is_polling().await);
    assert_eq!(anthropic.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn budget_interval_change_reschedules() {
    let anthropic = Arc::new(FakeAdapter::new(Provider::Anthropic));
    let (agg, _) = build(&[&anthropic], &both_keys());

    agg.start_polling(5).await;
    assert_eq!(agg.polling_period().await, Some(Duration::from_secs(300)));

    agg.set_budget(BudgetConfig {
        poll_interval_minutes: 1,
        ..BudgetConfig::default()
    })
    .await
    .unwrap();
    assert_eq!(agg.polling_period().await, Some(Duration::from_secs(60)));

    // Same interval again: schedule untouched, no extra immediate poll.
    sleep(Duration::from_secs(1)).await;
    let calls = anthropic.calls();
    agg.set_budget(BudgetConfig {
        poll_interval_minutes: 1,
        daily_usd: 20.0,
        ..BudgetConfig::default()
    })
    .await
    .unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(anthropic.calls(), calls);
}
