//! Timer behaviour of stores: debounce modes, periodic ticks, manual refresh,
//! lazy activation and teardown. Runs on a paused clock.

mod common;

use std::time::Duration;

use argus_core::domains::assignees::{AssigneeKey, Assignees};
use argus_core::domains::test_runs::{TestRuns, TestRunsKey};
use argus_core::{AlertHub, DebounceMode, SchedulePolicy, Store, StoreState};
use common::{transport, ScriptedTransport};
use serde_json::json;
use tokio::time::sleep;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[tokio::test(start_paused = true)]
async fn first_registration_wins_and_fetch_sees_later_keys() {
    let t = transport(ScriptedTransport::ok(json!({})));
    let store = Store::new(Assignees, t.clone(), AlertHub::default());
    let _sub = store.subscribe();

    store.register(AssigneeKey::group("5.2", "longevity"));
    sleep(ms(200)).await;
    store.register(AssigneeKey::test("5.2", "longevity-50gb-3days"));
    sleep(ms(60)).await;

    assert_eq!(t.call_count(), 1);
    let req = t.last_request().await.unwrap();
    assert_eq!(
        req.body,
        Some(json!({
            "5.2": {"groups": ["longevity"], "tests": ["longevity-50gb-3days"]}
        }))
    );

    // The second registration did not start a timer of its own
    sleep(ms(500)).await;
    assert_eq!(t.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn reset_debounce_waits_for_quiet_period() {
    let t = transport(ScriptedTransport::ok(json!({})));
    let policy = SchedulePolicy::new()
        .debounce(ms(50))
        .debounce_mode(DebounceMode::Reset);
    let store = Store::builder(Assignees, t.clone(), AlertHub::default())
        .policy(policy)
        .build();
    let _sub = store.subscribe();

    for group in ["a", "b", "c"] {
        store.register(AssigneeKey::group("5.2", group));
        sleep(ms(40)).await;
    }
    // last registration at 80ms, deadline 130ms
    assert_eq!(t.call_count(), 0);
    sleep(ms(20)).await;
    assert_eq!(t.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_interest_schedules_a_debounced_fetch() {
    let t = transport(ScriptedTransport::ok(json!({})));
    let store = Store::new(Assignees, t.clone(), AlertHub::default());
    let _sub = store.subscribe();

    let guard = store.hold(AssigneeKey::group("5.2", "a"));
    store.register(AssigneeKey::group("5.2", "b"));
    sleep(ms(300)).await;
    assert_eq!(t.call_count(), 1);

    drop(guard);
    sleep(ms(200)).await;
    assert_eq!(t.call_count(), 1);
    sleep(ms(100)).await;
    assert_eq!(t.call_count(), 2);
    assert_eq!(
        t.last_request().await.unwrap().body,
        Some(json!({"5.2": {"groups": ["b"], "tests": []}}))
    );
}

#[tokio::test(start_paused = true)]
async fn timers_due_together_run_one_fetch() {
    let t = transport(ScriptedTransport::ok(json!({})));
    let policy = SchedulePolicy::new().debounce(ms(100)).periodic(None, ms(100));
    let store = Store::builder(Assignees, t.clone(), AlertHub::default())
        .policy(policy)
        .build();
    let _sub = store.subscribe();

    store.register(AssigneeKey::group("5.2", "longevity"));
    sleep(ms(150)).await;

    assert_eq!(t.call_count(), 1);
    assert_eq!(store.stats().fetches_skipped, 0);
}

#[tokio::test(start_paused = true)]
async fn periodic_ticks_stop_on_last_unsubscribe_and_resume() {
    let t = transport(ScriptedTransport::ok(json!({"A": 1})));
    let store = Store::builder(Assignees, t.clone(), AlertHub::default())
        .policy(SchedulePolicy::new().periodic(None, ms(100)))
        .build();
    assert_eq!(store.state(), StoreState::Inactive);

    let sub = store.subscribe();
    sleep(ms(350)).await;
    assert_eq!(t.call_count(), 3);
    assert_eq!(store.state(), StoreState::Idle);

    drop(sub);
    assert_eq!(store.state(), StoreState::Inactive);
    sleep(ms(1000)).await;
    assert_eq!(t.call_count(), 3);

    let sub = store.subscribe();
    assert_eq!(sub.current().revision, 3);
    sleep(ms(150)).await;
    assert_eq!(t.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn timers_keep_running_without_teardown() {
    let t = transport(ScriptedTransport::ok(json!({})));
    let store = Store::builder(Assignees, t.clone(), AlertHub::default())
        .policy(SchedulePolicy::new().periodic(Some(Duration::ZERO), ms(100)))
        .teardown_on_idle(false)
        .build();

    drop(store.subscribe());
    sleep(ms(250)).await;
    assert_eq!(t.call_count(), 3);
    assert_eq!(store.state(), StoreState::Idle);
}

#[tokio::test(start_paused = true)]
async fn registrations_before_first_subscriber_are_fetched_after_activation() {
    let t = transport(ScriptedTransport::ok(json!({})));
    let store = Store::new(Assignees, t.clone(), AlertHub::default());

    store.register(AssigneeKey::group("master", "artifacts"));
    sleep(ms(1000)).await;
    assert_eq!(t.call_count(), 0);

    let _sub = store.subscribe();
    sleep(ms(10)).await;
    assert_eq!(t.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_refresh_waits_refresh_delay() {
    let t = transport(ScriptedTransport::ok(json!({})));
    let store = Store::new(TestRuns::default(), t.clone(), AlertHub::default());
    let _sub = store.subscribe();

    store.register(TestRunsKey::new("t1"));
    store.request_refresh();
    sleep(ms(100)).await;
    assert_eq!(t.call_count(), 0);
    sleep(ms(100)).await;
    assert_eq!(t.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_event_prunes_runs_but_keeps_snapshot() {
    let t = transport(ScriptedTransport::new(|req| {
        let runs = req.body.as_ref().unwrap()["runs"].clone();
        let payload: serde_json::Map<_, _> = runs
            .as_object()
            .unwrap()
            .keys()
            .map(|id| (id.clone(), json!([{"id": format!("{}-run", id)}])))
            .collect();
        Ok(argus_core::ApiEnvelope::ok(serde_json::Value::Object(payload)))
    }));
    let store = Store::new(TestRuns::default(), t.clone(), AlertHub::default());

    store.register(TestRunsKey::new("t1"));
    store.register(TestRunsKey::with_runs("t2", ["r7"]));
    store.refresh_now().await;

    assert_eq!(store.forget_where(|k| k.test_id == "t1"), 1);
    store.refresh_now().await;

    let last = t.last_request().await.unwrap();
    assert_eq!(last.body.unwrap()["runs"], json!({"t2": ["r7"]}));
    let snap = store.snapshot();
    assert!(snap.get("t1").is_some());
    assert_eq!(
        argus_core::domains::test_runs::runs_of(&snap, "t2"),
        &[json!({"id": "t2-run"})]
    );
}

#[tokio::test(start_paused = true)]
async fn disposed_store_never_rearms() {
    let t = transport(ScriptedTransport::ok(json!({"A": 1})));
    let store = Store::builder(Assignees, t.clone(), AlertHub::default())
        .policy(SchedulePolicy::new().periodic(Some(Duration::ZERO), ms(100)))
        .build();

    let sub = store.subscribe();
    sleep(ms(50)).await;
    assert_eq!(t.call_count(), 1);

    store.dispose();
    assert!(store.is_disposed());
    drop(sub);
    let _again = store.subscribe();
    sleep(ms(1000)).await;
    assert_eq!(t.call_count(), 1);
    assert_eq!(store.state(), StoreState::Inactive);

    // Manual fetches still work on a disposed store
    assert!(store.refresh_now().await.is_updated());
}
