//! Integration tests for the dispatcher.
//!
//! Scripts run in real sandboxes and emit through a real `EventBus`; only
//! the WebSocket transport is left out.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{harness, next_outbound};
use reflex_core::event::Event;
use reflex_core::scripting::Outcome;
use reflex_core::types::ScriptKey;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Test: an event reaches every script under its channel and topic, and no
// other
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fans_out_to_every_matching_script() {
    let mut h = harness(
        &[
            ("home", "lights", "a", r#"send.ws({ script = "a" })"#),
            ("home", "lights", "b", r#"send.ws({ script = "b" })"#),
            ("home", "door", "c", r#"send.ws({ script = "c" })"#),
            ("garden", "lights", "d", r#"send.ws({ script = "d" })"#),
        ],
        TIMEOUT,
    );

    let handles = h.dispatcher.dispatch(Arc::new(Event::new("home", "lights")));
    assert_eq!(handles.len(), 2);
    for handle in handles {
        assert_eq!(handle.await.expect("unit task"), Outcome::Completed);
    }

    let mut seen = vec![
        next_outbound(&mut h.receivers.outbound).await,
        next_outbound(&mut h.receivers.outbound).await,
    ];
    seen.sort_by_key(|v| v["script"].as_str().map(str::to_owned));
    assert_eq!(seen, vec![json!({ "script": "a" }), json!({ "script": "b" })]);
    assert!(h.receivers.outbound.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: an event with no registered scripts starts nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unmatched_event_starts_nothing() {
    let h = harness(&[("home", "lights", "a", "")], TIMEOUT);

    assert!(h.dispatcher.dispatch(Arc::new(Event::new("home", "door"))).is_empty());
    assert!(h.dispatcher.dispatch(Arc::new(Event::new("HOME", "lights"))).is_empty());
}

// ---------------------------------------------------------------------------
// Test: a running script is skipped, then runs again once it has finished
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn running_script_is_skipped_not_queued() {
    let h = harness(&[("slow", "job", "sleeper", "wait(300)")], TIMEOUT);
    let key = ScriptKey::new("slow", "job", "sleeper");
    let event = Arc::new(Event::new("slow", "job"));

    let first = h.dispatcher.dispatch(Arc::clone(&event));
    assert_eq!(first.len(), 1);
    assert!(h.active.is_active(&key));

    assert!(h.dispatcher.dispatch(Arc::clone(&event)).is_empty());

    for handle in first {
        assert_eq!(handle.await.expect("unit task"), Outcome::Completed);
    }
    assert!(!h.active.is_active(&key));

    let again = h.dispatcher.dispatch(event);
    assert_eq!(again.len(), 1);
    for handle in again {
        assert_eq!(handle.await.expect("unit task"), Outcome::Completed);
    }
}

// ---------------------------------------------------------------------------
// Test: a faulting script does not affect its siblings
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn faulting_script_is_isolated() {
    let mut h = harness(
        &[
            ("x", "y", "bad", r#"error("boom")"#),
            ("x", "y", "good", r#"send.ws({ ok = true })"#),
        ],
        TIMEOUT,
    );

    let handles = h.dispatcher.dispatch(Arc::new(Event::new("x", "y")));
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.expect("unit task"));
    }

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.contains(&Outcome::Completed));
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, Outcome::Faulted(msg) if msg.contains("boom"))));
    assert_eq!(next_outbound(&mut h.receivers.outbound).await, json!({ "ok": true }));
    assert_eq!(h.active.active_count(), 0);
}

// ---------------------------------------------------------------------------
// Test: a script that overruns is stopped and can be triggered again
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timed_out_script_is_released() {
    let h = harness(
        &[("spin", "loop", "forever", "while true do end")],
        Duration::from_millis(200),
    );
    let key = ScriptKey::new("spin", "loop", "forever");
    let event = Arc::new(Event::new("spin", "loop"));

    for handle in h.dispatcher.dispatch(Arc::clone(&event)) {
        assert_matches!(handle.await.expect("unit task"), Outcome::TimedOut);
    }
    assert!(!h.active.is_active(&key));

    let again = h.dispatcher.dispatch(event);
    assert_eq!(again.len(), 1);
    for handle in again {
        assert_matches!(handle.await.expect("unit task"), Outcome::TimedOut);
    }
}

// ---------------------------------------------------------------------------
// Test: the triggering event is visible to the script as `e`
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn script_reads_event_fields() {
    let mut h = harness(
        &[(
            "sensor",
            "reading",
            "echo",
            r#"send.ws({ from = e.channel .. "/" .. e.topic, doubled = e.value * 2 })"#,
        )],
        TIMEOUT,
    );

    let raw = br#"{"channel":"sensor","topic":"reading","value":21}"#;
    assert_eq!(h.dispatcher.handle_message(raw), 1);

    assert_eq!(
        next_outbound(&mut h.receivers.outbound).await,
        json!({ "from": "sensor/reading", "doubled": 42 }),
    );
}

// ---------------------------------------------------------------------------
// Test: malformed messages are dropped without starting anything
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_messages_start_nothing() {
    let h = harness(&[("a", "b", "c", "")], TIMEOUT);

    assert_eq!(h.dispatcher.handle_message(b"not json"), 0);
    assert_eq!(h.dispatcher.handle_message(b"[1, 2, 3]"), 0);
    assert_eq!(h.dispatcher.handle_message(br#"{"channel":"a"}"#), 0);
    assert_eq!(h.dispatcher.handle_message(br#"{"channel":"a","topic":7}"#), 0);
}

// ---------------------------------------------------------------------------
// Test: the run loop survives bad input and keeps dispatching
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_loop_skips_malformed_input() {
    let h = harness(&[("a", "b", "echo", r#"send.ws({ n = e.n })"#)], TIMEOUT);
    let mut outbound = h.receivers.outbound;
    let inbound = h.receivers.inbound;
    let cancel = CancellationToken::new();

    let dispatcher = Arc::clone(&h.dispatcher);
    let loop_cancel = cancel.clone();
    let run = tokio::spawn(async move {
        dispatcher.run(inbound, loop_cancel).await;
    });

    h.bus.publish_inbound(b"garbage".to_vec()).await.expect("publish");
    h.bus
        .publish_inbound(br#"{"topic":"b"}"#.to_vec())
        .await
        .expect("publish");
    h.bus
        .publish_inbound(br#"{"channel":"a","topic":"b","n":1}"#.to_vec())
        .await
        .expect("publish");

    assert_eq!(next_outbound(&mut outbound).await, json!({ "n": 1 }));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run loop should stop on cancel")
        .expect("run loop task");
}

// ---------------------------------------------------------------------------
// Test: send.internal chains scripts, including back to a script that has
// since finished
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn internal_events_chain_through_the_run_loop() {
    let ping = r#"
        send.ws({ ping = e.n })
        if e.n < 3 then
            send.internal({ channel = "game", topic = "pong", n = e.n })
        end
    "#;
    let pong = r#"
        wait(100)
        send.internal({ channel = "game", topic = "ping", n = e.n + 1 })
    "#;
    let h = harness(
        &[("game", "ping", "ping", ping), ("game", "pong", "pong", pong)],
        TIMEOUT,
    );
    let mut outbound = h.receivers.outbound;
    let inbound = h.receivers.inbound;
    let cancel = CancellationToken::new();

    let dispatcher = Arc::clone(&h.dispatcher);
    let loop_cancel = cancel.clone();
    let run = tokio::spawn(async move {
        dispatcher.run(inbound, loop_cancel).await;
    });

    h.bus
        .publish_inbound(br#"{"channel":"game","topic":"ping","n":1}"#.to_vec())
        .await
        .expect("publish");

    for n in 1..=3 {
        assert_eq!(next_outbound(&mut outbound).await, json!({ "ping": n }));
    }

    cancel.cancel();
    run.await.expect("run loop task");
}

// ---------------------------------------------------------------------------
// Test: the run loop stops when every inbound producer is gone
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_loop_stops_when_inbound_closes() {
    let h = harness(&[], TIMEOUT);
    let (tx, rx) = mpsc::channel::<Vec<u8>>(1);
    let dispatcher = Arc::clone(&h.dispatcher);
    let run = tokio::spawn(async move {
        dispatcher.run(rx, CancellationToken::new()).await;
    });

    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run loop should stop once the queue closes")
        .expect("run loop task");
}
