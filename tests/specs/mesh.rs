//! Presence, messaging, and reservation specs.

use crate::prelude::*;
use serde_json::json;
use std::time::Duration;

/// Discovery results are cached for one second; cross-session visibility
/// needs the TTL to lapse.
async fn let_discovery_cache_lapse() {
    tokio::time::sleep(Duration::from_millis(1100)).await;
}

// S1: A joins, B joins under a forced name, A sends, B's delivery callback
// fires exactly once and the inbox file is gone afterwards.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_and_deliver() {
    let mesh = TestMesh::new();
    let alice = mesh.session("A");
    let bob = mesh.session("B");
    let mut bob_arrivals = bob.take_arrivals().unwrap();

    call(&alice, json!({ "action": "join" })).await;
    call(&bob, json!({ "action": "join" })).await;

    let reply = call(&alice, json!({ "action": "send", "to": "B", "message": "hello" })).await;
    assert_eq!(reply.text, "Message sent to B.");
    assert_eq!(reply.error_kind(), None);

    let arrival = next_arrival(&mut bob_arrivals).await;
    assert_eq!(arrival.message.text, "hello");
    assert_eq!(arrival.message.from, "A");
    assert!(arrival.wake);

    // Drained: the inbox directory is empty again.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let pending = std::fs::read_dir(mesh.layout.inbox_dir("B"))
        .map(|d| d.count())
        .unwrap_or(0);
    assert_eq!(pending, 0);

    alice.shutdown().await;
    bob.shutdown().await;
}

// Property 10: one sender's messages arrive in write order.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_sender_ordering() {
    let mesh = TestMesh::new();
    let alice = mesh.session("A");
    let bob = mesh.session("B");
    let mut bob_arrivals = bob.take_arrivals().unwrap();

    call(&alice, json!({ "action": "join" })).await;
    call(&bob, json!({ "action": "join" })).await;

    for i in 0..5 {
        let reply = call(
            &alice,
            json!({ "action": "send", "to": "B", "message": format!("m{i}") }),
        )
        .await;
        assert_eq!(reply.error_kind(), None);
        // Keep timestamp prefixes strictly increasing.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    for i in 0..5 {
        let arrival = next_arrival(&mut bob_arrivals).await;
        assert_eq!(arrival.message.text, format!("m{i}"));
    }

    alice.shutdown().await;
    bob.shutdown().await;
}

// S7: four rapid messages; the first three wake, the fourth is delivered
// with the wake-up suppressed and the loop note attached.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn echo_loop_suppression() {
    let mesh = TestMesh::new();
    let alice = mesh.session("A");
    let bob = mesh.session("B");
    let mut bob_arrivals = bob.take_arrivals().unwrap();

    call(&alice, json!({ "action": "join" })).await;
    call(&bob, json!({ "action": "join" })).await;

    for i in 0..4 {
        call(
            &alice,
            json!({ "action": "send", "to": "B", "message": format!("ping{i}") }),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    for i in 0..3 {
        let arrival = next_arrival(&mut bob_arrivals).await;
        assert!(arrival.wake, "message {i} should carry wake-up");
        assert!(arrival.note.is_none());
    }
    let fourth = next_arrival(&mut bob_arrivals).await;
    assert!(!fourth.wake);
    let note = fourth.note.unwrap();
    assert!(note.contains("loop suppressed"));
    assert!(note.contains("A"));

    alice.shutdown().await;
    bob.shutdown().await;
}

// S4: a reservation by A hard-blocks a write by B under the reserved tree.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reservation_blocks_other_agents() {
    let mesh = TestMesh::new();
    let alice = mesh.session("A");
    let bob = mesh.session("B");

    call(&alice, json!({ "action": "join" })).await;
    call(&bob, json!({ "action": "join" })).await;

    let reply = call(
        &alice,
        json!({ "action": "reserve", "paths": "src/auth/", "reason": "oauth rework" }),
    )
    .await;
    assert_eq!(reply.error_kind(), None);
    let_discovery_cache_lapse().await;

    let conflicts = bob.conflicts_for("src/auth/login.ts");
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].agent, "A");
    assert_eq!(conflicts[0].pattern, "src/auth/");
    assert_eq!(conflicts[0].reason.as_deref(), Some("oauth rework"));

    // The reserver itself is never blocked.
    assert!(alice.conflicts_for("src/auth/login.ts").is_empty());

    // Release restores the reservation list.
    call(&alice, json!({ "action": "release" })).await;
    let_discovery_cache_lapse().await;
    assert!(bob.conflicts_for("src/auth/login.ts").is_empty());

    alice.shutdown().await;
    bob.shutdown().await;
}

// Broadcast reaches every active peer; self is excluded.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn broadcast_reaches_all_peers() {
    let mesh = TestMesh::new();
    let alice = mesh.session("A");
    let bob = mesh.session("B");
    let carol = mesh.session("C");
    let mut bob_arrivals = bob.take_arrivals().unwrap();
    let mut carol_arrivals = carol.take_arrivals().unwrap();

    for session in [&alice, &bob, &carol] {
        call(session, json!({ "action": "join" })).await;
    }
    let_discovery_cache_lapse().await;

    let reply = call(&alice, json!({ "action": "broadcast", "message": "standup" })).await;
    assert!(reply.text.contains("2 agent(s)"));

    assert_eq!(next_arrival(&mut bob_arrivals).await.message.text, "standup");
    assert_eq!(next_arrival(&mut carol_arrivals).await.message.text, "standup");

    for session in [alice, bob, carol] {
        session.shutdown().await;
    }
}

// Invariant 1: a dead peer's record disappears on the next discovery.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dead_records_are_pruned_by_discovery() {
    let mesh = TestMesh::new();
    let alice = mesh.session("A");
    call(&alice, json!({ "action": "join" })).await;

    let mut child = std::process::Command::new("true").spawn().unwrap();
    let dead_pid = child.id();
    child.wait().unwrap();
    let ghost = pim_core::PresenceRecord::new(
        "ghost",
        dead_pid,
        pim_core::SessionId::new("s-ghost"),
        mesh.cwd(),
        "opus",
        chrono_now(),
    );
    pim_store::write_json(&mesh.layout.presence_path("ghost"), &ghost).unwrap();

    // Let the 1 s discovery cache lapse before the next scan.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let reply = call(&alice, json!({ "action": "list" })).await;
    assert!(!reply.text.contains("ghost"));
    assert!(!mesh.layout.presence_path("ghost").exists());

    alice.shutdown().await;
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
