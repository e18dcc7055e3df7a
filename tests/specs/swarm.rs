//! Claim/completion specs.

use crate::prelude::*;
use serde_json::json;

// S2: two agents race for the same task; exactly one wins and the loser
// learns who holds it.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn claim_race_has_one_winner() {
    let mesh = TestMesh::new();
    let alice = mesh.session("A");
    let bob = mesh.session("B");
    call(&alice, json!({ "action": "join" })).await;
    call(&bob, json!({ "action": "join" })).await;

    let record = json!({ "action": "claim", "taskId": "T1", "spec": "/s.md" });
    let (from_alice, from_bob) =
        tokio::join!(alice.dispatch(&record), bob.dispatch(&record));

    let (winner, loser) = if from_alice.error_kind().is_none() {
        (("A", from_alice), from_bob)
    } else {
        (("B", from_bob), from_alice)
    };
    assert_eq!(winner.1.details["mode"], "claim");
    assert!(winner.1.details["claimedAt"].is_string());
    assert_eq!(loser.error_kind(), Some("already_claimed"));
    assert_eq!(loser.details["conflict"]["agent"], winner.0);

    // The table holds exactly one entry.
    let swarm = call(&alice, json!({ "action": "swarm" })).await;
    assert_eq!(swarm.details["claims"].as_array().unwrap().len(), 1);

    alice.shutdown().await;
    bob.shutdown().await;
}

// S3: one in-flight claim per agent, anywhere in the table.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_claim_in_flight() {
    let mesh = TestMesh::new();
    let alice = mesh.session("A");
    call(&alice, json!({ "action": "join" })).await;

    call(
        &alice,
        json!({ "action": "claim", "taskId": "T1", "spec": "/s.md" }),
    )
    .await;
    let reply = call(
        &alice,
        json!({ "action": "claim", "taskId": "T2", "spec": "/other.md" }),
    )
    .await;

    assert_eq!(reply.error_kind(), Some("already_have_claim"));
    assert_eq!(reply.details["existing"]["taskId"], "T1");

    alice.shutdown().await;
}

// Round-trip: claim then unclaim returns the table to its prior state.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn claim_unclaim_round_trip() {
    let mesh = TestMesh::new();
    let alice = mesh.session("A");
    call(&alice, json!({ "action": "join" })).await;

    let before = call(&alice, json!({ "action": "swarm" })).await;
    call(
        &alice,
        json!({ "action": "claim", "taskId": "T1", "spec": "/s.md" }),
    )
    .await;
    call(
        &alice,
        json!({ "action": "unclaim", "taskId": "T1", "spec": "/s.md" }),
    )
    .await;
    let after = call(&alice, json!({ "action": "swarm" })).await;

    assert_eq!(before.details["claims"], after.details["claims"]);

    alice.shutdown().await;
}

// Invariant 4: complete moves the entry; claim and completion never
// coexist, and completions are permanent (first completer wins).
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn complete_is_permanent_and_exclusive() {
    let mesh = TestMesh::new();
    let alice = mesh.session("A");
    let bob = mesh.session("B");
    call(&alice, json!({ "action": "join" })).await;
    call(&bob, json!({ "action": "join" })).await;

    call(
        &alice,
        json!({ "action": "claim", "taskId": "T1", "spec": "/s.md" }),
    )
    .await;
    let done = call(
        &alice,
        json!({ "action": "complete", "taskId": "T1", "spec": "/s.md", "notes": "shipped" }),
    )
    .await;
    assert_eq!(done.error_kind(), None);

    let swarm = call(&alice, json!({ "action": "swarm" })).await;
    assert_eq!(swarm.details["claims"].as_array().unwrap().len(), 0);
    assert_eq!(swarm.details["completions"].as_array().unwrap().len(), 1);

    // B cannot complete it again, even with a fresh claim elsewhere.
    call(
        &bob,
        json!({ "action": "claim", "taskId": "T2", "spec": "/s.md" }),
    )
    .await;
    let again = call(
        &bob,
        json!({ "action": "complete", "taskId": "T1", "spec": "/s.md" }),
    )
    .await;
    assert_eq!(again.error_kind(), Some("already_completed"));
    assert_eq!(again.details["completedBy"], "A");

    alice.shutdown().await;
    bob.shutdown().await;
}

// Completing without any claim is rejected; another agent's claim is
// protected.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn complete_guards() {
    let mesh = TestMesh::new();
    let alice = mesh.session("A");
    let bob = mesh.session("B");
    call(&alice, json!({ "action": "join" })).await;
    call(&bob, json!({ "action": "join" })).await;

    let reply = call(
        &alice,
        json!({ "action": "complete", "taskId": "T9", "spec": "/s.md" }),
    )
    .await;
    assert_eq!(reply.error_kind(), Some("not_claimed"));

    call(
        &alice,
        json!({ "action": "claim", "taskId": "T9", "spec": "/s.md" }),
    )
    .await;
    let reply = call(
        &bob,
        json!({ "action": "complete", "taskId": "T9", "spec": "/s.md" }),
    )
    .await;
    assert_eq!(reply.error_kind(), Some("not_your_claim"));
    let reply = call(
        &bob,
        json!({ "action": "unclaim", "taskId": "T9", "spec": "/s.md" }),
    )
    .await;
    assert_eq!(reply.error_kind(), Some("not_your_claim"));

    alice.shutdown().await;
    bob.shutdown().await;
}
