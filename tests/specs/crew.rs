//! Crew planning, execution, and checkpoint specs.

use crate::prelude::*;
use pim_core::MessengerConfig;
use pim_crew::{FakeRun, FakeWorkerAdapter};
use serde_json::json;

const ANALYSIS: &str = "\
## Task: Add token endpoint
Stand up the /oauth/token route.

## Task: Wire login flow
Depends: Add token endpoint
Hook the UI to the new endpoint.";

fn planning_adapter() -> FakeWorkerAdapter {
    FakeWorkerAdapter::with_responder(|task| {
        if task.agent_name == "analyst" {
            FakeRun::ok(ANALYSIS)
        } else if task.agent_name.starts_with("reviewer-") {
            FakeRun::ok("VERDICT: SHIP")
        } else {
            FakeRun::ok("scout report: the auth module lives in src/auth")
        }
    })
}

// S5: plan creates an epic in planning, runs scouts, and parses the
// analyst's task blocks with resolved dependencies.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn plan_creates_tasks_from_the_analyst() {
    let mesh = TestMesh::new();
    let adapter = planning_adapter();
    let session = mesh.session_with("A", adapter.clone(), MessengerConfig::default());
    call(&session, json!({ "action": "join" })).await;

    let reply = call(
        &session,
        json!({ "action": "plan", "target": "Add OAuth", "idea": true }),
    )
    .await;
    assert_eq!(reply.error_kind(), None, "{}", reply.text);

    let epic = &reply.details["epic"];
    assert_eq!(epic["status"], "planning");
    assert_eq!(epic["task_count"], 2);

    let tasks = reply.details["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    // The declared dependency resolved to the first task's id.
    assert_eq!(tasks[1]["depends_on"][0], tasks[0]["id"]);

    let scouts = adapter
        .calls()
        .iter()
        .filter(|t| t.agent_name.starts_with("scout-"))
        .count();
    assert_eq!(scouts, MessengerConfig::default().crew.scouts);

    session.shutdown().await;
}

// S6: checkpoint, mutate, restore; counts and statuses revert.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn checkpoint_restore_reverts_an_epic() {
    let mesh = TestMesh::new();
    let session = mesh.session("A");
    call(&session, json!({ "action": "join" })).await;

    let epic = call(&session, json!({ "action": "epic.create", "title": "E" })).await;
    let epic_id = epic.details["epic"]["id"].as_str().unwrap().to_string();
    let mut task_ids = Vec::new();
    for title in ["one", "two", "three"] {
        let task = call(
            &session,
            json!({ "action": "task.create", "epic": epic_id, "title": title }),
        )
        .await;
        task_ids.push(task.details["task"]["id"].as_str().unwrap().to_string());
    }

    let saved = call(&session, json!({ "action": "checkpoint.save", "id": epic_id })).await;
    assert_eq!(saved.error_kind(), None);

    for id in &task_ids[..2] {
        call(&session, json!({ "action": "task.start", "id": id })).await;
        call(&session, json!({ "action": "task.done", "id": id })).await;
    }
    let shown = call(&session, json!({ "action": "epic.show", "id": epic_id })).await;
    assert_eq!(shown.details["epic"]["completed_count"], 2);

    let restored = call(
        &session,
        json!({ "action": "checkpoint.restore", "id": epic_id }),
    )
    .await;
    assert!(restored.text.contains("Current state replaced"));

    let shown = call(&session, json!({ "action": "epic.show", "id": epic_id })).await;
    assert_eq!(shown.details["epic"]["completed_count"], 0);
    for task in shown.details["tasks"].as_array().unwrap() {
        assert_eq!(task["status"], "todo");
    }

    session.shutdown().await;
}

// Plan then autonomous work: the fake workers complete both tasks in
// dependency order and the epic closes itself.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn plan_then_autonomous_work() {
    let mesh = TestMesh::new();
    let adapter = planning_adapter();
    let session = mesh.session_with("A", adapter, MessengerConfig::default());
    call(&session, json!({ "action": "join" })).await;

    let plan = call(&session, json!({ "action": "plan", "target": "Add OAuth" })).await;
    let epic_id = plan.details["epic"]["id"].as_str().unwrap().to_string();

    let report = call(
        &session,
        json!({ "action": "work", "target": epic_id, "autonomous": true }),
    )
    .await;
    assert_eq!(report.error_kind(), None, "{}", report.text);
    assert_eq!(report.details["completed"].as_array().unwrap().len(), 2);
    assert_eq!(report.details["blocked"].as_array().unwrap().len(), 0);

    let shown = call(&session, json!({ "action": "epic.show", "id": epic_id })).await;
    assert_eq!(shown.details["epic"]["status"], "completed");

    session.shutdown().await;
}

// Property 6: validation flags cycles and orphan references through the
// dispatcher surface.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn validate_reports_orphans() {
    let mesh = TestMesh::new();
    let session = mesh.session("A");
    call(&session, json!({ "action": "join" })).await;

    let epic = call(&session, json!({ "action": "epic.create", "title": "E" })).await;
    let epic_id = epic.details["epic"]["id"].as_str().unwrap().to_string();
    call(
        &session,
        json!({
            "action": "task.create",
            "epic": epic_id,
            "title": "t",
            "description": "body",
            "dependsOn": [format!("{epic_id}.99")],
        }),
    )
    .await;

    let reply = call(&session, json!({ "action": "crew.validate", "id": epic_id })).await;
    assert_eq!(reply.error_kind(), Some("orphan_dependency"));

    session.shutdown().await;
}

// task.ready reflects the dependency frontier.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ready_set_through_the_dispatcher() {
    let mesh = TestMesh::new();
    let session = mesh.session("A");
    call(&session, json!({ "action": "join" })).await;

    let epic = call(&session, json!({ "action": "epic.create", "title": "E" })).await;
    let epic_id = epic.details["epic"]["id"].as_str().unwrap().to_string();
    let base = call(
        &session,
        json!({ "action": "task.create", "epic": epic_id, "title": "base" }),
    )
    .await;
    let base_id = base.details["task"]["id"].as_str().unwrap().to_string();
    call(
        &session,
        json!({
            "action": "task.create",
            "epic": epic_id,
            "title": "dependent",
            "dependsOn": [base_id],
        }),
    )
    .await;

    let ready = call(&session, json!({ "action": "task.ready", "epic": epic_id })).await;
    assert_eq!(ready.details["ready"].as_array().unwrap().len(), 1);

    call(&session, json!({ "action": "task.start", "id": base_id })).await;
    call(&session, json!({ "action": "task.done", "id": base_id })).await;

    let ready = call(&session, json!({ "action": "task.ready", "epic": epic_id })).await;
    let titles: Vec<_> = ready.details["ready"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["dependent"]);

    session.shutdown().await;
}
