// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn omitted_action_is_status() {
    assert_eq!(Action::parse(&json!({})).unwrap(), Action::Status);
}

#[test]
fn unknown_action_is_tagged() {
    let err = Action::parse(&json!({ "action": "teleport" })).unwrap_err();
    assert_eq!(err.kind, "unknown_action");
}

#[test]
fn send_requires_recipient_and_message() {
    let err = Action::parse(&json!({ "action": "send", "message": "hi" })).unwrap_err();
    assert_eq!(err.kind, "missing_recipient");

    let err = Action::parse(&json!({ "action": "send", "to": "bob" })).unwrap_err();
    assert_eq!(err.kind, "missing_message");

    let action =
        Action::parse(&json!({ "action": "send", "to": "bob", "message": "hi", "replyTo": "m-1" }))
            .unwrap();
    assert_eq!(
        action,
        Action::Send {
            to: "bob".into(),
            message: "hi".into(),
            reply_to: Some("m-1".into()),
        }
    );
}

#[test]
fn reserve_accepts_string_or_array_paths() {
    let action = Action::parse(&json!({ "action": "reserve", "paths": "src/" })).unwrap();
    assert_eq!(
        action,
        Action::Reserve {
            paths: vec!["src/".into()],
            reason: None,
        }
    );

    let action =
        Action::parse(&json!({ "action": "reserve", "paths": ["a/", "b.rs"], "reason": "wip" }))
            .unwrap();
    assert!(matches!(action, Action::Reserve { ref paths, .. } if paths.len() == 2));

    let err = Action::parse(&json!({ "action": "reserve" })).unwrap_err();
    assert_eq!(err.kind, "missing_paths");
}

#[test]
fn release_without_paths_means_release_all() {
    let action = Action::parse(&json!({ "action": "release" })).unwrap();
    assert_eq!(action, Action::Release { paths: None });
}

#[test]
fn claim_requires_task_id() {
    let err = Action::parse(&json!({ "action": "claim" })).unwrap_err();
    assert_eq!(err.kind, "missing_id");

    let action =
        Action::parse(&json!({ "action": "claim", "taskId": "T1", "spec": "/s.md" })).unwrap();
    assert_eq!(
        action,
        Action::Claim {
            task_id: "T1".into(),
            spec: Some("/s.md".into()),
            reason: None,
        }
    );
}

#[test]
fn auto_register_path_validates_its_operation() {
    let action =
        Action::parse(&json!({ "action": "autoRegisterPath", "autoRegisterPath": "add" })).unwrap();
    assert_eq!(
        action,
        Action::AutoRegisterPath {
            op: AutoRegisterOp::Add,
        }
    );

    let err = Action::parse(&json!({ "action": "autoRegisterPath", "autoRegisterPath": "toggle" }))
        .unwrap_err();
    assert_eq!(err.kind, "unknown_operation");
}

#[yare::parameterized(
    epic_create = { json!({ "action": "epic.create" }), "missing_title" },
    epic_show   = { json!({ "action": "epic.show" }), "missing_id" },
    set_spec    = { json!({ "action": "epic.set_spec", "id": "c-1-abc" }), "missing_content" },
    task_block  = { json!({ "action": "task.block", "id": "c-1-abc.1" }), "missing_content" },
    plan        = { json!({ "action": "plan" }), "missing_title" },
    work        = { json!({ "action": "work" }), "missing_id" },
)]
fn crew_actions_demand_their_fields(record: serde_json::Value, kind: &str) {
    assert_eq!(Action::parse(&record).unwrap_err().kind, kind);
}

#[test]
fn task_create_parses_dependencies() {
    let action = Action::parse(&json!({
        "action": "task.create",
        "epic": "c-1-abc",
        "title": "wire login",
        "dependsOn": ["c-1-abc.1", "c-1-abc.2"],
    }))
    .unwrap();
    assert!(matches!(action, Action::TaskCreate { ref depends_on, .. } if depends_on.len() == 2));
}

#[test]
fn work_parses_flags() {
    let action = Action::parse(&json!({
        "action": "work",
        "target": "c-1-abc",
        "autonomous": true,
        "concurrency": 4,
    }))
    .unwrap();
    assert_eq!(
        action,
        Action::Work {
            target: "c-1-abc".into(),
            autonomous: true,
            concurrency: Some(4),
        }
    );
}

#[test]
fn mode_strings_round_trip_the_action_names() {
    let action = Action::parse(&json!({ "action": "checkpoint.list" })).unwrap();
    assert_eq!(action.mode(), "checkpoint.list");
    let action = Action::parse(&json!({ "action": "task.ready", "epic": "c-1-abc" })).unwrap();
    assert_eq!(action.mode(), "task.ready");
}
