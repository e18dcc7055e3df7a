// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn epic() -> EpicId {
    EpicId::compose(3, "xyz")
}

#[test]
fn compose_and_parse_round_trip() {
    let id = TaskId::compose(&epic(), 4);
    assert_eq!(id.as_str(), "c-3-xyz.4");
    assert_eq!(id.parse(), Ok((epic(), 4)));
}

#[yare::parameterized(
    no_dot       = { "c-3-xyz" },
    zero_number  = { "c-3-xyz.0" },
    empty_epic   = { ".4" },
    not_a_number = { "c-3-xyz.four" },
)]
fn malformed_ids_rejected(raw: &str) {
    assert!(TaskId::new(raw).parse().is_err());
}

#[test]
fn next_number_scans_existing() {
    let ids = [
        TaskId::compose(&epic(), 1),
        TaskId::compose(&epic(), 9),
        TaskId::compose(&epic(), 2),
    ];
    assert_eq!(TaskId::next_number(ids.iter()), 10);
    assert_eq!(TaskId::next_number([].iter()), 1);
}

#[test]
fn new_task_is_todo_without_execution_state() {
    let task = Task::new(
        TaskId::compose(&epic(), 1),
        epic(),
        "wire login",
        vec![],
        chrono::Utc::now(),
    );
    assert_eq!(task.status, TaskStatus::Todo);
    assert!(task.started_at.is_none());
    assert_eq!(task.attempt_count, 0);
}

#[test]
fn clear_execution_state_resets_everything_but_attempts() {
    let mut task = Task::new(
        TaskId::compose(&epic(), 1),
        epic(),
        "wire login",
        vec![TaskId::compose(&epic(), 2)],
        chrono::Utc::now(),
    );
    task.status = TaskStatus::Done;
    task.started_at = Some(chrono::Utc::now());
    task.completed_at = Some(chrono::Utc::now());
    task.base_commit = Some("abc123".into());
    task.assigned_to = Some("otter".into());
    task.summary = Some("did it".into());
    task.evidence = Some(Evidence {
        commits: vec!["abc123".into()],
        ..Default::default()
    });
    task.blocked_reason = Some("stale".into());
    task.attempt_count = 3;

    task.clear_execution_state();

    assert_eq!(task.status, TaskStatus::Todo);
    assert!(task.started_at.is_none());
    assert!(task.completed_at.is_none());
    assert!(task.base_commit.is_none());
    assert!(task.assigned_to.is_none());
    assert!(task.summary.is_none());
    assert!(task.evidence.is_none());
    assert!(task.blocked_reason.is_none());
    // Dependencies and attempts survive a reset.
    assert_eq!(task.depends_on.len(), 1);
    assert_eq!(task.attempt_count, 3);
}

#[test]
fn task_serializes_snake_case_status() {
    let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
    assert_eq!(json, "\"in_progress\"");
}

#[test]
fn task_decodes_without_optionals() {
    let json = r#"{
        "id": "c-1-aaa.1",
        "epic_id": "c-1-aaa",
        "title": "t",
        "status": "todo",
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    }"#;
    let task: Task = serde_json::from_str(json).unwrap();
    assert!(task.depends_on.is_empty());
    assert_eq!(task.attempt_count, 0);
}
