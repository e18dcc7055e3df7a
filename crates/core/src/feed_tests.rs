// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    join       = { FeedKind::Join, "\"join\"" },
    task_start = { FeedKind::TaskStart, "\"task.start\"" },
    plan_done  = { FeedKind::PlanDone, "\"plan.done\"" },
)]
fn kind_serializes_to_tag(kind: FeedKind, expected: &str) {
    assert_eq!(serde_json::to_string(&kind).unwrap(), expected);
}

#[test]
fn unknown_kind_deserializes_to_other() {
    let kind: FeedKind = serde_json::from_str("\"review.done\"").unwrap();
    assert_eq!(kind, FeedKind::Other("review.done".to_string()));
    assert_eq!(kind.to_string(), "review.done");
}

#[test]
fn event_uses_type_key_and_skips_empty_optionals() {
    let event = FeedEvent::new(chrono::Utc::now(), "otter", FeedKind::Message).target("badger");
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"type\":\"message\""));
    assert!(json.contains("\"target\":\"badger\""));
    assert!(!json.contains("preview"));
}

#[test]
fn event_round_trips() {
    let event = FeedEvent::new(chrono::Utc::now(), "otter", FeedKind::TaskDone)
        .target("c-1-abc.2")
        .preview("shipped the codec");
    let json = serde_json::to_string(&event).unwrap();
    let parsed: FeedEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}
