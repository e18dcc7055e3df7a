// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::names::NamePool;
use crate::registry::RegisterRequest;
use pim_core::{FakeClock, SessionId};
use pim_store::Layout;
use std::path::PathBuf;

fn registered() -> (tempfile::TempDir, Registry<FakeClock>, FakeClock) {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::with_roots(dir.path().join("base"), dir.path().join("project"));
    let clock = FakeClock::new();
    let registry = Registry::new(layout, clock.clone(), PathBuf::from("/w"), false);
    registry
        .register(
            &RegisterRequest {
                forced_name: Some("otter".into()),
                session_id: SessionId::new("s-1"),
                pid: std::process::id(),
                cwd: PathBuf::from("/w"),
                model: "opus".into(),
                git_branch: None,
                spec: None,
                is_human: false,
            },
            &NamePool::with_seed(None, 1),
        )
        .unwrap();
    (dir, registry, clock)
}

#[test]
fn first_flush_is_due_immediately_then_debounced() {
    let (_dir, registry, clock) = registered();
    let tracker = ActivityTracker::new(clock.clone(), true);

    // dirty=true with last_flush=0 means the first flush fires right away.
    assert!(tracker.flush_due());
    tracker.flush(&registry, "otter");
    assert!(!tracker.flush_due());

    tracker.record(SessionEvent::Read);
    assert!(!tracker.flush_due());
    clock.advance(Duration::from_secs(11));
    assert!(tracker.flush_due());
}

#[test]
fn heartbeat_fires_without_any_events() {
    let (_dir, registry, clock) = registered();
    let tracker = ActivityTracker::new(clock.clone(), true);
    tracker.flush(&registry, "otter");

    clock.advance(Duration::from_secs(12));
    assert!(!tracker.flush_due());
    clock.advance(Duration::from_secs(4));
    assert!(tracker.flush_due());
}

#[test]
fn flush_writes_counters_and_activity() {
    let (_dir, registry, clock) = registered();
    let tracker = ActivityTracker::new(clock.clone(), true);

    tracker.record(SessionEvent::ToolCall {
        name: "Edit".into(),
        tokens: 120,
    });
    tracker.record(SessionEvent::Edit {
        path: Some("src/lib.rs".into()),
    });
    tracker.record(SessionEvent::Activity {
        text: "refactoring the parser".into(),
    });
    tracker.flush(&registry, "otter");

    let record = registry.get("otter").unwrap();
    let session = record.session.unwrap();
    assert_eq!(session.tool_calls, 1);
    assert_eq!(session.tokens, 120);
    assert_eq!(session.files_modified, vec!["src/lib.rs"]);
    let activity = record.activity.unwrap();
    assert_eq!(
        activity.current_activity.as_deref(),
        Some("refactoring the parser")
    );
    assert_eq!(activity.last_tool_call.as_deref(), Some("Edit"));
}

#[test]
fn auto_status_lands_in_status_message() {
    let (_dir, registry, clock) = registered();
    let tracker = ActivityTracker::new(clock.clone(), true);

    // Inside the first 30 s of the session.
    tracker.flush(&registry, "otter");
    let record = registry.get("otter").unwrap();
    assert_eq!(record.status_message.as_deref(), Some("just arrived"));
}

#[test]
fn auto_status_disabled_leaves_status_message_alone() {
    let (_dir, registry, clock) = registered();
    let tracker = ActivityTracker::new(clock.clone(), false);
    tracker.flush(&registry, "otter");
    assert!(registry.get("otter").unwrap().status_message.is_none());
}

#[test]
fn idle_ms_tracks_last_event() {
    let (_dir, _registry, clock) = registered();
    let tracker = ActivityTracker::new(clock.clone(), true);
    clock.advance(Duration::from_secs(40));
    assert!(tracker.idle_ms() >= 40_000);
    tracker.record(SessionEvent::Read);
    assert!(tracker.idle_ms() < 1_000);
}
