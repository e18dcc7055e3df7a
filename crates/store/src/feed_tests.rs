// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pim_core::FeedKind;

fn event(agent: &str) -> FeedEvent {
    FeedEvent::new(chrono::Utc::now(), agent, FeedKind::Edit)
}

#[test]
fn append_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let log = FeedLog::new(dir.path().join("feed.jsonl"), 100);

    log.append(&event("alice")).unwrap();
    log.append(&event("bob")).unwrap();

    let events = log.recent(10);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].agent, "alice");
    assert_eq!(events[1].agent, "bob");
}

#[test]
fn recent_returns_newest_events() {
    let dir = tempfile::tempdir().unwrap();
    let log = FeedLog::new(dir.path().join("feed.jsonl"), 100);
    for i in 0..10 {
        log.append(&event(&format!("agent{i}"))).unwrap();
    }

    let events = log.recent(3);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].agent, "agent7");
    assert_eq!(events[2].agent, "agent9");
}

#[test]
fn retention_bounds_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = FeedLog::new(dir.path().join("feed.jsonl"), 20);
    for i in 0..200 {
        log.append(&event(&format!("agent{i}"))).unwrap();
    }

    let text = std::fs::read_to_string(dir.path().join("feed.jsonl")).unwrap();
    let count = text.lines().count();
    assert!(count <= 20 + 64 + 1, "feed grew unbounded: {count} lines");

    // The newest events survive trimming.
    let events = log.recent(1);
    assert_eq!(events[0].agent, "agent199");
}

#[test]
fn malformed_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feed.jsonl");
    let log = FeedLog::new(path.clone(), 100);
    log.append(&event("alice")).unwrap();
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{torn line").unwrap();
    }
    log.append(&event("bob")).unwrap();

    let events = log.recent(10);
    assert_eq!(events.len(), 2);
}

#[test]
fn recent_on_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let log = FeedLog::new(dir.path().join("feed.jsonl"), 100);
    assert!(log.recent(5).is_empty());
}
