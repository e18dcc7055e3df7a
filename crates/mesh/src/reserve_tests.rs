// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::names::NamePool;
use crate::registry::RegisterRequest;
use pim_core::{FakeClock, SessionId};
use pim_store::Layout;
use std::path::PathBuf;

fn mesh() -> (tempfile::TempDir, Registry<FakeClock>, FakeClock) {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::with_roots(dir.path().join("base"), dir.path().join("project"));
    let clock = FakeClock::new();
    let registry = Registry::new(layout, clock.clone(), PathBuf::from("/w"), false);
    (dir, registry, clock)
}

fn join(registry: &Registry<FakeClock>, name: &str) {
    registry
        .register(
            &RegisterRequest {
                forced_name: Some(name.into()),
                session_id: SessionId::new(format!("s-{name}")),
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
}

#[test]
fn reserve_then_conflict_for_other_agent() {
    let (_dir, registry, clock) = mesh();
    join(&registry, "alice");
    join(&registry, "bob");

    reserve(
        &registry,
        "alice",
        &["src/auth/".to_string()],
        Some("oauth rework"),
        clock.timestamp(),
    )
    .unwrap();
    registry.invalidate_cache();

    let conflicts = conflicts_with_other_agents(&registry, "bob", "src/auth/login.ts");
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].agent, "alice");
    assert_eq!(conflicts[0].pattern, "src/auth/");
    assert_eq!(conflicts[0].reason.as_deref(), Some("oauth rework"));
}

#[test]
fn own_reservation_never_conflicts() {
    let (_dir, registry, clock) = mesh();
    join(&registry, "alice");

    reserve(
        &registry,
        "alice",
        &["src/auth/".to_string()],
        None,
        clock.timestamp(),
    )
    .unwrap();
    registry.invalidate_cache();

    assert!(conflicts_with_other_agents(&registry, "alice", "src/auth/login.ts").is_empty());
}

#[test]
fn non_matching_path_is_clear() {
    let (_dir, registry, clock) = mesh();
    join(&registry, "alice");
    join(&registry, "bob");
    reserve(
        &registry,
        "alice",
        &["src/auth/".to_string()],
        None,
        clock.timestamp(),
    )
    .unwrap();
    registry.invalidate_cache();

    assert!(conflicts_with_other_agents(&registry, "bob", "src/billing/mod.rs").is_empty());
}

#[test]
fn reserve_then_release_round_trips() {
    let (_dir, registry, clock) = mesh();
    join(&registry, "alice");

    let before = registry.get("alice").unwrap().reservations.clone();
    reserve(
        &registry,
        "alice",
        &["src/a.rs".to_string(), "src/b.rs".to_string()],
        None,
        clock.timestamp(),
    )
    .unwrap();
    let removed = release(
        &registry,
        "alice",
        Some(&["src/a.rs".to_string(), "src/b.rs".to_string()]),
    )
    .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(registry.get("alice").unwrap().reservations, before);
}

#[test]
fn release_all_clears_everything() {
    let (_dir, registry, clock) = mesh();
    join(&registry, "alice");
    reserve(
        &registry,
        "alice",
        &["a/".to_string(), "b/".to_string(), "c".to_string()],
        None,
        clock.timestamp(),
    )
    .unwrap();

    let removed = release(&registry, "alice", None).unwrap();
    assert_eq!(removed, 3);
    assert!(registry.get("alice").unwrap().reservations.is_empty());
}

#[test]
fn re_reserving_refreshes_instead_of_duplicating() {
    let (_dir, registry, clock) = mesh();
    join(&registry, "alice");

    reserve(
        &registry,
        "alice",
        &["src/".to_string()],
        Some("first"),
        clock.timestamp(),
    )
    .unwrap();
    reserve(
        &registry,
        "alice",
        &["src/".to_string()],
        Some("second"),
        clock.timestamp(),
    )
    .unwrap();

    let reservations = registry.get("alice").unwrap().reservations;
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].reason.as_deref(), Some("second"));
}
