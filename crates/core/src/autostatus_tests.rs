// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const T0: u64 = 10_000_000;

#[test]
fn just_arrived_wins_within_30s() {
    let mut window = ActivityWindow::default();
    window.record_commit(T0);
    // Even with a fresh commit, arrival takes priority.
    assert_eq!(auto_status(T0, T0 - 10_000, &window, None), "just arrived");
}

#[test]
fn commit_in_window_means_just_shipped() {
    let mut window = ActivityWindow::default();
    window.record_commit(T0 - 40_000);
    assert_eq!(
        auto_status(T0, T0 - 600_000, &window, None),
        "just shipped"
    );
}

#[test]
fn commit_outside_window_is_forgotten() {
    let mut window = ActivityWindow::default();
    window.record_commit(T0 - 70_000);
    assert_eq!(auto_status(T0, T0 - 600_000, &window, None), "");
}

#[test]
fn three_test_runs_means_debugging() {
    let mut window = ActivityWindow::default();
    window.record_test(T0 - 50_000);
    window.record_test(T0 - 20_000);
    assert_ne!(auto_status(T0, 0, &window, None), "debugging...");
    window.record_test(T0 - 1_000);
    assert_eq!(auto_status(T0, 0, &window, None), "debugging...");
}

#[test]
fn eight_edits_means_on_fire() {
    let mut window = ActivityWindow::default();
    for i in 0..8 {
        window.record_edit(T0 - i * 1_000);
    }
    assert_eq!(auto_status(T0, 0, &window, None), "on fire");
}

#[test]
fn reads_without_edits_means_exploring() {
    let mut window = ActivityWindow::default();
    window.record_read(T0 - 5_000);
    assert_eq!(
        auto_status(T0, 0, &window, None),
        "exploring the codebase"
    );
    window.record_edit(T0 - 2_000);
    assert_eq!(auto_status(T0, 0, &window, None), "");
}

#[test]
fn falls_back_to_last_activity() {
    let window = ActivityWindow::default();
    assert_eq!(
        auto_status(T0, 0, &window, Some("editing src/lib.rs")),
        "editing src/lib.rs"
    );
    assert_eq!(auto_status(T0, 0, &window, None), "");
}
