// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn own_pid_is_alive() {
    assert!(pid_alive(current_pid()));
}

#[test]
fn pid_zero_is_dead() {
    assert!(!pid_alive(0));
}

#[test]
fn exited_child_is_dead() {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    assert!(!pid_alive(pid));
}
