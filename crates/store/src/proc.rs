// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PID liveness probe

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Whether a process with this PID exists, via a signal-0 probe.
///
/// `EPERM` means the process exists but belongs to another user, which
/// still counts as alive.
pub fn pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// The calling process's PID.
pub fn current_pid() -> u32 {
    std::process::id()
}

#[cfg(test)]
#[path = "proc_tests.rs"]
mod tests;
