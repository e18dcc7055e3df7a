// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-status derivation from recent activity

use std::collections::VecDeque;

/// Length of the sliding window used for auto-status, in milliseconds.
pub const WINDOW_MS: u64 = 60_000;

/// Rolling counts of recent session events, pruned to the last 60 seconds.
#[derive(Debug, Default, Clone)]
pub struct ActivityWindow {
    commits: VecDeque<u64>,
    tests: VecDeque<u64>,
    edits: VecDeque<u64>,
    reads: VecDeque<u64>,
}

impl ActivityWindow {
    pub fn record_commit(&mut self, now_ms: u64) {
        self.commits.push_back(now_ms);
        self.prune(now_ms);
    }

    pub fn record_test(&mut self, now_ms: u64) {
        self.tests.push_back(now_ms);
        self.prune(now_ms);
    }

    pub fn record_edit(&mut self, now_ms: u64) {
        self.edits.push_back(now_ms);
        self.prune(now_ms);
    }

    pub fn record_read(&mut self, now_ms: u64) {
        self.reads.push_back(now_ms);
        self.prune(now_ms);
    }

    fn prune(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(WINDOW_MS);
        for queue in [
            &mut self.commits,
            &mut self.tests,
            &mut self.edits,
            &mut self.reads,
        ] {
            while queue.front().is_some_and(|&t| t < cutoff) {
                queue.pop_front();
            }
        }
    }

    fn count(queue: &VecDeque<u64>, cutoff: u64) -> usize {
        queue.iter().filter(|&&t| t >= cutoff).count()
    }

    pub fn commits_in_window(&self, now_ms: u64) -> usize {
        Self::count(&self.commits, now_ms.saturating_sub(WINDOW_MS))
    }

    pub fn tests_in_window(&self, now_ms: u64) -> usize {
        Self::count(&self.tests, now_ms.saturating_sub(WINDOW_MS))
    }

    pub fn edits_in_window(&self, now_ms: u64) -> usize {
        Self::count(&self.edits, now_ms.saturating_sub(WINDOW_MS))
    }

    pub fn reads_in_window(&self, now_ms: u64) -> usize {
        Self::count(&self.reads, now_ms.saturating_sub(WINDOW_MS))
    }
}

/// Derive a short status string from recent events.
///
/// Rules are checked in order; the first match wins. Falls back to the last
/// activity string, then to empty.
pub fn auto_status(
    now_ms: u64,
    started_at_ms: u64,
    window: &ActivityWindow,
    last_activity: Option<&str>,
) -> String {
    if now_ms.saturating_sub(started_at_ms) < 30_000 {
        return "just arrived".to_string();
    }
    if window.commits_in_window(now_ms) >= 1 {
        return "just shipped".to_string();
    }
    if window.tests_in_window(now_ms) >= 3 {
        return "debugging...".to_string();
    }
    if window.edits_in_window(now_ms) >= 8 {
        return "on fire".to_string();
    }
    if window.reads_in_window(now_ms) >= 1 && window.edits_in_window(now_ms) == 0 {
        return "exploring the codebase".to_string();
    }
    last_activity.unwrap_or_default().to_string()
}

#[cfg(test)]
#[path = "autostatus_tests.rs"]
mod tests;
