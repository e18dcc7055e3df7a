// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity tracking and debounced presence flushing
//!
//! Counter and activity-string updates coalesce in memory and rewrite the
//! presence record at most once per [`FLUSH_DEBOUNCE`], with a mandatory
//! heartbeat every [`HEARTBEAT`] so peers can tell a quiet agent from a
//! dead one.

use crate::registry::Registry;
use parking_lot::Mutex;
use pim_core::{auto_status, ActivityInfo, ActivityWindow, Clock, SessionStats};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Maximum flush rate for coalesced updates.
pub const FLUSH_DEBOUNCE: Duration = Duration::from_secs(10);

/// Mandatory rewrite interval even without updates.
pub const HEARTBEAT: Duration = Duration::from_secs(15);

/// A session event fed into the tracker by the host's tool hooks.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Edit { path: Option<String> },
    Read,
    Test,
    Commit,
    ToolCall { name: String, tokens: u64 },
    Activity { text: String },
}

struct TrackerState {
    window: ActivityWindow,
    stats: SessionStats,
    current_activity: Option<String>,
    last_tool_call: Option<String>,
    last_activity_ms: u64,
    last_flush_ms: u64,
    dirty: bool,
}

/// Coalesces session events; the flush task drains it into the registry.
pub struct ActivityTracker<C: Clock> {
    clock: C,
    started_at_ms: u64,
    auto_status_enabled: bool,
    state: Mutex<TrackerState>,
}

impl<C: Clock> ActivityTracker<C> {
    pub fn new(clock: C, auto_status_enabled: bool) -> Self {
        let now_ms = clock.epoch_ms();
        Self {
            clock,
            started_at_ms: now_ms,
            auto_status_enabled,
            state: Mutex::new(TrackerState {
                window: ActivityWindow::default(),
                stats: SessionStats::default(),
                current_activity: None,
                last_tool_call: None,
                last_activity_ms: now_ms,
                last_flush_ms: 0,
                dirty: true,
            }),
        }
    }

    pub fn record(&self, event: SessionEvent) {
        let now_ms = self.clock.epoch_ms();
        let mut state = self.state.lock();
        state.last_activity_ms = now_ms;
        state.dirty = true;
        match event {
            SessionEvent::Edit { path } => {
                state.window.record_edit(now_ms);
                if let Some(path) = path {
                    state.stats.record_file(path);
                }
            }
            SessionEvent::Read => state.window.record_read(now_ms),
            SessionEvent::Test => state.window.record_test(now_ms),
            SessionEvent::Commit => state.window.record_commit(now_ms),
            SessionEvent::ToolCall { name, tokens } => {
                state.stats.tool_calls += 1;
                state.stats.tokens += tokens;
                state.last_tool_call = Some(name);
            }
            SessionEvent::Activity { text } => state.current_activity = Some(text),
        }
    }

    /// Whether a flush is due: coalesced changes past the debounce, or the
    /// heartbeat interval elapsed.
    pub fn flush_due(&self) -> bool {
        let now_ms = self.clock.epoch_ms();
        let state = self.state.lock();
        let since_flush = now_ms.saturating_sub(state.last_flush_ms);
        (state.dirty && since_flush >= FLUSH_DEBOUNCE.as_millis() as u64)
            || since_flush >= HEARTBEAT.as_millis() as u64
    }

    /// Write the coalesced state into the presence record.
    pub fn flush(&self, registry: &Registry<C>, name: &str) {
        let now_ms = self.clock.epoch_ms();
        let timestamp = self.clock.timestamp();
        let mut state = self.state.lock();

        let stats = state.stats.clone();
        let activity = ActivityInfo {
            last_activity_at: timestamp,
            current_activity: state.current_activity.clone(),
            last_tool_call: state.last_tool_call.clone(),
        };
        let status = self.auto_status_enabled.then(|| {
            auto_status(
                now_ms,
                self.started_at_ms,
                &state.window,
                state.current_activity.as_deref(),
            )
        });

        state.dirty = false;
        state.last_flush_ms = now_ms;
        drop(state);

        let result = registry.update_own(name, |record| {
            record.session = Some(stats);
            record.activity = Some(activity);
            if let Some(status) = status {
                record.status_message = (!status.is_empty()).then_some(status);
            }
        });
        if let Err(e) = result {
            tracing::debug!(name, error = %e, "activity flush skipped");
        }
    }

    /// Milliseconds since the last recorded activity.
    pub fn idle_ms(&self) -> u64 {
        let state = self.state.lock();
        self.clock.epoch_ms().saturating_sub(state.last_activity_ms)
    }
}

/// Drive periodic flushes until cancelled. One task per session.
pub fn spawn_flush_task<C: Clock + 'static>(
    tracker: Arc<ActivityTracker<C>>,
    registry: Registry<C>,
    name: String,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    if tracker.flush_due() {
                        tracker.flush(&registry, &name);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
