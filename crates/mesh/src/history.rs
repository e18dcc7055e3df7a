// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-sender chat history, unread counters, and echo-loop suppression
//!
//! Two agents that auto-reply to each other would ping-pong forever. The
//! suppression rule: once three messages from one sender arrive within a
//! 60-second window, further messages are still shown but carry no wake-up,
//! and a one-line note tells the host not to reply.

use parking_lot::Mutex;
use pim_core::{Clock, Message, SessionId};
use std::collections::{HashMap, VecDeque};

/// History retained per sender.
pub const HISTORY_CAP: usize = 50;

/// Receives within this window count toward suppression.
pub const EXCHANGE_WINDOW_MS: u64 = 60_000;

/// Receives inside the window before wake-up is suppressed.
pub const EXCHANGE_LIMIT: usize = 3;

/// The outcome of recording one incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub message: Message,
    /// Whether the host should wake and treat the text as steering input.
    pub wake: bool,
    /// Suppression note to append to the display, when wake is withheld.
    pub note: Option<String>,
    /// First message from this sender's current session identity.
    pub first_contact: bool,
}

#[derive(Default)]
struct SenderState {
    history: VecDeque<Message>,
    unread: u32,
    last_session: Option<SessionId>,
    recent_ms: VecDeque<u64>,
}

/// In-memory delivery-side state, owned by one session.
pub struct ChatHistory<C: Clock> {
    clock: C,
    senders: Mutex<HashMap<String, SenderState>>,
}

impl<C: Clock> ChatHistory<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            senders: Mutex::new(HashMap::new()),
        }
    }

    /// Record an incoming message and decide its wake-up semantics.
    ///
    /// `sender_session` is the sender's current session identity from the
    /// registry, when known; a change marks first contact.
    pub fn record_incoming(
        &self,
        message: Message,
        sender_session: Option<&SessionId>,
    ) -> Delivered {
        let now_ms = self.clock.epoch_ms();
        let mut senders = self.senders.lock();
        let state = senders.entry(message.from.clone()).or_default();

        let first_contact = match (state.last_session.as_ref(), sender_session) {
            (Some(previous), Some(current)) => previous != current,
            (None, _) => true,
            (Some(_), None) => false,
        };
        if let Some(session) = sender_session {
            state.last_session = Some(session.clone());
        }

        let cutoff = now_ms.saturating_sub(EXCHANGE_WINDOW_MS);
        while state.recent_ms.front().is_some_and(|&t| t < cutoff) {
            state.recent_ms.pop_front();
        }
        let suppress = state.recent_ms.len() >= EXCHANGE_LIMIT;
        state.recent_ms.push_back(now_ms);

        state.history.push_back(message.clone());
        while state.history.len() > HISTORY_CAP {
            state.history.pop_front();
        }
        state.unread += 1;

        let note = suppress.then(|| {
            format!(
                "loop suppressed — too many rapid exchanges with {}, no reply needed",
                message.from
            )
        });
        Delivered {
            message,
            wake: !suppress,
            note,
            first_contact,
        }
    }

    /// Unread count for one sender.
    pub fn unread(&self, sender: &str) -> u32 {
        self.senders
            .lock()
            .get(sender)
            .map_or(0, |state| state.unread)
    }

    /// Total unread across all senders.
    pub fn unread_total(&self) -> u32 {
        self.senders.lock().values().map(|s| s.unread).sum()
    }

    /// Clear the unread counter for a sender.
    pub fn mark_read(&self, sender: &str) {
        if let Some(state) = self.senders.lock().get_mut(sender) {
            state.unread = 0;
        }
    }

    /// Snapshot of the retained history for a sender, oldest first.
    pub fn history(&self, sender: &str) -> Vec<Message> {
        self.senders
            .lock()
            .get(sender)
            .map(|state| state.history.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
