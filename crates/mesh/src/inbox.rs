// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbox send, broadcast, and drain
//!
//! Messages are one file each under `B/inbox/<recipient>/`, named so that
//! an alphabetical sort equals delivery order. Only the named recipient
//! drains its own inbox, which is what makes unlink-after-deliver give
//! exactly-once local delivery.

use crate::registry::Registry;
use async_trait::async_trait;
use parking_lot::Mutex;
use pim_core::{Clock, Message, MessageId};
use pim_store::{
    atomic::{read_json, remove_quiet, write_json},
    proc::pid_alive,
    Layout,
};
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Errors from sending a message
#[derive(Debug, Error)]
pub enum SendError {
    #[error("cannot send a message to yourself")]
    CannotSendToSelf,
    #[error("no agent named {0:?} is registered")]
    RecipientNotFound(String),
    #[error("agent {0:?} is registered but its process is gone")]
    RecipientNotActive(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Host-supplied delivery callback, invoked once per drained message.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn deliver(&self, message: Message);
}

/// Per-recipient results of a broadcast.
#[derive(Debug, Default)]
pub struct BroadcastOutcome {
    pub sent: Vec<String>,
    pub failures: Vec<(String, SendError)>,
}

#[derive(Default)]
struct DrainFlags {
    busy: bool,
    pending: bool,
}

/// One agent's view of the inbox directories.
#[derive(Clone)]
pub struct Inbox<C: Clock> {
    layout: Layout,
    clock: C,
    self_name: String,
    drain_flags: Arc<Mutex<DrainFlags>>,
}

impl<C: Clock> Inbox<C> {
    pub fn new(layout: Layout, clock: C, self_name: impl Into<String>) -> Self {
        Self {
            layout,
            clock,
            self_name: self_name.into(),
            drain_flags: Arc::new(Mutex::new(DrainFlags::default())),
        }
    }

    pub fn self_name(&self) -> &str {
        &self.self_name
    }

    /// Write a message into a recipient's inbox. The recipient must be
    /// currently active per the cached registry.
    pub fn send(
        &self,
        registry: &Registry<C>,
        to: &str,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Message, SendError> {
        if to == self.self_name {
            return Err(SendError::CannotSendToSelf);
        }
        let active = registry.active_agents();
        if !active.iter().any(|r| r.name == to) {
            // Stale cache or a dead peer: check the record directly.
            let path = self.layout.presence_path(to);
            match read_json::<pim_core::PresenceRecord>(&path) {
                Some(record) if pid_alive(record.pid) => {}
                Some(_) => {
                    remove_quiet(&path);
                    return Err(SendError::RecipientNotActive(to.to_string()));
                }
                None => return Err(SendError::RecipientNotFound(to.to_string())),
            }
        }

        let message = Message::new(
            self.self_name.clone(),
            to,
            text,
            self.clock.timestamp(),
            reply_to,
        );
        let path = self.layout.inbox_dir(to).join(message.file_name());
        write_json(&path, &message)?;
        tracing::debug!(to, id = %message.id, "message sent");
        Ok(message)
    }

    /// Send to every active peer. Per-recipient failures accumulate and do
    /// not abort the broadcast.
    pub fn broadcast(
        &self,
        registry: &Registry<C>,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        let peers: Vec<String> = registry
            .active_agents()
            .into_iter()
            .map(|r| r.name)
            .filter(|name| *name != self.self_name)
            .collect();
        for peer in peers {
            match self.send(registry, &peer, text, reply_to.clone()) {
                Ok(_) => outcome.sent.push(peer),
                Err(e) => outcome.failures.push((peer, e)),
            }
        }
        outcome
    }

    /// Process every pending message, in filename (timestamp) order.
    ///
    /// Re-entrant calls while a drain is running set a pending flag and
    /// return immediately; the running drain loops again before clearing
    /// its busy flag, so no wake-up is lost.
    pub async fn drain(&self, handler: &dyn DeliveryHandler) -> usize {
        {
            let mut flags = self.drain_flags.lock();
            if flags.busy {
                flags.pending = true;
                return 0;
            }
            flags.busy = true;
        }

        let mut delivered = 0;
        loop {
            delivered += self.drain_once(handler).await;
            let mut flags = self.drain_flags.lock();
            if flags.pending {
                flags.pending = false;
            } else {
                flags.busy = false;
                break;
            }
        }
        delivered
    }

    async fn drain_once(&self, handler: &dyn DeliveryHandler) -> usize {
        let dir = self.layout.inbox_dir(&self.self_name);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return 0;
        };
        let mut files: Vec<_> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .collect();
        files.sort();

        let mut delivered = 0;
        for path in files {
            match read_json::<Message>(&path) {
                Some(message) => {
                    handler.deliver(message).await;
                    remove_quiet(&path);
                    delivered += 1;
                }
                None => {
                    // A torn or foreign file will never parse; retrying
                    // forever would wedge the inbox.
                    tracing::warn!(path = %path.display(), "deleting unparseable message");
                    remove_quiet(&path);
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
#[path = "inbox_tests.rs"]
mod tests;
