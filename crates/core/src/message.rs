// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbox messages: one JSON file per pending message

use crate::id::MessageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single pending message in `B/inbox/<recipient>/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub from: String,
    pub to: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub reply_to: Option<MessageId>,
}

impl Message {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
        reply_to: Option<MessageId>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            from: from.into(),
            to: to.into(),
            text: text.into(),
            timestamp,
            reply_to,
        }
    }

    /// File name for this message: ISO timestamp prefix so that an
    /// alphabetical directory sort equals delivery order, with a short
    /// id-derived suffix as the cross-sender tiebreak.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.json",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.id.short(4),
        )
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
