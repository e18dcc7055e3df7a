// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Presence records: one JSON file per live agent in the registry

use crate::id::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Maximum length of an agent name.
pub const NAME_MAX_LEN: usize = 50;

/// Cap on the recently-modified files list carried in the presence record.
pub const FILES_MODIFIED_CAP: usize = 20;

/// Errors from agent name validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name is empty")]
    Empty,
    #[error("name exceeds {NAME_MAX_LEN} characters")]
    TooLong,
    #[error("name must start with a letter, digit, or underscore")]
    InvalidStart,
    #[error("name contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Validate an agent name: letters, digits, underscore, hyphen; the leading
/// character must be a letter, digit, or underscore; length 1–50.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > NAME_MAX_LEN {
        return Err(NameError::TooLong);
    }
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !(first.is_ascii_alphanumeric() || first == '_') {
            return Err(NameError::InvalidStart);
        }
    }
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(NameError::InvalidChar(c));
        }
    }
    Ok(())
}

/// A path reservation attached to a presence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub since: DateTime<Utc>,
}

impl Reservation {
    /// Whether this reservation covers `path`.
    ///
    /// A pattern ending in `/` is a directory prefix; anything else is exact
    /// string equality. No glob expansion, no normalization.
    pub fn matches(&self, path: &str) -> bool {
        if self.pattern.ends_with('/') {
            path.starts_with(self.pattern.as_str())
        } else {
            path == self.pattern
        }
    }
}

/// Session-lifetime counters surfaced in the presence record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    #[serde(default)]
    pub tool_calls: u64,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_modified: Vec<String>,
}

impl SessionStats {
    /// Record a modified file, keeping the newest `FILES_MODIFIED_CAP` entries.
    pub fn record_file(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.files_modified.retain(|p| p != &path);
        self.files_modified.push(path);
        if self.files_modified.len() > FILES_MODIFIED_CAP {
            let excess = self.files_modified.len() - FILES_MODIFIED_CAP;
            self.files_modified.drain(..excess);
        }
    }
}

/// Liveness-derived activity fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInfo {
    pub last_activity_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_activity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tool_call: Option<String>,
}

/// One agent's registry entry, stored at `B/registry/<name>.json`.
///
/// The file name equals `name`; `pid` is the process that wrote the file.
/// Optional fields evolve over time, so decoding must tolerate their absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub name: String,
    pub pid: u32,
    pub session_id: SessionId,
    pub cwd: PathBuf,
    pub model: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reservations: Vec<Reservation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(default)]
    pub is_human: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<ActivityInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
}

impl PresenceRecord {
    pub fn new(
        name: impl Into<String>,
        pid: u32,
        session_id: SessionId,
        cwd: PathBuf,
        model: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            pid,
            session_id,
            cwd,
            model: model.into(),
            started_at,
            reservations: Vec::new(),
            git_branch: None,
            spec: None,
            is_human: false,
            session: None,
            activity: None,
            status_message: None,
            custom_status: None,
        }
    }

    /// Reservations of this agent that cover `path`.
    pub fn reservations_matching<'a>(
        &'a self,
        path: &'a str,
    ) -> impl Iterator<Item = &'a Reservation> {
        self.reservations.iter().filter(move |r| r.matches(path))
    }
}

/// Computed liveness tier for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTier {
    Active,
    Idle,
    Away,
    Stuck,
}

impl StatusTier {
    /// Derive a tier from the time since last activity.
    ///
    /// `holding_work` is true when the agent has an in-flight claim or at
    /// least one reservation; `away` only applies to agents with nothing
    /// held, `stuck` only to agents that do hold something.
    pub fn compute(elapsed_secs: u64, holding_work: bool, stuck_threshold_secs: u64) -> Self {
        if holding_work && elapsed_secs >= stuck_threshold_secs {
            return StatusTier::Stuck;
        }
        if elapsed_secs < 30 {
            return StatusTier::Active;
        }
        if elapsed_secs < 300 {
            return StatusTier::Idle;
        }
        if holding_work {
            StatusTier::Idle
        } else {
            StatusTier::Away
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusTier::Active => "active",
            StatusTier::Idle => "idle",
            StatusTier::Away => "away",
            StatusTier::Stuck => "stuck",
        }
    }
}

impl std::fmt::Display for StatusTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
