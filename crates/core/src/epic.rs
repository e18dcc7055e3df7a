// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epic records for the crew layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

crate::define_id! {
    /// Epic identifier of the form `c-<N>-<sss>`: N a positive integer
    /// allocated by scanning existing epics, sss three lowercase
    /// alphanumerics.
    pub struct EpicId;
}

/// Errors from epic id parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EpicIdError {
    #[error("epic id must look like c-<N>-<sss>: {0:?}")]
    Malformed(String),
}

impl EpicId {
    /// Build an id from its number and three-character suffix.
    pub fn compose(n: u64, suffix: &str) -> Self {
        Self(format!("c-{n}-{suffix}"))
    }

    /// Split into (number, suffix), validating the shape.
    pub fn parse(&self) -> Result<(u64, &str), EpicIdError> {
        let malformed = || EpicIdError::Malformed(self.0.clone());
        let rest = self.0.strip_prefix("c-").ok_or_else(malformed)?;
        let (num, suffix) = rest.split_once('-').ok_or_else(malformed)?;
        let n: u64 = num.parse().map_err(|_| malformed())?;
        if n == 0
            || suffix.len() != 3
            || !suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(malformed());
        }
        Ok((n, suffix))
    }

    /// The numeric component, if the id is well-formed.
    pub fn number(&self) -> Option<u64> {
        self.parse().ok().map(|(n, _)| n)
    }

    /// Allocate the next epic number: `max(N) + 1` over existing ids.
    pub fn next_number<'a>(existing: impl Iterator<Item = &'a EpicId>) -> u64 {
        existing.filter_map(EpicId::number).max().unwrap_or(0) + 1
    }
}

/// Epic lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicStatus {
    Planning,
    Active,
    Blocked,
    Completed,
    Archived,
}

impl std::fmt::Display for EpicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EpicStatus::Planning => "planning",
            EpicStatus::Active => "active",
            EpicStatus::Blocked => "blocked",
            EpicStatus::Completed => "completed",
            EpicStatus::Archived => "archived",
        })
    }
}

/// An epic record, stored at `crew/epics/<id>.json`.
///
/// `task_count` and `completed_count` are denormalized; the task lifecycle
/// operations keep them consistent with the task files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    pub id: EpicId,
    pub title: String,
    pub status: EpicStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub task_count: u32,
    pub completed_count: u32,
}

impl Epic {
    pub fn new(id: EpicId, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            status: EpicStatus::Planning,
            created_at,
            updated_at: created_at,
            closed_at: None,
            task_count: 0,
            completed_count: 0,
        }
    }
}

#[cfg(test)]
#[path = "epic_tests.rs"]
mod tests;
