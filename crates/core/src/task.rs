// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task records for the crew layer

use crate::epic::EpicId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

crate::define_id! {
    /// Task identifier of the form `<epic_id>.<M>`, M a positive integer
    /// allocated per epic.
    pub struct TaskId;
}

/// Errors from task id parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskIdError {
    #[error("task id must look like <epic_id>.<M>: {0:?}")]
    Malformed(String),
}

impl TaskId {
    /// Build an id from its epic and per-epic number.
    pub fn compose(epic: &EpicId, m: u64) -> Self {
        Self(format!("{}.{m}", epic.as_str()))
    }

    /// Split into (epic id, number), validating the shape.
    pub fn parse(&self) -> Result<(EpicId, u64), TaskIdError> {
        let malformed = || TaskIdError::Malformed(self.0.clone());
        let (epic, num) = self.0.rsplit_once('.').ok_or_else(malformed)?;
        let m: u64 = num.parse().map_err(|_| malformed())?;
        if m == 0 || epic.is_empty() {
            return Err(malformed());
        }
        Ok((EpicId::new(epic), m))
    }

    /// The per-epic numeric component, if well-formed.
    pub fn number(&self) -> Option<u64> {
        self.parse().ok().map(|(_, m)| m)
    }

    /// Allocate the next task number for an epic: `max(M) + 1`.
    pub fn next_number<'a>(existing: impl Iterator<Item = &'a TaskId>) -> u64 {
        existing.filter_map(TaskId::number).max().unwrap_or(0) + 1
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Blocked,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        })
    }
}

/// Links proving a task was done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commits: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prs: Vec<String>,
}

impl Evidence {
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.tests.is_empty() && self.prs.is_empty()
    }
}

/// A task record, stored at `crew/tasks/<id>.json`.
///
/// `depends_on` references only task ids of the same epic; the dependency
/// graph must stay acyclic (enforced by validation, not by construction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub epic_id: EpicId,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default)]
    pub attempt_count: u32,
}

impl Task {
    pub fn new(
        id: TaskId,
        epic_id: EpicId,
        title: impl Into<String>,
        depends_on: Vec<TaskId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            epic_id,
            title: title.into(),
            status: TaskStatus::Todo,
            depends_on,
            created_at,
            updated_at: created_at,
            started_at: None,
            completed_at: None,
            base_commit: None,
            assigned_to: None,
            summary: None,
            evidence: None,
            blocked_reason: None,
            attempt_count: 0,
        }
    }

    /// Clear all execution state, returning the task to a fresh `todo`.
    /// `attempt_count` survives a reset; it tracks lifetime attempts.
    pub fn clear_execution_state(&mut self) {
        self.status = TaskStatus::Todo;
        self.started_at = None;
        self.completed_at = None;
        self.base_commit = None;
        self.assigned_to = None;
        self.summary = None;
        self.evidence = None;
        self.blocked_reason = None;
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
