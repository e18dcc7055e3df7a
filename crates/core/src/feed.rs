// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity feed events, appended as JSON lines to `P/.pi/messenger/feed.jsonl`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind tag of a feed event.
///
/// Serialized as its tag string. Unknown tags written by newer peers
/// deserialize to `Other` so a reader never chokes on a foreign feed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedKind {
    Join,
    Leave,
    Reserve,
    Release,
    Message,
    Commit,
    Test,
    Edit,
    Stuck,
    TaskStart,
    TaskDone,
    TaskBlock,
    TaskUnblock,
    TaskReset,
    PlanStart,
    PlanDone,
    PlanCancel,
    PlanFailed,
    Other(String),
}

impl FeedKind {
    pub fn as_str(&self) -> &str {
        match self {
            FeedKind::Join => "join",
            FeedKind::Leave => "leave",
            FeedKind::Reserve => "reserve",
            FeedKind::Release => "release",
            FeedKind::Message => "message",
            FeedKind::Commit => "commit",
            FeedKind::Test => "test",
            FeedKind::Edit => "edit",
            FeedKind::Stuck => "stuck",
            FeedKind::TaskStart => "task.start",
            FeedKind::TaskDone => "task.done",
            FeedKind::TaskBlock => "task.block",
            FeedKind::TaskUnblock => "task.unblock",
            FeedKind::TaskReset => "task.reset",
            FeedKind::PlanStart => "plan.start",
            FeedKind::PlanDone => "plan.done",
            FeedKind::PlanCancel => "plan.cancel",
            FeedKind::PlanFailed => "plan.failed",
            FeedKind::Other(s) => s.as_str(),
        }
    }

    fn from_tag(tag: String) -> Self {
        match tag.as_str() {
            "join" => FeedKind::Join,
            "leave" => FeedKind::Leave,
            "reserve" => FeedKind::Reserve,
            "release" => FeedKind::Release,
            "message" => FeedKind::Message,
            "commit" => FeedKind::Commit,
            "test" => FeedKind::Test,
            "edit" => FeedKind::Edit,
            "stuck" => FeedKind::Stuck,
            "task.start" => FeedKind::TaskStart,
            "task.done" => FeedKind::TaskDone,
            "task.block" => FeedKind::TaskBlock,
            "task.unblock" => FeedKind::TaskUnblock,
            "task.reset" => FeedKind::TaskReset,
            "plan.start" => FeedKind::PlanStart,
            "plan.done" => FeedKind::PlanDone,
            "plan.cancel" => FeedKind::PlanCancel,
            "plan.failed" => FeedKind::PlanFailed,
            _ => FeedKind::Other(tag),
        }
    }
}

impl serde::Serialize for FeedKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for FeedKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(FeedKind::from_tag(tag))
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub ts: DateTime<Utc>,
    pub agent: String,
    #[serde(rename = "type")]
    pub kind: FeedKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl FeedEvent {
    pub fn new(ts: DateTime<Utc>, agent: impl Into<String>, kind: FeedKind) -> Self {
        Self {
            ts,
            agent: agent.into(),
            kind,
            target: None,
            preview: None,
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn preview(mut self, preview: impl Into<String>) -> Self {
        self.preview = Some(preview.into());
        self
    }
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
