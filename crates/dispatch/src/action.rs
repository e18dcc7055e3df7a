// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action parsing
//!
//! The tool surface takes a free-form JSON record; the `action` field
//! selects the operation. This module turns that record into a typed
//! variant so the dispatcher can match exhaustively, with missing-field
//! failures mapped to their short error kinds.

use serde_json::Value;

/// A parse failure with its error kind tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub kind: &'static str,
    pub text: String,
}

fn missing(kind: &'static str, what: &str) -> ParseFailure {
    ParseFailure {
        kind,
        text: format!("missing required field {what:?}"),
    }
}

fn req_str(record: &Value, key: &str, kind: &'static str) -> Result<String, ParseFailure> {
    match record.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(missing(kind, key)),
    }
}

fn opt_str(record: &Value, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn opt_bool(record: &Value, key: &str) -> Option<bool> {
    record.get(key).and_then(Value::as_bool)
}

fn opt_usize(record: &Value, key: &str) -> Option<usize> {
    record.get(key).and_then(Value::as_u64).map(|n| n as usize)
}

/// String or array-of-strings field; single strings become one-element
/// lists so `paths: "src/"` and `paths: ["src/"]` both work.
fn str_list(record: &Value, key: &str) -> Vec<String> {
    match record.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Sub-operation of `autoRegisterPath`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoRegisterOp {
    Add,
    Remove,
    List,
}

/// The typed action set of the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Join { spec: Option<String> },
    Status,
    List,
    Feed { limit: Option<usize> },
    Whois { name: String },
    SetStatus { message: Option<String> },
    Spec { spec: String },
    Send { to: String, message: String, reply_to: Option<String> },
    Broadcast { message: String, reply_to: Option<String> },
    Reserve { paths: Vec<String>, reason: Option<String> },
    Release { paths: Option<Vec<String>> },
    Rename { name: String },
    Swarm { spec: Option<String> },
    Claim { task_id: String, spec: Option<String>, reason: Option<String> },
    Unclaim { task_id: String, spec: Option<String> },
    Complete { task_id: String, spec: Option<String>, notes: Option<String> },
    AutoRegisterPath { op: AutoRegisterOp },
    EpicCreate { title: String },
    EpicShow { id: String },
    EpicList,
    EpicClose { id: String },
    EpicSetSpec { id: String, content: String },
    TaskCreate { epic: String, title: String, description: Option<String>, depends_on: Vec<String> },
    TaskShow { id: String },
    TaskList { epic: Option<String> },
    TaskStart { id: String },
    TaskDone { id: String, summary: Option<String> },
    TaskBlock { id: String, reason: String },
    TaskUnblock { id: String },
    TaskReady { epic: String },
    TaskReset { id: String, cascade: bool },
    Plan { target: String, idea: bool },
    Work { target: String, autonomous: bool, concurrency: Option<usize> },
    Review { target: String, review_type: Option<String> },
    CheckpointSave { id: Option<String> },
    CheckpointRestore { id: String },
    CheckpointDelete { id: String },
    CheckpointList,
    CrewStatus,
    CrewValidate { id: Option<String> },
    CrewAgents,
    CrewInstall,
    CrewUninstall,
}

impl Action {
    /// Parse a tool record. An omitted action is a status query; an
    /// unrecognized one is `unknown_action`.
    pub fn parse(record: &Value) -> Result<Action, ParseFailure> {
        let action = record
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("status");

        match action {
            "join" => Ok(Action::Join {
                spec: opt_str(record, "spec"),
            }),
            "status" => Ok(Action::Status),
            "list" => Ok(Action::List),
            "feed" => Ok(Action::Feed {
                limit: opt_usize(record, "limit"),
            }),
            "whois" => Ok(Action::Whois {
                name: req_str(record, "name", "missing_recipient")?,
            }),
            "set_status" => Ok(Action::SetStatus {
                message: opt_str(record, "message"),
            }),
            "spec" => Ok(Action::Spec {
                spec: req_str(record, "spec", "no_spec")?,
            }),
            "send" => Ok(Action::Send {
                to: req_str(record, "to", "missing_recipient")?,
                message: req_str(record, "message", "missing_message")?,
                reply_to: opt_str(record, "replyTo"),
            }),
            "broadcast" => Ok(Action::Broadcast {
                message: req_str(record, "message", "missing_message")?,
                reply_to: opt_str(record, "replyTo"),
            }),
            "reserve" => {
                let paths = str_list(record, "paths");
                if paths.is_empty() {
                    return Err(missing("missing_paths", "paths"));
                }
                Ok(Action::Reserve {
                    paths,
                    reason: opt_str(record, "reason"),
                })
            }
            "release" => {
                let paths = str_list(record, "paths");
                Ok(Action::Release {
                    paths: (!paths.is_empty()).then_some(paths),
                })
            }
            "rename" => Ok(Action::Rename {
                name: req_str(record, "name", "invalid_name")?,
            }),
            "swarm" => Ok(Action::Swarm {
                spec: opt_str(record, "spec"),
            }),
            "claim" => Ok(Action::Claim {
                task_id: req_str(record, "taskId", "missing_id")?,
                spec: opt_str(record, "spec"),
                reason: opt_str(record, "reason"),
            }),
            "unclaim" => Ok(Action::Unclaim {
                task_id: req_str(record, "taskId", "missing_id")?,
                spec: opt_str(record, "spec"),
            }),
            "complete" => Ok(Action::Complete {
                task_id: req_str(record, "taskId", "missing_id")?,
                spec: opt_str(record, "spec"),
                notes: opt_str(record, "notes"),
            }),
            "autoRegisterPath" => {
                let op = match record.get("autoRegisterPath").and_then(Value::as_str) {
                    Some("add") => AutoRegisterOp::Add,
                    Some("remove") => AutoRegisterOp::Remove,
                    Some("list") => AutoRegisterOp::List,
                    _ => {
                        return Err(ParseFailure {
                            kind: "unknown_operation",
                            text: "autoRegisterPath must be add, remove, or list".to_string(),
                        })
                    }
                };
                Ok(Action::AutoRegisterPath { op })
            }
            "epic.create" => Ok(Action::EpicCreate {
                title: req_str(record, "title", "missing_title")?,
            }),
            "epic.show" => Ok(Action::EpicShow {
                id: req_str(record, "id", "missing_id")?,
            }),
            "epic.list" => Ok(Action::EpicList),
            "epic.close" => Ok(Action::EpicClose {
                id: req_str(record, "id", "missing_id")?,
            }),
            "epic.set_spec" => Ok(Action::EpicSetSpec {
                id: req_str(record, "id", "missing_id")?,
                content: req_str(record, "content", "missing_content")?,
            }),
            "task.create" => Ok(Action::TaskCreate {
                epic: req_str(record, "epic", "missing_id")?,
                title: req_str(record, "title", "missing_title")?,
                description: opt_str(record, "description"),
                depends_on: str_list(record, "dependsOn"),
            }),
            "task.show" => Ok(Action::TaskShow {
                id: req_str(record, "id", "missing_id")?,
            }),
            "task.list" => Ok(Action::TaskList {
                epic: opt_str(record, "epic"),
            }),
            "task.start" => Ok(Action::TaskStart {
                id: req_str(record, "id", "missing_id")?,
            }),
            "task.done" => Ok(Action::TaskDone {
                id: req_str(record, "id", "missing_id")?,
                summary: opt_str(record, "summary"),
            }),
            "task.block" => Ok(Action::TaskBlock {
                id: req_str(record, "id", "missing_id")?,
                reason: req_str(record, "reason", "missing_content")?,
            }),
            "task.unblock" => Ok(Action::TaskUnblock {
                id: req_str(record, "id", "missing_id")?,
            }),
            "task.ready" => Ok(Action::TaskReady {
                epic: req_str(record, "epic", "missing_id")?,
            }),
            "task.reset" => Ok(Action::TaskReset {
                id: req_str(record, "id", "missing_id")?,
                cascade: opt_bool(record, "cascade").unwrap_or(false),
            }),
            "plan" => Ok(Action::Plan {
                target: req_str(record, "target", "missing_title")?,
                idea: opt_bool(record, "idea").unwrap_or(false),
            }),
            "work" => Ok(Action::Work {
                target: req_str(record, "target", "missing_id")?,
                autonomous: opt_bool(record, "autonomous").unwrap_or(false),
                concurrency: opt_usize(record, "concurrency"),
            }),
            "review" => Ok(Action::Review {
                target: req_str(record, "target", "missing_id")?,
                review_type: opt_str(record, "type"),
            }),
            "checkpoint.save" => Ok(Action::CheckpointSave {
                id: opt_str(record, "id"),
            }),
            "checkpoint.restore" => Ok(Action::CheckpointRestore {
                id: req_str(record, "id", "missing_id")?,
            }),
            "checkpoint.delete" => Ok(Action::CheckpointDelete {
                id: req_str(record, "id", "missing_id")?,
            }),
            "checkpoint.list" => Ok(Action::CheckpointList),
            "crew.status" => Ok(Action::CrewStatus),
            "crew.validate" => Ok(Action::CrewValidate {
                id: opt_str(record, "id"),
            }),
            "crew.agents" => Ok(Action::CrewAgents),
            "crew.install" => Ok(Action::CrewInstall),
            "crew.uninstall" => Ok(Action::CrewUninstall),
            other => Err(ParseFailure {
                kind: "unknown_action",
                text: format!("unknown action {other:?}"),
            }),
        }
    }

    /// The mode string echoed in reply details.
    pub fn mode(&self) -> &'static str {
        match self {
            Action::Join { .. } => "join",
            Action::Status => "status",
            Action::List => "list",
            Action::Feed { .. } => "feed",
            Action::Whois { .. } => "whois",
            Action::SetStatus { .. } => "set_status",
            Action::Spec { .. } => "spec",
            Action::Send { .. } => "send",
            Action::Broadcast { .. } => "broadcast",
            Action::Reserve { .. } => "reserve",
            Action::Release { .. } => "release",
            Action::Rename { .. } => "rename",
            Action::Swarm { .. } => "swarm",
            Action::Claim { .. } => "claim",
            Action::Unclaim { .. } => "unclaim",
            Action::Complete { .. } => "complete",
            Action::AutoRegisterPath { .. } => "autoRegisterPath",
            Action::EpicCreate { .. } => "epic.create",
            Action::EpicShow { .. } => "epic.show",
            Action::EpicList => "epic.list",
            Action::EpicClose { .. } => "epic.close",
            Action::EpicSetSpec { .. } => "epic.set_spec",
            Action::TaskCreate { .. } => "task.create",
            Action::TaskShow { .. } => "task.show",
            Action::TaskList { .. } => "task.list",
            Action::TaskStart { .. } => "task.start",
            Action::TaskDone { .. } => "task.done",
            Action::TaskBlock { .. } => "task.block",
            Action::TaskUnblock { .. } => "task.unblock",
            Action::TaskReady { .. } => "task.ready",
            Action::TaskReset { .. } => "task.reset",
            Action::Plan { .. } => "plan",
            Action::Work { .. } => "work",
            Action::Review { .. } => "review",
            Action::CheckpointSave { .. } => "checkpoint.save",
            Action::CheckpointRestore { .. } => "checkpoint.restore",
            Action::CheckpointDelete { .. } => "checkpoint.delete",
            Action::CheckpointList => "checkpoint.list",
            Action::CrewStatus => "crew.status",
            Action::CrewValidate { .. } => "crew.validate",
            Action::CrewAgents => "crew.agents",
            Action::CrewInstall => "crew.install",
            Action::CrewUninstall => "crew.uninstall",
        }
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
