// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for presence and messaging actions

use crate::action::AutoRegisterOp;
use crate::reply::Reply;
use crate::session::MessengerSession;
use pim_core::{Clock, FeedKind, MessageId, StatusTier};
use pim_crew::WorkerAdapter;
use pim_mesh::{Inbox, RegisterRequest, RegistryError, SendError};
use pim_store::atomic::{read_json, write_json};
use pim_store::Layout;
use serde_json::{json, Value};
use std::path::Path;

fn git_branch(cwd: &Path) -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(cwd)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!branch.is_empty()).then_some(branch)
}

pub(crate) fn registry_error(mode: &str, err: RegistryError) -> Reply {
    match err {
        RegistryError::InvalidName(e) => Reply::error(mode, "invalid_name", e.to_string()),
        RegistryError::NameTaken(name) => {
            Reply::error(mode, "name_taken", format!("the name {name:?} is taken"))
        }
        RegistryError::NotRegistered(_) => {
            Reply::error(mode, "not_registered", "join the mesh first")
        }
        RegistryError::SameName => {
            Reply::error(mode, "same_name", "that is already your name")
        }
        RegistryError::Lock(e) => Reply::error(mode, "lock_timeout", e.to_string()),
        RegistryError::Io(e) => Reply::error(mode, "io", e.to_string()),
    }
}

fn send_error(mode: &str, to: &str, err: SendError) -> Reply {
    match err {
        SendError::CannotSendToSelf => Reply::error(
            mode,
            "cannot_send_to_self",
            "you cannot message yourself",
        ),
        SendError::RecipientNotFound(_) => Reply::error_with(
            mode,
            "recipient_not_found",
            format!("no active agent named {to:?}"),
            json!({ "recipient": to }),
        ),
        SendError::RecipientNotActive(_) => Reply::error_with(
            mode,
            "recipient_not_active",
            format!("{to} is no longer active"),
            json!({ "recipient": to }),
        ),
        SendError::Io(e) => Reply::error(mode, "io", e.to_string()),
    }
}

impl<C: Clock + 'static, W: WorkerAdapter> MessengerSession<C, W> {
    fn require_name(&self, mode: &str) -> Result<String, Box<Reply>> {
        self.name()
            .ok_or_else(|| Box::new(Reply::error(mode, "not_registered", "join the mesh first")))
    }

    fn inbox_for(&self, name: &str) -> Inbox<C> {
        Inbox::new(self.layout.clone(), self.clock.clone(), name)
    }

    pub(crate) async fn handle_join(&self, spec: Option<String>) -> Reply {
        if let Some(name) = self.name() {
            return Reply::with(
                "join",
                format!("Already joined as {name}."),
                json!({ "name": name }),
            );
        }
        let request = RegisterRequest {
            forced_name: self.setup.forced_name.clone(),
            session_id: self.session_id.clone(),
            pid: std::process::id(),
            cwd: self.setup.cwd.clone(),
            model: self.setup.model.clone(),
            git_branch: git_branch(&self.setup.cwd),
            spec: spec.map(|s| self.canonical_spec(&s)),
            is_human: self.setup.is_human,
        };
        let record = match self.registry.register(&request, &self.name_pool()) {
            Ok(record) => record,
            Err(e) => return registry_error("join", e),
        };

        {
            let mut state = self.state.lock();
            state.name = Some(record.name.clone());
            state.spec = record.spec.clone();
        }
        self.start_background(&record.name);
        self.feed_event(FeedKind::Join, None, None);

        let peers = self
            .registry
            .active_agents()
            .iter()
            .filter(|r| r.name != record.name)
            .count();
        Reply::with(
            "join",
            format!(
                "Joined the mesh as {}. {peers} peer(s) active.",
                record.name
            ),
            json!({ "name": record.name, "peers": peers }),
        )
    }

    pub(crate) fn handle_status(&self) -> Reply {
        let Some(name) = self.name() else {
            return Reply::with(
                "status",
                "Not joined. Use the join action to enter the mesh.",
                json!({ "joined": false }),
            );
        };
        let record = self.registry.get(&name);
        let peers = self
            .registry
            .active_agents()
            .iter()
            .filter(|r| r.name != name)
            .count();
        let (claims, _) = self.claims.view();
        let held = claims.held_by(&name).map(|(spec, task, claim)| {
            json!({ "spec": spec, "taskId": task, "claimedAt": claim.claimed_at })
        });
        let reservations = record
            .as_ref()
            .map(|r| r.reservations.len())
            .unwrap_or_default();
        let spec = self.state.lock().spec.clone();
        let unread = self.history.unread_total();

        let mut text = format!("{name}: {peers} peer(s) active");
        if unread > 0 {
            text.push_str(&format!(", {unread} unread"));
        }
        if let Some(spec) = &spec {
            text.push_str(&format!(", spec {spec}"));
        }
        text.push('.');
        Reply::with(
            "status",
            text,
            json!({
                "joined": true,
                "name": name,
                "peers": peers,
                "unread": unread,
                "spec": spec,
                "claim": held,
                "reservations": reservations,
            }),
        )
    }

    pub(crate) fn handle_list(&self) -> Reply {
        let agents = self.registry.active_agents();
        if agents.is_empty() {
            return Reply::with("list", "No active agents.", json!({ "agents": [] }));
        }

        let now_ms = self.clock.epoch_ms();
        let details: Vec<Value> = agents
            .iter()
            .map(|r| {
                let elapsed = r
                    .activity
                    .as_ref()
                    .map(|a| {
                        now_ms.saturating_sub(a.last_activity_at.timestamp_millis().max(0) as u64)
                            / 1000
                    })
                    .unwrap_or(0);
                let holding = !r.reservations.is_empty();
                let tier = StatusTier::compute(elapsed, holding, self.config.stuck_threshold);
                json!({
                    "name": r.name,
                    "cwd": r.cwd,
                    "model": r.model,
                    "status": tier.as_str(),
                    "statusMessage": r.custom_status.clone().or(r.status_message.clone()),
                    "isHuman": r.is_human,
                })
            })
            .collect();

        // Group the text listing by working directory.
        let mut lines = Vec::new();
        let mut cwds: Vec<_> = agents.iter().map(|r| r.cwd.clone()).collect();
        cwds.sort();
        cwds.dedup();
        for cwd in cwds {
            lines.push(format!("{}:", cwd.display()));
            for record in agents.iter().filter(|r| r.cwd == cwd) {
                let status = record
                    .custom_status
                    .as_deref()
                    .or(record.status_message.as_deref())
                    .unwrap_or("");
                if status.is_empty() {
                    lines.push(format!("  {}", record.name));
                } else {
                    lines.push(format!("  {} — {status}", record.name));
                }
            }
        }
        Reply::with("list", lines.join("\n"), json!({ "agents": details }))
    }

    pub(crate) fn handle_feed(&self, limit: Option<usize>) -> Reply {
        let events = self.feed.recent(limit.unwrap_or(20));
        let text = if events.is_empty() {
            "No recent activity.".to_string()
        } else {
            events
                .iter()
                .map(|e| {
                    let mut line = format!("{} {}", e.agent, e.kind);
                    if let Some(target) = &e.target {
                        line.push_str(&format!(" {target}"));
                    }
                    line
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        Reply::with(
            "feed",
            text,
            json!({ "events": serde_json::to_value(&events).unwrap_or_default() }),
        )
    }

    pub(crate) fn handle_whois(&self, name: &str) -> Reply {
        let Some(record) = self.registry.get(name) else {
            return Reply::error(
                "whois",
                "not_found",
                format!("no agent named {name:?}"),
            );
        };
        let mut text = format!(
            "{} · pid {} · {} · {}",
            record.name,
            record.pid,
            record.model,
            record.cwd.display(),
        );
        if let Some(activity) = &record.activity {
            let elapsed = self
                .clock
                .epoch_ms()
                .saturating_sub(activity.last_activity_at.timestamp_millis().max(0) as u64)
                / 1000;
            text.push_str(&format!(" · active {} ago", pim_core::format_elapsed(elapsed)));
        }
        Reply::with(
            "whois",
            text,
            json!({ "agent": serde_json::to_value(&record).unwrap_or_default() }),
        )
    }

    pub(crate) fn handle_set_status(&self, message: Option<String>) -> Reply {
        let name = match self.require_name("set_status") {
            Ok(name) => name,
            Err(reply) => return *reply,
        };
        let cleared = message.is_none();
        let result = self
            .registry
            .update_own(&name, |record| record.custom_status = message.clone());
        match result {
            Ok(_) if cleared => Reply::ok("set_status", "Status cleared."),
            Ok(_) => Reply::ok("set_status", "Status set."),
            Err(e) => registry_error("set_status", e),
        }
    }

    pub(crate) fn handle_spec(&self, spec: &str) -> Reply {
        let name = match self.require_name("spec") {
            Ok(name) => name,
            Err(reply) => return *reply,
        };
        let canonical = self.canonical_spec(spec);
        self.state.lock().spec = Some(canonical.clone());
        if let Err(e) = self
            .registry
            .update_own(&name, |record| record.spec = Some(canonical.clone()))
        {
            return registry_error("spec", e);
        }

        if Path::new(&canonical).exists() {
            Reply::with(
                "spec",
                format!("Working spec set to {canonical}."),
                json!({ "spec": canonical }),
            )
        } else {
            Reply::with(
                "spec",
                format!("Warning: spec file {canonical} does not exist."),
                json!({ "spec": canonical, "warning": "spec_missing" }),
            )
        }
    }

    pub(crate) fn handle_send(
        &self,
        to: &str,
        message: &str,
        reply_to: Option<String>,
    ) -> Reply {
        let name = match self.require_name("send") {
            Ok(name) => name,
            Err(reply) => return *reply,
        };
        let inbox = self.inbox_for(&name);
        let reply_to = reply_to.map(MessageId::new);

        let recipients: Vec<&str> = to
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if recipients.is_empty() {
            return Reply::error("send", "empty_recipients", "no recipient given");
        }

        let mut sent = Vec::new();
        for recipient in &recipients {
            match inbox.send(&self.registry, recipient, message, reply_to.clone()) {
                Ok(msg) => sent.push(msg),
                Err(e) => return send_error("send", recipient, e),
            }
            self.feed_event(FeedKind::Message, Some(recipient), Some(message));
        }

        let text = if recipients.len() == 1 {
            format!("Message sent to {}.", recipients[0])
        } else {
            format!("Message sent to {} agents.", recipients.len())
        };
        Reply::with(
            "send",
            text,
            json!({
                "sent": sent.iter().map(|m| m.to.clone()).collect::<Vec<_>>(),
                "messageId": sent.first().map(|m| m.id.clone()),
            }),
        )
    }

    pub(crate) fn handle_broadcast(&self, message: &str, reply_to: Option<String>) -> Reply {
        let name = match self.require_name("broadcast") {
            Ok(name) => name,
            Err(reply) => return *reply,
        };
        let inbox = self.inbox_for(&name);
        let outcome = inbox.broadcast(&self.registry, message, reply_to.map(MessageId::new));
        if outcome.sent.is_empty() && outcome.failures.is_empty() {
            return Reply::error("broadcast", "no_recipients", "no active peers to notify");
        }
        for recipient in &outcome.sent {
            self.feed_event(FeedKind::Message, Some(recipient), Some(message));
        }
        let failures: Vec<Value> = outcome
            .failures
            .iter()
            .map(|(name, e)| json!({ "recipient": name, "error": e.to_string() }))
            .collect();
        Reply::with(
            "broadcast",
            format!("Broadcast sent to {} agent(s).", outcome.sent.len()),
            json!({ "sent": outcome.sent, "failures": failures }),
        )
    }

    pub(crate) async fn handle_rename(&self, new_name: &str) -> Reply {
        let name = match self.require_name("rename") {
            Ok(name) => name,
            Err(reply) => return *reply,
        };
        match self
            .registry
            .rename(&name, new_name, &self.session_id)
            .await
        {
            Ok(record) => {
                self.restart_background(&record.name);
                self.state.lock().name = Some(record.name.clone());
                Reply::with(
                    "rename",
                    format!("Renamed {name} to {}.", record.name),
                    json!({ "name": record.name, "previous": name }),
                )
            }
            Err(e) => registry_error("rename", e),
        }
    }

    pub(crate) fn handle_auto_register_path(&self, op: AutoRegisterOp) -> Reply {
        let Some(path) = Layout::user_config_path() else {
            return Reply::error("autoRegisterPath", "io", "no home directory");
        };
        let cwd = self.setup.cwd.to_string_lossy().into_owned();
        let mut config: Value = read_json(&path).unwrap_or_else(|| json!({}));
        let paths = config
            .as_object_mut()
            .map(|o| {
                o.entry("autoRegisterPaths")
                    .or_insert_with(|| json!([]))
            });
        let Some(Value::Array(paths)) = paths else {
            return Reply::error("autoRegisterPath", "io", "malformed user config");
        };

        match op {
            AutoRegisterOp::List => {
                let listed: Vec<&str> = paths.iter().filter_map(Value::as_str).collect();
                let text = if listed.is_empty() {
                    "No auto-register paths.".to_string()
                } else {
                    listed.join("\n")
                };
                Reply::with("autoRegisterPath", text, json!({ "paths": listed }))
            }
            AutoRegisterOp::Add => {
                if !paths.iter().any(|p| p.as_str() == Some(cwd.as_str())) {
                    paths.push(json!(cwd));
                }
                match write_json(&path, &config) {
                    Ok(()) => Reply::with(
                        "autoRegisterPath",
                        format!("Auto-join enabled for {cwd}."),
                        json!({ "path": cwd }),
                    ),
                    Err(e) => Reply::error("autoRegisterPath", "io", e.to_string()),
                }
            }
            AutoRegisterOp::Remove => {
                paths.retain(|p| p.as_str() != Some(cwd.as_str()));
                match write_json(&path, &config) {
                    Ok(()) => Reply::with(
                        "autoRegisterPath",
                        format!("Auto-join disabled for {cwd}."),
                        json!({ "path": cwd }),
                    ),
                    Err(e) => Reply::error("autoRegisterPath", "io", e.to_string()),
                }
            }
        }
    }

    /// Stop and restart the watcher, drain, and flush tasks after a name
    /// change moved the inbox directory.
    fn restart_background(&self, new_name: &str) {
        let (watcher, drain_task, flush_task) = {
            let mut state = self.state.lock();
            (
                state.watcher.take(),
                state.drain_task.take(),
                state.flush_task.take(),
            )
        };
        if let Some(watcher) = watcher {
            watcher.shutdown();
        }
        if let Some(task) = drain_task {
            task.abort();
        }
        if let Some(task) = flush_task {
            task.abort();
        }
        self.start_background(new_name);
    }
}
