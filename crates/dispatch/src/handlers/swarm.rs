// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for reservations and the claim/completion store

use super::mesh::registry_error;
use crate::reply::Reply;
use crate::session::MessengerSession;
use pim_core::{Clock, FeedKind};
use pim_crew::WorkerAdapter;
use pim_mesh::reserve;
use pim_store::ClaimError;
use serde_json::json;

fn claim_error(mode: &str, err: ClaimError) -> Reply {
    match err {
        ClaimError::AlreadyClaimed { agent, claimed_at } => Reply::error_with(
            mode,
            "already_claimed",
            format!("already claimed by {agent}"),
            json!({ "conflict": { "agent": agent, "claimedAt": claimed_at } }),
        ),
        ClaimError::AlreadyHaveClaim { spec, task_id } => Reply::error_with(
            mode,
            "already_have_claim",
            format!("you already hold a claim on {task_id}"),
            json!({ "existing": { "spec": spec, "taskId": task_id } }),
        ),
        ClaimError::NotClaimed => Reply::error(mode, "not_claimed", "that task is not claimed"),
        ClaimError::NotYourClaim { agent } => Reply::error_with(
            mode,
            "not_your_claim",
            format!("that claim belongs to {agent}"),
            json!({ "owner": agent }),
        ),
        ClaimError::AlreadyCompleted {
            completed_by,
            completed_at,
        } => Reply::error_with(
            mode,
            "already_completed",
            format!("already completed by {completed_by}"),
            json!({ "completedBy": completed_by, "completedAt": completed_at }),
        ),
        ClaimError::Lock(e) => Reply::error(mode, "lock_timeout", e.to_string()),
        ClaimError::Io(e) => Reply::error(mode, "io", e.to_string()),
    }
}

impl<C: Clock + 'static, W: WorkerAdapter> MessengerSession<C, W> {
    fn require_name_swarm(&self, mode: &str) -> Result<String, Box<Reply>> {
        self.name()
            .ok_or_else(|| Box::new(Reply::error(mode, "not_registered", "join the mesh first")))
    }

    fn require_spec(&self, mode: &str, explicit: Option<&str>) -> Result<String, Box<Reply>> {
        self.resolve_spec(explicit).ok_or_else(|| {
            Box::new(Reply::error(
                mode,
                "no_spec",
                "no spec given and no working spec set",
            ))
        })
    }

    pub(crate) fn handle_reserve(&self, paths: Vec<String>, reason: Option<String>) -> Reply {
        let name = match self.require_name_swarm("reserve") {
            Ok(name) => name,
            Err(reply) => return *reply,
        };
        if paths.is_empty() {
            return Reply::error("reserve", "empty_patterns", "no patterns given");
        }
        let result = reserve::reserve(
            &self.registry,
            &name,
            &paths,
            reason.as_deref(),
            self.clock.timestamp(),
        );
        match result {
            Ok(record) => {
                for path in &paths {
                    self.feed_event(FeedKind::Reserve, Some(path), reason.as_deref());
                }
                Reply::with(
                    "reserve",
                    format!("Reserved {} path(s).", paths.len()),
                    json!({
                        "reserved": paths,
                        "total": record.reservations.len(),
                    }),
                )
            }
            Err(e) => registry_error("reserve", e),
        }
    }

    pub(crate) fn handle_release(&self, paths: Option<Vec<String>>) -> Reply {
        let name = match self.require_name_swarm("release") {
            Ok(name) => name,
            Err(reply) => return *reply,
        };
        let result = reserve::release(&self.registry, &name, paths.as_deref());
        match result {
            Ok(removed) => {
                match &paths {
                    Some(paths) => {
                        for path in paths {
                            self.feed_event(FeedKind::Release, Some(path), None);
                        }
                    }
                    None => self.feed_event(FeedKind::Release, None, None),
                }
                Reply::with(
                    "release",
                    format!("Released {removed} reservation(s)."),
                    json!({ "released": removed }),
                )
            }
            Err(e) => registry_error("release", e),
        }
    }

    /// The write-enforcement hook: who blocks a write to `path`?
    pub fn conflicts_for(&self, path: &str) -> Vec<pim_mesh::ReservationConflict> {
        let name = self.name().unwrap_or_default();
        reserve::conflicts_with_other_agents(&self.registry, &name, path)
    }

    pub(crate) fn handle_swarm(&self, spec: Option<String>) -> Reply {
        let (claims, completions) = self.claims.view();
        let spec = spec.map(|s| self.canonical_spec(&s));

        let filter = |table_spec: &str| spec.as_deref().is_none_or(|s| s == table_spec);
        let claim_rows: Vec<_> = claims
            .0
            .iter()
            .filter(|(s, _)| filter(s))
            .flat_map(|(s, tasks)| {
                tasks.iter().map(move |(task, claim)| {
                    json!({
                        "spec": s,
                        "taskId": task,
                        "agent": claim.agent,
                        "claimedAt": claim.claimed_at,
                    })
                })
            })
            .collect();
        let completion_rows: Vec<_> = completions
            .0
            .iter()
            .filter(|(s, _)| filter(s))
            .flat_map(|(s, tasks)| {
                tasks.iter().map(move |(task, done)| {
                    json!({
                        "spec": s,
                        "taskId": task,
                        "completedBy": done.completed_by,
                        "completedAt": done.completed_at,
                    })
                })
            })
            .collect();

        Reply::with(
            "swarm",
            format!(
                "{} claim(s), {} completion(s).",
                claim_rows.len(),
                completion_rows.len(),
            ),
            json!({ "claims": claim_rows, "completions": completion_rows }),
        )
    }

    pub(crate) async fn handle_claim(
        &self,
        task_id: &str,
        spec: Option<String>,
        reason: Option<String>,
    ) -> Reply {
        if self.require_name_swarm("claim").is_err() {
            return Reply::error("claim", "not_registered", "join the mesh first");
        }
        let spec = match self.require_spec("claim", spec.as_deref()) {
            Ok(spec) => spec,
            Err(reply) => return *reply,
        };
        let Some(claimant) = self.claimant() else {
            return Reply::error("claim", "not_registered", "join the mesh first");
        };
        match self.claims.claim(&spec, task_id, &claimant, reason).await {
            Ok(claim) => {
                self.feed_event(FeedKind::TaskStart, Some(task_id), None);
                Reply::with(
                    "claim",
                    format!("Claimed {task_id}."),
                    json!({ "spec": spec, "taskId": task_id, "claimedAt": claim.claimed_at }),
                )
            }
            Err(e) => claim_error("claim", e),
        }
    }

    pub(crate) async fn handle_unclaim(&self, task_id: &str, spec: Option<String>) -> Reply {
        let name = match self.require_name_swarm("unclaim") {
            Ok(name) => name,
            Err(reply) => return *reply,
        };
        let spec = match self.require_spec("unclaim", spec.as_deref()) {
            Ok(spec) => spec,
            Err(reply) => return *reply,
        };
        match self.claims.unclaim(&spec, task_id, &name).await {
            Ok(()) => {
                self.feed_event(FeedKind::TaskReset, Some(task_id), None);
                Reply::with(
                    "unclaim",
                    format!("Unclaimed {task_id}."),
                    json!({ "spec": spec, "taskId": task_id }),
                )
            }
            Err(e) => claim_error("unclaim", e),
        }
    }

    pub(crate) async fn handle_complete(
        &self,
        task_id: &str,
        spec: Option<String>,
        notes: Option<String>,
    ) -> Reply {
        let name = match self.require_name_swarm("complete") {
            Ok(name) => name,
            Err(reply) => return *reply,
        };
        let spec = match self.require_spec("complete", spec.as_deref()) {
            Ok(spec) => spec,
            Err(reply) => return *reply,
        };
        match self.claims.complete(&spec, task_id, &name, notes).await {
            Ok(completion) => {
                self.feed_event(FeedKind::TaskDone, Some(task_id), None);
                Reply::with(
                    "complete",
                    format!("Completed {task_id}."),
                    json!({
                        "spec": spec,
                        "taskId": task_id,
                        "completedAt": completion.completed_at,
                    }),
                )
            }
            Err(e) => claim_error("complete", e),
        }
    }
}
