// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Swarm claim and completion tables
//!
//! `claims.json` maps `spec_path → task_id → Claim`; `completions.json` maps
//! `spec_path → task_id → Completion`. Invariants: at most one claim per
//! (spec, task); at most one claim per agent across the whole table; a
//! completion entry implies no matching claim entry.

use crate::id::SessionId;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An exclusive in-flight assertion that an agent is working a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub agent: String,
    pub session_id: SessionId,
    pub pid: u32,
    pub claimed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A permanent record that a (spec, task) pair was finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub completed_by: String,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The full claims table, keyed spec path → task id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimsTable(pub IndexMap<String, IndexMap<String, Claim>>);

impl ClaimsTable {
    pub fn get(&self, spec: &str, task: &str) -> Option<&Claim> {
        self.0.get(spec).and_then(|tasks| tasks.get(task))
    }

    pub fn insert(&mut self, spec: &str, task: &str, claim: Claim) {
        self.0
            .entry(spec.to_string())
            .or_default()
            .insert(task.to_string(), claim);
    }

    /// Remove a claim, dropping the spec bucket when it empties.
    pub fn remove(&mut self, spec: &str, task: &str) -> Option<Claim> {
        let tasks = self.0.get_mut(spec)?;
        let removed = tasks.shift_remove(task);
        if tasks.is_empty() {
            self.0.shift_remove(spec);
        }
        removed
    }

    /// The single claim held by `agent`, if any (one-in-flight rule).
    pub fn held_by(&self, agent: &str) -> Option<(&str, &str, &Claim)> {
        for (spec, tasks) in &self.0 {
            for (task, claim) in tasks {
                if claim.agent == agent {
                    return Some((spec.as_str(), task.as_str(), claim));
                }
            }
        }
        None
    }

    /// Drop claims whose owning process is gone. Returns true if anything
    /// was removed.
    pub fn prune_dead(&mut self, alive: impl Fn(u32) -> bool) -> bool {
        let mut changed = false;
        self.0.retain(|_, tasks| {
            tasks.retain(|_, claim| {
                let keep = alive(claim.pid);
                changed |= !keep;
                keep
            });
            !tasks.is_empty()
        });
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of claim entries.
    pub fn len(&self) -> usize {
        self.0.values().map(IndexMap::len).sum()
    }
}

/// The full completions table, keyed spec path → task id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionsTable(pub IndexMap<String, IndexMap<String, Completion>>);

impl CompletionsTable {
    pub fn get(&self, spec: &str, task: &str) -> Option<&Completion> {
        self.0.get(spec).and_then(|tasks| tasks.get(task))
    }

    pub fn insert(&mut self, spec: &str, task: &str, completion: Completion) {
        self.0
            .entry(spec.to_string())
            .or_default()
            .insert(task.to_string(), completion);
    }

    pub fn for_spec(&self, spec: &str) -> Option<&IndexMap<String, Completion>> {
        self.0.get(spec)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
#[path = "claim_tests.rs"]
mod tests;
