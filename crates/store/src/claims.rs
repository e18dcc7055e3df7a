// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claim/completion store guarded by the swarm lock
//!
//! Mutations are read-modify-write on `claims.json` and `completions.json`,
//! always inside the swarm lock. Reads outside the lock are advisory and
//! never written back; reads under the lock prune dead-PID claims and
//! persist the pruning.

use crate::atomic::{read_json, write_json};
use crate::layout::Layout;
use crate::lock::{with_swarm_lock, LockError};
use crate::proc::pid_alive;
use chrono::{DateTime, Utc};
use pim_core::{Claim, ClaimsTable, Clock, Completion, CompletionsTable, SessionId};
use std::io;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Identity of the process asking for a claim.
#[derive(Debug, Clone)]
pub struct Claimant {
    pub agent: String,
    pub session_id: SessionId,
    pub pid: u32,
}

/// Errors from claim operations
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("task already claimed by {agent}")]
    AlreadyClaimed {
        agent: String,
        claimed_at: DateTime<Utc>,
    },
    #[error("agent already holds a claim on {task_id}")]
    AlreadyHaveClaim { spec: String, task_id: String },
    #[error("task is not claimed")]
    NotClaimed,
    #[error("claim belongs to {agent}")]
    NotYourClaim { agent: String },
    #[error("task already completed by {completed_by}")]
    AlreadyCompleted {
        completed_by: String,
        completed_at: DateTime<Utc>,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Store over the shared claim and completion tables.
#[derive(Debug, Clone)]
pub struct ClaimsStore<C: Clock> {
    layout: Layout,
    clock: C,
}

impl<C: Clock> ClaimsStore<C> {
    pub fn new(layout: Layout, clock: C) -> Self {
        Self { layout, clock }
    }

    fn load_claims(&self) -> ClaimsTable {
        read_json(&self.layout.claims_path()).unwrap_or_default()
    }

    fn load_completions(&self) -> CompletionsTable {
        read_json(&self.layout.completions_path()).unwrap_or_default()
    }

    /// Advisory read of both tables, with dead claims dropped in memory.
    pub fn view(&self) -> (ClaimsTable, CompletionsTable) {
        let mut claims = self.load_claims();
        claims.prune_dead(pid_alive);
        (claims, self.load_completions())
    }

    /// Claim a (spec, task) pair for `claimant`.
    pub async fn claim(
        &self,
        spec: &str,
        task_id: &str,
        claimant: &Claimant,
        reason: Option<String>,
    ) -> Result<Claim, ClaimError> {
        let lock_path = self.layout.lock_path();
        let claims_path = self.layout.claims_path();
        with_swarm_lock(&lock_path, None, || {
            let mut claims = self.load_claims();
            let pruned = claims.prune_dead(pid_alive);

            if let Some(existing) = claims.get(spec, task_id) {
                let conflict = ClaimError::AlreadyClaimed {
                    agent: existing.agent.clone(),
                    claimed_at: existing.claimed_at,
                };
                if pruned {
                    write_json(&claims_path, &claims)?;
                }
                return Err(conflict);
            }
            if let Some((held_spec, held_task, _)) = claims.held_by(&claimant.agent) {
                let existing = ClaimError::AlreadyHaveClaim {
                    spec: held_spec.to_string(),
                    task_id: held_task.to_string(),
                };
                if pruned {
                    write_json(&claims_path, &claims)?;
                }
                return Err(existing);
            }

            let claim = Claim {
                agent: claimant.agent.clone(),
                session_id: claimant.session_id.clone(),
                pid: claimant.pid,
                claimed_at: self.clock.timestamp(),
                reason,
            };
            claims.insert(spec, task_id, claim.clone());
            write_json(&claims_path, &claims)?;
            Ok(claim)
        })
        .await?
    }

    /// Release a claim held by `agent`.
    pub async fn unclaim(&self, spec: &str, task_id: &str, agent: &str) -> Result<(), ClaimError> {
        let lock_path = self.layout.lock_path();
        let claims_path = self.layout.claims_path();
        with_swarm_lock(&lock_path, None, || {
            let mut claims = self.load_claims();
            let pruned = claims.prune_dead(pid_alive);

            let result = match claims.get(spec, task_id) {
                None => Err(ClaimError::NotClaimed),
                Some(claim) if claim.agent != agent => Err(ClaimError::NotYourClaim {
                    agent: claim.agent.clone(),
                }),
                Some(_) => {
                    claims.remove(spec, task_id);
                    Ok(())
                }
            };
            if result.is_ok() || pruned {
                write_json(&claims_path, &claims)?;
            }
            result
        })
        .await?
    }

    /// Complete a claimed task: first completer wins, permanently.
    pub async fn complete(
        &self,
        spec: &str,
        task_id: &str,
        agent: &str,
        notes: Option<String>,
    ) -> Result<Completion, ClaimError> {
        let lock_path = self.layout.lock_path();
        let claims_path = self.layout.claims_path();
        let completions_path = self.layout.completions_path();
        with_swarm_lock(&lock_path, None, || {
            let mut claims = self.load_claims();
            let pruned = claims.prune_dead(pid_alive);
            let mut completions = self.load_completions();

            let result = if let Some(done) = completions.get(spec, task_id) {
                Err(ClaimError::AlreadyCompleted {
                    completed_by: done.completed_by.clone(),
                    completed_at: done.completed_at,
                })
            } else {
                match claims.get(spec, task_id) {
                    None => Err(ClaimError::NotClaimed),
                    Some(claim) if claim.agent != agent => Err(ClaimError::NotYourClaim {
                        agent: claim.agent.clone(),
                    }),
                    Some(_) => {
                        claims.remove(spec, task_id);
                        let completion = Completion {
                            completed_by: agent.to_string(),
                            completed_at: self.clock.timestamp(),
                            notes,
                        };
                        completions.insert(spec, task_id, completion.clone());
                        Ok(completion)
                    }
                }
            };

            if result.is_ok() || pruned {
                write_json(&claims_path, &claims)?;
            }
            if result.is_ok() {
                write_json(&completions_path, &completions)?;
            }
            result
        })
        .await?
    }

    /// Drop every claim owned by `agent` (used on unregister). Returns the
    /// number removed.
    pub async fn release_agent(
        &self,
        agent: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<usize, ClaimError> {
        let lock_path = self.layout.lock_path();
        let claims_path = self.layout.claims_path();
        with_swarm_lock(&lock_path, cancel, || {
            let mut claims = self.load_claims();
            let before = claims.len();
            claims.prune_dead(pid_alive);
            while let Some((spec, task, _)) = claims.held_by(agent) {
                let spec = spec.to_string();
                let task = task.to_string();
                claims.remove(&spec, &task);
            }
            let removed = before.saturating_sub(claims.len());
            if removed > 0 {
                write_json(&claims_path, &claims)?;
            }
            Ok(removed)
        })
        .await?
    }
}

#[cfg(test)]
#[path = "claims_tests.rs"]
mod tests;
