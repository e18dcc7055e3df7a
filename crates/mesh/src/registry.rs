// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Presence registry: join, discovery, rename
//!
//! One JSON file per agent under `B/registry/`. There is no server:
//! registration is write-then-read-back (first writer wins), liveness is a
//! signal-0 probe against the record's PID, and any reader may prune a
//! record whose process is gone.

use crate::names::NamePool;
use parking_lot::Mutex;
use pim_core::{validate_name, Clock, NameError, PresenceRecord, SessionId};
use pim_store::{
    atomic::{read_json, remove_quiet, write_json},
    lock::with_swarm_lock,
    proc::pid_alive,
    Layout, LockError,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Discovery results are cached this long.
pub const CACHE_TTL: Duration = Duration::from_secs(1);

/// Bounded retries for generated names before giving up.
pub const MAX_REGISTER_ATTEMPTS: u32 = 20;

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),
    #[error("name {0:?} is taken")]
    NameTaken(String),
    #[error("agent {0:?} is not registered")]
    NotRegistered(String),
    #[error("new name equals the current name")]
    SameName,
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything needed to join the mesh.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    /// Name forced via `PI_AGENT_NAME`; registration fails if taken.
    pub forced_name: Option<String>,
    pub session_id: SessionId,
    pub pid: u32,
    pub cwd: PathBuf,
    pub model: String,
    pub git_branch: Option<String>,
    pub spec: Option<String>,
    pub is_human: bool,
}

#[derive(Default)]
struct Cache {
    records: Vec<PresenceRecord>,
    fetched_at: Option<Instant>,
}

/// Handle over the registry directory.
#[derive(Clone)]
pub struct Registry<C: Clock> {
    layout: Layout,
    clock: C,
    scope_to_folder: bool,
    cwd: PathBuf,
    cache: Arc<Mutex<Cache>>,
}

impl<C: Clock> Registry<C> {
    pub fn new(layout: Layout, clock: C, cwd: PathBuf, scope_to_folder: bool) -> Self {
        Self {
            layout,
            clock,
            scope_to_folder,
            cwd,
            cache: Arc::new(Mutex::new(Cache::default())),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Join the mesh. Returns the written presence record.
    ///
    /// The race protocol: write the record, read it back, and check the
    /// session id. If the read-back shows another session, a peer won the
    /// name; generated names retry with the next candidate, a forced name
    /// fails with `NameTaken`.
    pub fn register(
        &self,
        request: &RegisterRequest,
        pool: &NamePool,
    ) -> Result<PresenceRecord, RegistryError> {
        let mut last_candidate = String::new();
        for attempt in 0..MAX_REGISTER_ATTEMPTS {
            let name = match &request.forced_name {
                Some(forced) => forced.clone(),
                None => pool.candidate(attempt),
            };
            validate_name(&name)?;
            last_candidate = name.clone();

            if let Some(existing) = self.read_live(&name) {
                if existing.session_id != request.session_id {
                    if request.forced_name.is_some() {
                        return Err(RegistryError::NameTaken(name));
                    }
                    continue;
                }
            }

            let mut record = PresenceRecord::new(
                name.clone(),
                request.pid,
                request.session_id.clone(),
                request.cwd.clone(),
                request.model.clone(),
                self.clock.timestamp(),
            );
            record.git_branch = request.git_branch.clone();
            record.spec = request.spec.clone();
            record.is_human = request.is_human;

            write_json(&self.layout.presence_path(&name), &record)?;

            let read_back: Option<PresenceRecord> = read_json(&self.layout.presence_path(&name));
            match read_back {
                Some(back) if back.session_id == request.session_id => {
                    std::fs::create_dir_all(self.layout.inbox_dir(&name))?;
                    self.invalidate_cache();
                    tracing::info!(name, pid = request.pid, "registered");
                    return Ok(record);
                }
                _ => {
                    tracing::debug!(name, attempt, "lost registration race");
                    if request.forced_name.is_some() {
                        return Err(RegistryError::NameTaken(name));
                    }
                }
            }
        }
        Err(RegistryError::NameTaken(last_candidate))
    }

    /// Leave the mesh: delete the presence record and the inbox directory.
    /// Claim cleanup is the caller's job (it needs the claims store).
    pub fn unregister(&self, name: &str) {
        remove_quiet(&self.layout.presence_path(name));
        let _ = std::fs::remove_dir_all(self.layout.inbox_dir(name));
        self.invalidate_cache();
        tracing::info!(name, "unregistered");
    }

    /// Change own name. Runs under the swarm lock so two agents cannot
    /// trade records for the same target name.
    pub async fn rename(
        &self,
        old: &str,
        new: &str,
        session_id: &SessionId,
    ) -> Result<PresenceRecord, RegistryError> {
        if old == new {
            return Err(RegistryError::SameName);
        }
        validate_name(new)?;

        let lock_path = self.layout.lock_path();
        let result = with_swarm_lock(&lock_path, None, || {
            if self.read_live(new).is_some() {
                return Err(RegistryError::NameTaken(new.to_string()));
            }
            let mut record: PresenceRecord = self
                .read_live(old)
                .ok_or_else(|| RegistryError::NotRegistered(old.to_string()))?;
            if record.session_id != *session_id {
                return Err(RegistryError::NotRegistered(old.to_string()));
            }

            record.name = new.to_string();
            write_json(&self.layout.presence_path(new), &record)?;
            remove_quiet(&self.layout.presence_path(old));

            let old_inbox = self.layout.inbox_dir(old);
            let new_inbox = self.layout.inbox_dir(new);
            if old_inbox.is_dir() {
                std::fs::rename(&old_inbox, &new_inbox)?;
            } else {
                std::fs::create_dir_all(&new_inbox)?;
            }
            Ok(record)
        })
        .await?;

        self.invalidate_cache();
        result
    }

    /// Active peers, served from a 1-second cache. Dead records observed
    /// during a refresh are pruned best-effort.
    pub fn active_agents(&self) -> Vec<PresenceRecord> {
        {
            let cache = self.cache.lock();
            if let Some(at) = cache.fetched_at {
                if self.clock.now().duration_since(at) < CACHE_TTL {
                    return self.scoped(cache.records.clone());
                }
            }
        }
        let records = self.scan();
        let mut cache = self.cache.lock();
        cache.records = records.clone();
        cache.fetched_at = Some(self.clock.now());
        drop(cache);
        self.scoped(records)
    }

    /// One agent's record, bypassing the cache. Prunes on dead PID.
    pub fn get(&self, name: &str) -> Option<PresenceRecord> {
        self.read_live(name)
    }

    /// Read-modify-write own presence record.
    pub fn update_own(
        &self,
        name: &str,
        f: impl FnOnce(&mut PresenceRecord),
    ) -> Result<PresenceRecord, RegistryError> {
        let path = self.layout.presence_path(name);
        let mut record: PresenceRecord = read_json(&path)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;
        f(&mut record);
        write_json(&path, &record)?;
        self.invalidate_cache();
        Ok(record)
    }

    pub fn invalidate_cache(&self) {
        self.cache.lock().fetched_at = None;
    }

    fn scoped(&self, records: Vec<PresenceRecord>) -> Vec<PresenceRecord> {
        if !self.scope_to_folder {
            return records;
        }
        records
            .into_iter()
            .filter(|r| r.cwd == self.cwd)
            .collect()
    }

    /// Read a record and probe its PID, pruning the file when dead.
    fn read_live(&self, name: &str) -> Option<PresenceRecord> {
        let path = self.layout.presence_path(name);
        let record: PresenceRecord = read_json(&path)?;
        if pid_alive(record.pid) {
            Some(record)
        } else {
            tracing::debug!(name, pid = record.pid, "pruning dead presence record");
            remove_quiet(&path);
            None
        }
    }

    fn scan(&self) -> Vec<PresenceRecord> {
        let dir = self.layout.registry_dir();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            let Some(record) = read_json::<PresenceRecord>(&path) else {
                continue;
            };
            if pid_alive(record.pid) {
                records.push(record);
            } else {
                tracing::debug!(path = %path.display(), "pruning dead presence record");
                remove_quiet(&path);
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
