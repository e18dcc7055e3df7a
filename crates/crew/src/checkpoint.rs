// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epic checkpoints
//!
//! A checkpoint is one JSON file freezing the epic record, every task
//! record, the epic spec, and each task spec. Save is last-writer-wins;
//! restore rewrites each file atomically. Restore under concurrent
//! mutation yields a mixed but file-consistent state, which is why the
//! operation is presented as destructive.

use crate::error::CrewError;
use crate::store::{json_files, Crew};
use chrono::{DateTime, Utc};
use pim_core::{Clock, Epic, EpicId, Task, TaskStatus};
use pim_store::atomic::{read_json, remove_quiet, write_json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frozen epic state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: EpicId,
    pub created_at: DateTime<Utc>,
    pub epic: Epic,
    pub tasks: Vec<Task>,
    pub epic_spec: String,
    /// Task spec bodies keyed by task id.
    pub task_specs: BTreeMap<String, String>,
}

/// Listing entry for the checkpoints directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointInfo {
    pub id: EpicId,
    pub created_at: DateTime<Utc>,
    pub task_count: usize,
}

impl<C: Clock> Crew<C> {
    /// Snapshot an epic into its checkpoint file.
    pub fn save_checkpoint(&self, id: &EpicId) -> Result<Checkpoint, CrewError> {
        let epic = self.require_epic(id)?;
        let tasks = self.list_tasks(id);
        let mut task_specs = BTreeMap::new();
        for task in &tasks {
            if let Some(spec) = self.task_spec(&task.id) {
                task_specs.insert(task.id.as_str().to_string(), spec);
            }
        }
        let checkpoint = Checkpoint {
            id: id.clone(),
            created_at: self.clock.timestamp(),
            epic,
            tasks,
            epic_spec: self.epic_spec(id).unwrap_or_default(),
            task_specs,
        };
        write_json(&self.layout.checkpoint_path(id), &checkpoint)?;
        tracing::info!(epic = %id, "checkpoint saved");
        Ok(checkpoint)
    }

    /// Restore an epic from its checkpoint. Tasks created after the
    /// snapshot are deleted so the epic matches the frozen state.
    pub fn restore_checkpoint(&self, id: &EpicId) -> Result<Checkpoint, CrewError> {
        let checkpoint: Checkpoint = read_json(&self.layout.checkpoint_path(id))
            .ok_or_else(|| CrewError::CheckpointNotFound(id.clone()))?;

        let snapshot_ids: Vec<_> = checkpoint.tasks.iter().map(|t| t.id.clone()).collect();
        for task in self.list_tasks(id) {
            if !snapshot_ids.contains(&task.id) {
                self.remove_task_files(&task.id);
            }
        }

        self.save_epic(&checkpoint.epic)?;
        self.save_epic_spec(id, &checkpoint.epic_spec)?;
        for task in &checkpoint.tasks {
            self.save_task(task)?;
            if let Some(spec) = checkpoint.task_specs.get(task.id.as_str()) {
                self.save_task_spec(&task.id, spec)?;
            }
            if task.status != TaskStatus::Blocked {
                self.remove_block(&task.id);
            }
        }
        tracing::info!(epic = %id, "checkpoint restored");
        Ok(checkpoint)
    }

    /// Delete an epic's checkpoint file.
    pub fn delete_checkpoint(&self, id: &EpicId) -> Result<(), CrewError> {
        let path = self.layout.checkpoint_path(id);
        if !path.exists() {
            return Err(CrewError::CheckpointNotFound(id.clone()));
        }
        remove_quiet(&path);
        Ok(())
    }

    /// All checkpoints on disk, sorted by epic number.
    pub fn list_checkpoints(&self) -> Vec<CheckpointInfo> {
        let mut infos: Vec<CheckpointInfo> = json_files(&self.layout.checkpoints_dir())
            .iter()
            .filter_map(|path| read_json::<Checkpoint>(path))
            .map(|c| CheckpointInfo {
                created_at: c.created_at,
                task_count: c.tasks.len(),
                id: c.id,
            })
            .collect();
        infos.sort_by_key(|i| i.id.number().unwrap_or(u64::MAX));
        infos
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
