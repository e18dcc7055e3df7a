// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epic lifecycle operations

use crate::error::CrewError;
use crate::store::{Crew, STUB_SPEC};
use pim_core::{Clock, Epic, EpicId, EpicStatus, TaskStatus};
use pim_store::lock::with_swarm_lock;
use rand::Rng;

fn suffix() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..3)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

impl<C: Clock> Crew<C> {
    /// Create an epic. Id allocation scans existing epics under the swarm
    /// lock so two agents cannot mint the same number.
    pub async fn create_epic(&self, title: &str) -> Result<Epic, CrewError> {
        let lock_path = self.layout.lock_path();
        let title = title.to_string();
        with_swarm_lock(&lock_path, None, || {
            let existing = self.list_epics();
            let n = EpicId::next_number(existing.iter().map(|e| &e.id));
            let id = EpicId::compose(n, &suffix());
            let epic = Epic::new(id.clone(), title.clone(), self.clock.timestamp());
            self.save_epic(&epic)?;
            self.save_epic_spec(&id, &format!("# {title}\n\n{STUB_SPEC}\n"))?;
            tracing::info!(epic = %id, title, "epic created");
            Ok(epic)
        })
        .await?
    }

    /// Read-modify-write an epic, touching `updated_at`.
    pub fn update_epic(
        &self,
        id: &EpicId,
        f: impl FnOnce(&mut Epic),
    ) -> Result<Epic, CrewError> {
        let mut epic = self.require_epic(id)?;
        f(&mut epic);
        epic.updated_at = self.clock.timestamp();
        self.save_epic(&epic)?;
        Ok(epic)
    }

    /// Replace the epic's spec text.
    pub fn set_epic_spec(&self, id: &EpicId, content: &str) -> Result<(), CrewError> {
        self.require_epic(id)?;
        self.save_epic_spec(id, content)?;
        self.update_epic(id, |_| {})?;
        Ok(())
    }

    /// Close an epic: every task must be done.
    pub fn close_epic(&self, id: &EpicId) -> Result<Epic, CrewError> {
        let epic = self.require_epic(id)?;
        let tasks = self.list_tasks(&epic.id);
        let remaining = tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Done)
            .count() as u32;
        if remaining > 0 {
            return Err(CrewError::IncompleteTasks { remaining });
        }
        let closed_at = self.clock.timestamp();
        self.update_epic(id, |epic| {
            epic.status = EpicStatus::Completed;
            epic.closed_at = Some(closed_at);
        })
    }

    fn task_counts(&self, id: &EpicId) -> (u32, u32) {
        let tasks = self.list_tasks(id);
        let done = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count() as u32;
        (tasks.len() as u32, done)
    }

    /// Recompute the denormalized counts from the task files and settle the
    /// epic status from them: everything done is completed, an empty epic
    /// is still planning, anything in between is active.
    pub(crate) fn reconcile_epic_counts(&self, id: &EpicId) -> Result<Epic, CrewError> {
        let (task_count, completed_count) = self.task_counts(id);
        self.update_epic(id, |epic| {
            epic.task_count = task_count;
            epic.completed_count = completed_count;
            epic.status = if task_count > 0 && completed_count == task_count {
                EpicStatus::Completed
            } else if task_count == 0 {
                EpicStatus::Planning
            } else {
                EpicStatus::Active
            };
        })
    }

    /// Counts only, status untouched. Tasks are created during the
    /// planning phase, and adding one must not flip the epic active by
    /// itself.
    pub(crate) fn refresh_epic_counts(&self, id: &EpicId) -> Result<Epic, CrewError> {
        let (task_count, completed_count) = self.task_counts(id);
        self.update_epic(id, |epic| {
            epic.task_count = task_count;
            epic.completed_count = completed_count;
        })
    }
}

#[cfg(test)]
#[path = "epics_tests.rs"]
mod tests;
