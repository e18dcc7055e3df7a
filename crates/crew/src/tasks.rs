// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task lifecycle operations
//!
//! The state machine: `todo → in_progress → done`, with `blocked` reachable
//! from todo/in_progress and `reset` returning any task to todo. Epic
//! counts are recomputed from the task files after every transition, which
//! keeps the denormalized counters honest even if a peer crashed mid-write.

use crate::error::CrewError;
use crate::store::{Crew, STUB_SPEC};
use pim_core::{Clock, Epic, EpicId, Evidence, Task, TaskId, TaskStatus};
use pim_store::lock::with_swarm_lock;
use std::process::Command;

impl<C: Clock> Crew<C> {
    /// Create a task under an epic. Id allocation runs inside the swarm
    /// lock, like epic creation.
    pub async fn create_task(
        &self,
        epic_id: &EpicId,
        title: &str,
        description: Option<&str>,
        depends_on: Vec<TaskId>,
    ) -> Result<Task, CrewError> {
        let lock_path = self.layout.lock_path();
        with_swarm_lock(&lock_path, None, || {
            self.require_epic(epic_id)?;
            let existing = self.list_tasks(epic_id);
            let m = TaskId::next_number(existing.iter().map(|t| &t.id));
            let id = TaskId::compose(epic_id, m);
            let task = Task::new(
                id.clone(),
                epic_id.clone(),
                title,
                depends_on,
                self.clock.timestamp(),
            );
            self.save_task(&task)?;
            let body = description.unwrap_or(STUB_SPEC);
            self.save_task_spec(&id, &format!("# {title}\n\n{body}\n"))?;
            self.refresh_epic_counts(epic_id)?;
            tracing::info!(task = %id, title, "task created");
            Ok(task)
        })
        .await?
    }

    /// Start a task: only valid from `todo`.
    pub fn start_task(&self, id: &TaskId, agent: &str) -> Result<Task, CrewError> {
        let mut task = self.require_task(id)?;
        if task.status != TaskStatus::Todo {
            return Err(CrewError::InvalidTransition {
                status: task.status,
                expected: "todo",
            });
        }
        task.status = TaskStatus::InProgress;
        task.started_at = Some(self.clock.timestamp());
        task.updated_at = self.clock.timestamp();
        task.assigned_to = Some(agent.to_string());
        task.attempt_count += 1;
        task.base_commit = self.git_head();
        self.save_task(&task)?;
        self.reconcile_epic_counts(&task.epic_id)?;
        Ok(task)
    }

    /// Complete a task: only valid from `in_progress`.
    pub fn complete_task(
        &self,
        id: &TaskId,
        summary: &str,
        evidence: Option<Evidence>,
    ) -> Result<(Task, Epic), CrewError> {
        let mut task = self.require_task(id)?;
        if task.status != TaskStatus::InProgress {
            return Err(CrewError::InvalidTransition {
                status: task.status,
                expected: "in_progress",
            });
        }
        task.status = TaskStatus::Done;
        task.completed_at = Some(self.clock.timestamp());
        task.updated_at = self.clock.timestamp();
        task.assigned_to = None;
        task.summary = Some(summary.to_string());
        task.evidence = evidence;
        self.save_task(&task)?;
        let epic = self.reconcile_epic_counts(&task.epic_id)?;
        tracing::info!(task = %id, "task done");
        Ok((task, epic))
    }

    /// Block a task, writing its block context file.
    pub fn block_task(&self, id: &TaskId, reason: &str) -> Result<Task, CrewError> {
        let mut task = self.require_task(id)?;
        if matches!(task.status, TaskStatus::Done | TaskStatus::Blocked) {
            return Err(CrewError::InvalidTransition {
                status: task.status,
                expected: "todo or in_progress",
            });
        }
        task.status = TaskStatus::Blocked;
        task.blocked_reason = Some(reason.to_string());
        task.assigned_to = None;
        task.updated_at = self.clock.timestamp();
        self.save_task(&task)?;
        self.save_block(
            id,
            &format!(
                "# Blocked: {}\n\n{reason}\n\nBlocked at {}\n",
                task.title,
                self.clock.timestamp().to_rfc3339(),
            ),
        )?;
        self.reconcile_epic_counts(&task.epic_id)?;
        Ok(task)
    }

    /// Unblock a task: only valid from `blocked`. Returns it to `todo`.
    pub fn unblock_task(&self, id: &TaskId) -> Result<Task, CrewError> {
        let mut task = self.require_task(id)?;
        if task.status != TaskStatus::Blocked {
            return Err(CrewError::InvalidTransition {
                status: task.status,
                expected: "blocked",
            });
        }
        task.status = TaskStatus::Todo;
        task.blocked_reason = None;
        task.updated_at = self.clock.timestamp();
        self.save_task(&task)?;
        self.remove_block(id);
        self.reconcile_epic_counts(&task.epic_id)?;
        Ok(task)
    }

    /// Reset a task to a fresh `todo`. With `cascade`, every task depending
    /// on it (transitively) that has left `todo` is reset too.
    pub fn reset_task(&self, id: &TaskId, cascade: bool) -> Result<Vec<TaskId>, CrewError> {
        let task = self.require_task(id)?;
        let epic_id = task.epic_id.clone();
        let mut reset = Vec::new();
        self.reset_one(&task, &mut reset)?;

        if cascade {
            // Walk dependents transitively; the visited set keeps a cyclic
            // graph from looping.
            let tasks = self.list_tasks(&epic_id);
            let mut visited: std::collections::HashSet<TaskId> = [id.clone()].into();
            let mut frontier = vec![id.clone()];
            while let Some(current) = frontier.pop() {
                for dependent in tasks.iter().filter(|t| t.depends_on.contains(&current)) {
                    if !visited.insert(dependent.id.clone()) {
                        continue;
                    }
                    let fresh = self.require_task(&dependent.id)?;
                    if fresh.status != TaskStatus::Todo {
                        self.reset_one(&fresh, &mut reset)?;
                    }
                    frontier.push(dependent.id.clone());
                }
            }
        }
        self.reconcile_epic_counts(&epic_id)?;
        Ok(reset)
    }

    fn reset_one(&self, task: &Task, reset: &mut Vec<TaskId>) -> Result<(), CrewError> {
        let mut fresh = task.clone();
        fresh.clear_execution_state();
        fresh.updated_at = self.clock.timestamp();
        self.save_task(&fresh)?;
        self.remove_block(&fresh.id);
        reset.push(fresh.id.clone());
        Ok(())
    }

    /// Tasks eligible to run: status `todo` with every dependency `done`.
    /// Unknown dependency ids never count as done.
    pub fn ready_tasks(&self, epic_id: &EpicId) -> Vec<Task> {
        let tasks = self.list_tasks(epic_id);
        tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Todo)
            .filter(|t| {
                t.depends_on.iter().all(|dep| {
                    tasks
                        .iter()
                        .any(|d| d.id == *dep && d.status == TaskStatus::Done)
                })
            })
            .cloned()
            .collect()
    }

    /// Current git HEAD of the project, best effort.
    fn git_head(&self) -> Option<String> {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(self.project_root())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let head = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!head.is_empty()).then_some(head)
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
