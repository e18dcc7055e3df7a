// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The work loop: waves of ready tasks through worker processes
//!
//! Each wave computes the ready set, starts up to the configured
//! concurrency, and records the results. With review enabled, a reviewer
//! worker judges each result; only `SHIP` completes the task. A task that
//! keeps failing is auto-blocked once it reaches the attempt cap. The loop
//! ends when every task is done or blocked, or after the wave cap.

use crate::error::CrewError;
use crate::store::Crew;
use crate::worker::{run_all, WorkerAdapter, WorkerTask};
use pim_core::{Clock, CrewConfig, EpicId, Task, TaskId, TaskStatus};
use tokio_util::sync::CancellationToken;

/// Reviewer verdicts. The `VERDICT:` tag is authoritative; free text is
/// ignored, and a missing tag counts as `NeedsWork` so a mute reviewer can
/// never ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ship,
    NeedsWork,
    MajorRethink,
}

impl Verdict {
    /// Parse the last `VERDICT:` line of a reviewer's output.
    pub fn parse(output: &str) -> Option<Self> {
        output
            .lines()
            .rev()
            .find_map(|line| line.split_once("VERDICT:"))
            .and_then(|(_, tag)| match tag.trim() {
                "SHIP" => Some(Verdict::Ship),
                "NEEDS_WORK" => Some(Verdict::NeedsWork),
                "MAJOR_RETHINK" => Some(Verdict::MajorRethink),
                _ => None,
            })
    }
}

/// Knobs for one work run.
#[derive(Debug, Clone)]
pub struct WorkOptions {
    /// Worker concurrency; defaults to the configured crew worker count.
    pub concurrency: usize,
    /// Keep running waves until nothing is left (else stop after one).
    pub autonomous: bool,
    /// Run a reviewer over each worker result.
    pub review: bool,
}

impl WorkOptions {
    pub fn from_config(config: &CrewConfig) -> Self {
        Self {
            concurrency: config.workers,
            autonomous: false,
            review: false,
        }
    }
}

/// What a work run did.
#[derive(Debug, Default, Clone)]
pub struct WorkReport {
    pub waves: u32,
    pub completed: Vec<TaskId>,
    pub blocked: Vec<TaskId>,
    pub retried: Vec<TaskId>,
    pub cancelled: bool,
}

fn worker_prompt<C: Clock>(crew: &Crew<C>, task: &Task) -> String {
    let spec = crew.task_spec(&task.id).unwrap_or_default();
    format!(
        "You are working task {} of epic {}: {}\n\n{spec}\n\
         When finished, summarize what you changed.",
        task.id, task.epic_id, task.title,
    )
}

fn reviewer_prompt(task: &Task, output: &str) -> String {
    format!(
        "Review the following work on task {}: {}\n\n{output}\n\n\
         Reply with a line `VERDICT: SHIP`, `VERDICT: NEEDS_WORK`, or \
         `VERDICT: MAJOR_RETHINK`.",
        task.id, task.title,
    )
}

/// Run ready tasks in waves until done, blocked, cancelled, or capped.
pub async fn work<C: Clock, W: WorkerAdapter>(
    crew: &Crew<C>,
    adapter: &W,
    config: &CrewConfig,
    epic_id: &EpicId,
    options: WorkOptions,
    cancel: &CancellationToken,
) -> Result<WorkReport, CrewError> {
    crew.require_epic(epic_id)?;
    let mut report = WorkReport::default();

    while report.waves < config.max_waves {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let ready = crew.ready_tasks(epic_id);
        if ready.is_empty() {
            break;
        }
        report.waves += 1;
        let wave: Vec<Task> = ready.into_iter().take(options.concurrency.max(1)).collect();
        tracing::info!(epic = %epic_id, wave = report.waves, tasks = wave.len(), "wave starting");

        let mut worker_tasks = Vec::with_capacity(wave.len());
        for task in &wave {
            let agent = format!("crew-{}", task.id.number().unwrap_or(0));
            crew.start_task(&task.id, &agent)?;
            let mut worker = WorkerTask::new(agent.clone(), worker_prompt(crew, task));
            if config.artifacts_enabled {
                worker.artifacts_dir = Some(
                    crew.layout()
                        .artifacts_dir()
                        .join(epic_id.as_str())
                        .join(&agent),
                );
            }
            worker_tasks.push(worker);
        }

        let results = run_all(adapter, worker_tasks, options.concurrency, cancel).await;
        for (task, result) in wave.iter().zip(results) {
            let output = match result {
                Ok(output) if output.exit_ok => output,
                _ => {
                    retry_or_block(crew, config, &task.id, &mut report)?;
                    continue;
                }
            };

            let verdict = if options.review {
                let reviewer = WorkerTask::new(
                    format!("reviewer-{}", task.id.number().unwrap_or(0)),
                    reviewer_prompt(task, &output.output),
                );
                match adapter.run(reviewer, None, cancel.clone()).await {
                    Ok(review) if review.exit_ok => {
                        Verdict::parse(&review.output).unwrap_or(Verdict::NeedsWork)
                    }
                    _ => Verdict::NeedsWork,
                }
            } else {
                Verdict::Ship
            };

            match verdict {
                Verdict::Ship => {
                    let summary = output
                        .output
                        .lines()
                        .rev()
                        .find(|l| !l.trim().is_empty())
                        .unwrap_or("completed by crew")
                        .to_string();
                    crew.complete_task(&task.id, &summary, None)?;
                    report.completed.push(task.id.clone());
                }
                Verdict::NeedsWork | Verdict::MajorRethink => {
                    retry_or_block(crew, config, &task.id, &mut report)?;
                }
            }
        }

        if !options.autonomous {
            break;
        }
    }

    if report.cancelled {
        // Anything still marked in_progress was interrupted mid-wave.
        for task in crew.list_tasks(epic_id) {
            if task.status == TaskStatus::InProgress {
                crew.reset_task(&task.id, false)?;
            }
        }
    }
    Ok(report)
}

/// Put a failed task back to todo, or block it once attempts are spent.
fn retry_or_block<C: Clock>(
    crew: &Crew<C>,
    config: &CrewConfig,
    id: &TaskId,
    report: &mut WorkReport,
) -> Result<(), CrewError> {
    let task = crew.require_task(id)?;
    if task.attempt_count >= config.max_attempts_per_task {
        crew.block_task(
            id,
            &format!(
                "auto-blocked after {} failed attempt(s)",
                task.attempt_count
            ),
        )?;
        report.blocked.push(id.clone());
    } else {
        crew.reset_task(id, false)?;
        report.retried.push(id.clone());
    }
    Ok(())
}

#[cfg(test)]
#[path = "orchestrate_tests.rs"]
mod tests;
