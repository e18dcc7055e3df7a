// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Planning: scouts fan out, an analyst writes the task list
//!
//! `plan` creates an epic in `planning`, runs scout workers over the
//! target, hands their reports to a single analyst, and parses the
//! analyst's output into task blocks. Dependencies are declared by title
//! and resolved to task ids when the referenced title exists.

use crate::error::CrewError;
use crate::store::Crew;
use crate::worker::{run_all, WorkerAdapter, WorkerTask};
use pim_core::{Clock, CrewConfig, Epic, Task, TaskId};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// One task block parsed from analyst output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskBlock {
    pub title: String,
    pub depends_titles: Vec<String>,
    pub body: String,
}

/// Parse `## Task: <title>` blocks. Inside a block, a `Depends:` line
/// carries comma-separated titles; everything else is the task body.
pub fn parse_task_blocks(output: &str) -> Vec<TaskBlock> {
    let mut blocks: Vec<TaskBlock> = Vec::new();
    for line in output.lines() {
        if let Some(title) = line.strip_prefix("## Task:") {
            blocks.push(TaskBlock {
                title: title.trim().to_string(),
                depends_titles: Vec::new(),
                body: String::new(),
            });
            continue;
        }
        let Some(block) = blocks.last_mut() else {
            continue;
        };
        if let Some(deps) = line.strip_prefix("Depends:") {
            block.depends_titles.extend(
                deps.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            );
        } else {
            if !block.body.is_empty() {
                block.body.push('\n');
            }
            block.body.push_str(line);
        }
    }
    for block in &mut blocks {
        block.body = block.body.trim().to_string();
    }
    blocks.retain(|b| !b.title.is_empty());
    blocks
}

/// Result of a successful plan run.
#[derive(Debug)]
pub struct PlanOutcome {
    pub epic: Epic,
    pub tasks: Vec<Task>,
    pub scouts_run: usize,
}

fn scout_prompt(target: &str, index: usize, idea: bool) -> String {
    if idea {
        format!(
            "You are scout {index} for a new idea: {target}\n\
             Survey the codebase for the pieces this idea would touch and \
             report constraints, risks, and existing building blocks.",
        )
    } else {
        format!(
            "You are scout {index} for: {target}\n\
             Investigate the relevant code and report what exists today, \
             what is missing, and where the seams are.",
        )
    }
}

fn analyst_prompt(target: &str, reports: &[String]) -> String {
    format!(
        "You are the planning analyst for: {target}\n\n\
         Scout reports:\n{}\n\n\
         Produce the task list. Format each task as:\n\
         ## Task: <title>\n\
         Depends: <comma-separated titles, omit if none>\n\
         <task description>\n",
        reports.join("\n---\n"),
    )
}

/// Run the plan flow against `target`.
pub async fn plan<C: Clock, W: WorkerAdapter>(
    crew: &Crew<C>,
    adapter: &W,
    config: &CrewConfig,
    target: &str,
    idea: bool,
    cancel: &CancellationToken,
) -> Result<PlanOutcome, CrewError> {
    if config.scouts == 0 {
        return Err(CrewError::NoScouts);
    }
    let epic = crew.create_epic(target).await?;

    let artifacts = |agent: &str| {
        config
            .artifacts_enabled
            .then(|| crew.layout().artifacts_dir().join(epic.id.as_str()).join(agent))
    };

    let scout_tasks: Vec<WorkerTask> = (1..=config.scouts)
        .map(|i| {
            let name = format!("scout-{i}");
            let mut task = WorkerTask::new(name.clone(), scout_prompt(target, i, idea));
            task.artifacts_dir = artifacts(&name);
            task
        })
        .collect();
    let scouts_run = scout_tasks.len();
    let results = run_all(adapter, scout_tasks, config.scouts, cancel).await;
    if cancel.is_cancelled() {
        return Err(CrewError::Cancelled);
    }
    let reports: Vec<String> = results
        .into_iter()
        .filter_map(|r| r.ok())
        .filter(|o| o.exit_ok && !o.output.trim().is_empty())
        .map(|o| o.output)
        .collect();
    if reports.is_empty() {
        return Err(CrewError::GeneratorFailed);
    }

    let mut analyst = WorkerTask::new("analyst", analyst_prompt(target, &reports));
    analyst.artifacts_dir = artifacts("analyst");
    let analysis = match adapter.run(analyst, None, cancel.clone()).await {
        Ok(output) if output.exit_ok => output.output,
        _ => return Err(CrewError::AnalystFailed),
    };
    let blocks = parse_task_blocks(&analysis);
    if blocks.is_empty() {
        return Err(CrewError::AnalystFailed);
    }

    crew.set_epic_spec(&epic.id, &format!("# {target}\n\n{analysis}\n"))?;

    // Titles resolve case-insensitively; unresolved dependencies are
    // dropped rather than invented.
    let mut by_title: HashMap<String, TaskId> = HashMap::new();
    let mut tasks = Vec::new();
    for block in &blocks {
        let depends_on: Vec<TaskId> = block
            .depends_titles
            .iter()
            .filter_map(|t| by_title.get(&t.to_lowercase()).cloned())
            .collect();
        let task = crew
            .create_task(
                &epic.id,
                &block.title,
                (!block.body.is_empty()).then_some(block.body.as_str()),
                depends_on,
            )
            .await?;
        by_title.insert(block.title.to_lowercase(), task.id.clone());
        tasks.push(task);
    }

    let epic = crew.require_epic(&epic.id)?;
    tracing::info!(epic = %epic.id, tasks = tasks.len(), "plan complete");
    Ok(PlanOutcome {
        epic,
        tasks,
        scouts_run,
    })
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
