// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for the crew epic/task engine

use crate::reply::Reply;
use crate::session::MessengerSession;
use pim_core::{Clock, EpicId, FeedKind, TaskId};
use pim_crew::{plan, work, CrewError, Verdict, WorkOptions, WorkerAdapter, WorkerTask};
use serde_json::{json, Value};

fn crew_error(mode: &str, err: CrewError) -> Reply {
    match err {
        CrewError::EpicNotFound(id) => {
            Reply::error(mode, "not_found", format!("no epic {id}"))
        }
        CrewError::TaskNotFound(id) => {
            Reply::error(mode, "not_found", format!("no task {id}"))
        }
        CrewError::IncompleteTasks { remaining } => Reply::error_with(
            mode,
            "incomplete_tasks",
            format!("{remaining} task(s) are not done"),
            json!({ "remaining": remaining }),
        ),
        CrewError::InvalidTransition { status, expected } => Reply::error(
            mode,
            "invalid_transition",
            format!("task is {status}, expected {expected}"),
        ),
        CrewError::CheckpointNotFound(id) => {
            Reply::error(mode, "not_found", format!("no checkpoint for {id}"))
        }
        CrewError::NoScouts => Reply::error(mode, "no_scouts", "no scout workers configured"),
        CrewError::GeneratorFailed => {
            Reply::error(mode, "generator_failed", "every scout failed")
        }
        CrewError::AnalystFailed => {
            Reply::error(mode, "analyst_failed", "the analyst produced no tasks")
        }
        CrewError::Cancelled => Reply::error(mode, "cancelled", "the run was cancelled"),
        CrewError::Lock(e) => Reply::error(mode, "lock_timeout", e.to_string()),
        CrewError::Io(e) => Reply::error(mode, "io", e.to_string()),
    }
}

fn epic_json(epic: &pim_core::Epic) -> Value {
    serde_json::to_value(epic).unwrap_or_default()
}

fn task_json(task: &pim_core::Task) -> Value {
    serde_json::to_value(task).unwrap_or_default()
}

impl<C: Clock + 'static, W: WorkerAdapter> MessengerSession<C, W> {
    pub(crate) async fn handle_epic_create(&self, title: &str) -> Reply {
        match self.crew.create_epic(title).await {
            Ok(epic) => Reply::with(
                "epic.create",
                format!("Created epic {} — {title}.", epic.id),
                json!({ "epic": epic_json(&epic) }),
            ),
            Err(e) => crew_error("epic.create", e),
        }
    }

    pub(crate) fn handle_epic_show(&self, id: &str) -> Reply {
        let id = EpicId::new(id);
        let Some(epic) = self.crew.load_epic(&id) else {
            return Reply::error("epic.show", "not_found", format!("no epic {id}"));
        };
        let tasks = self.crew.list_tasks(&id);
        let spec = self.crew.epic_spec(&id).unwrap_or_default();
        Reply::with(
            "epic.show",
            format!(
                "{} — {} [{}] {}/{} done",
                epic.id, epic.title, epic.status, epic.completed_count, epic.task_count,
            ),
            json!({
                "epic": epic_json(&epic),
                "tasks": tasks.iter().map(task_json).collect::<Vec<_>>(),
                "spec": spec,
            }),
        )
    }

    pub(crate) fn handle_epic_list(&self) -> Reply {
        let epics = self.crew.list_epics();
        let text = if epics.is_empty() {
            "No epics.".to_string()
        } else {
            epics
                .iter()
                .map(|e| {
                    format!(
                        "{} [{}] {}/{} — {}",
                        e.id, e.status, e.completed_count, e.task_count, e.title,
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        Reply::with(
            "epic.list",
            text,
            json!({ "epics": epics.iter().map(epic_json).collect::<Vec<_>>() }),
        )
    }

    pub(crate) fn handle_epic_close(&self, id: &str) -> Reply {
        match self.crew.close_epic(&EpicId::new(id)) {
            Ok(epic) => Reply::with(
                "epic.close",
                format!("Closed epic {}.", epic.id),
                json!({ "epic": epic_json(&epic) }),
            ),
            Err(e) => crew_error("epic.close", e),
        }
    }

    pub(crate) fn handle_epic_set_spec(&self, id: &str, content: &str) -> Reply {
        let id = EpicId::new(id);
        match self.crew.set_epic_spec(&id, content) {
            Ok(()) => Reply::with(
                "epic.set_spec",
                format!("Spec updated for {id}."),
                json!({ "id": id }),
            ),
            Err(e) => crew_error("epic.set_spec", e),
        }
    }

    pub(crate) async fn handle_task_create(
        &self,
        epic: &str,
        title: &str,
        description: Option<String>,
        depends_on: Vec<String>,
    ) -> Reply {
        let epic = EpicId::new(epic);
        let depends_on = depends_on.into_iter().map(TaskId::new).collect();
        match self
            .crew
            .create_task(&epic, title, description.as_deref(), depends_on)
            .await
        {
            Ok(task) => Reply::with(
                "task.create",
                format!("Created task {} — {title}.", task.id),
                json!({ "task": task_json(&task) }),
            ),
            Err(e) => crew_error("task.create", e),
        }
    }

    pub(crate) fn handle_task_show(&self, id: &str) -> Reply {
        let id = TaskId::new(id);
        let Some(task) = self.crew.load_task(&id) else {
            return Reply::error("task.show", "not_found", format!("no task {id}"));
        };
        let spec = self.crew.task_spec(&id).unwrap_or_default();
        let block = self.crew.block_context(&id);
        Reply::with(
            "task.show",
            format!("{} — {} [{}]", task.id, task.title, task.status),
            json!({ "task": task_json(&task), "spec": spec, "block": block }),
        )
    }

    pub(crate) fn handle_task_list(&self, epic: Option<String>) -> Reply {
        let epics = match epic {
            Some(id) => vec![EpicId::new(id)],
            None => self.crew.list_epics().into_iter().map(|e| e.id).collect(),
        };
        let mut tasks = Vec::new();
        for epic in &epics {
            tasks.extend(self.crew.list_tasks(epic));
        }
        let text = if tasks.is_empty() {
            "No tasks.".to_string()
        } else {
            tasks
                .iter()
                .map(|t| format!("{} [{}] — {}", t.id, t.status, t.title))
                .collect::<Vec<_>>()
                .join("\n")
        };
        Reply::with(
            "task.list",
            text,
            json!({ "tasks": tasks.iter().map(task_json).collect::<Vec<_>>() }),
        )
    }

    pub(crate) fn handle_task_start(&self, id: &str) -> Reply {
        let agent = self.name().unwrap_or_else(|| "local".to_string());
        match self.crew.start_task(&TaskId::new(id), &agent) {
            Ok(task) => {
                self.feed_event(FeedKind::TaskStart, Some(id), Some(&task.title));
                Reply::with(
                    "task.start",
                    format!("Started {id}."),
                    json!({ "task": task_json(&task) }),
                )
            }
            Err(e) => crew_error("task.start", e),
        }
    }

    pub(crate) fn handle_task_done(&self, id: &str, summary: Option<String>) -> Reply {
        let summary = summary.unwrap_or_else(|| "completed".to_string());
        match self.crew.complete_task(&TaskId::new(id), &summary, None) {
            Ok((task, epic)) => {
                self.feed_event(FeedKind::TaskDone, Some(id), Some(&task.title));
                Reply::with(
                    "task.done",
                    format!(
                        "Completed {id}. Epic {}/{} done.",
                        epic.completed_count, epic.task_count,
                    ),
                    json!({ "task": task_json(&task), "epic": epic_json(&epic) }),
                )
            }
            Err(e) => crew_error("task.done", e),
        }
    }

    pub(crate) fn handle_task_block(&self, id: &str, reason: &str) -> Reply {
        match self.crew.block_task(&TaskId::new(id), reason) {
            Ok(task) => {
                self.feed_event(FeedKind::TaskBlock, Some(id), Some(reason));
                Reply::with(
                    "task.block",
                    format!("Blocked {id}: {reason}"),
                    json!({ "task": task_json(&task) }),
                )
            }
            Err(e) => crew_error("task.block", e),
        }
    }

    pub(crate) fn handle_task_unblock(&self, id: &str) -> Reply {
        match self.crew.unblock_task(&TaskId::new(id)) {
            Ok(task) => {
                self.feed_event(FeedKind::TaskUnblock, Some(id), None);
                Reply::with(
                    "task.unblock",
                    format!("Unblocked {id}."),
                    json!({ "task": task_json(&task) }),
                )
            }
            Err(e) => crew_error("task.unblock", e),
        }
    }

    pub(crate) fn handle_task_ready(&self, epic: &str) -> Reply {
        let epic = EpicId::new(epic);
        if self.crew.load_epic(&epic).is_none() {
            return Reply::error("task.ready", "not_found", format!("no epic {epic}"));
        }
        let ready = self.crew.ready_tasks(&epic);
        let text = if ready.is_empty() {
            "No tasks are ready.".to_string()
        } else {
            ready
                .iter()
                .map(|t| format!("{} — {}", t.id, t.title))
                .collect::<Vec<_>>()
                .join("\n")
        };
        Reply::with(
            "task.ready",
            text,
            json!({ "ready": ready.iter().map(task_json).collect::<Vec<_>>() }),
        )
    }

    pub(crate) fn handle_task_reset(&self, id: &str, cascade: bool) -> Reply {
        match self.crew.reset_task(&TaskId::new(id), cascade) {
            Ok(reset) => {
                self.feed_event(FeedKind::TaskReset, Some(id), None);
                Reply::with(
                    "task.reset",
                    format!("Reset {} task(s).", reset.len()),
                    json!({ "reset": reset }),
                )
            }
            Err(e) => crew_error("task.reset", e),
        }
    }

    pub(crate) async fn handle_plan(&self, target: &str, idea: bool) -> Reply {
        self.feed_event(FeedKind::PlanStart, Some(target), None);
        let result = plan(
            &self.crew,
            &self.adapter,
            &self.config.crew,
            target,
            idea,
            &self.cancel,
        )
        .await;
        match result {
            Ok(outcome) => {
                self.feed_event(FeedKind::PlanDone, Some(outcome.epic.id.as_str()), None);
                Reply::with(
                    "plan",
                    format!(
                        "Planned epic {} with {} task(s) from {} scout(s).",
                        outcome.epic.id,
                        outcome.tasks.len(),
                        outcome.scouts_run,
                    ),
                    json!({
                        "epic": epic_json(&outcome.epic),
                        "tasks": outcome.tasks.iter().map(task_json).collect::<Vec<_>>(),
                    }),
                )
            }
            Err(CrewError::Cancelled) => {
                self.feed_event(FeedKind::PlanCancel, Some(target), None);
                crew_error("plan", CrewError::Cancelled)
            }
            Err(e) => {
                self.feed_event(FeedKind::PlanFailed, Some(target), None);
                crew_error("plan", e)
            }
        }
    }

    pub(crate) async fn handle_work(
        &self,
        target: &str,
        autonomous: bool,
        concurrency: Option<usize>,
    ) -> Reply {
        let epic = EpicId::new(target);
        let mut options = WorkOptions::from_config(&self.config.crew);
        options.autonomous = autonomous;
        options.review = autonomous;
        if let Some(concurrency) = concurrency {
            options.concurrency = concurrency;
        }

        let result = work(
            &self.crew,
            &self.adapter,
            &self.config.crew,
            &epic,
            options,
            &self.cancel,
        )
        .await;
        match result {
            Ok(report) => Reply::with(
                "work",
                format!(
                    "{} wave(s): {} completed, {} blocked, {} retried{}.",
                    report.waves,
                    report.completed.len(),
                    report.blocked.len(),
                    report.retried.len(),
                    if report.cancelled { ", cancelled" } else { "" },
                ),
                json!({
                    "waves": report.waves,
                    "completed": report.completed,
                    "blocked": report.blocked,
                    "retried": report.retried,
                    "cancelled": report.cancelled,
                }),
            ),
            Err(e) => crew_error("work", e),
        }
    }

    pub(crate) async fn handle_review(&self, target: &str, review_type: Option<String>) -> Reply {
        let epic = EpicId::new(target);
        let Some(record) = self.crew.load_epic(&epic) else {
            return Reply::error("review", "not_found", format!("no epic {target}"));
        };
        let review_type = review_type.unwrap_or_else(|| "impl".to_string());
        let spec = self.crew.epic_spec(&epic).unwrap_or_default();
        let tasks = self.crew.list_tasks(&epic);
        let summary: String = tasks
            .iter()
            .map(|t| {
                format!(
                    "- {} [{}] {}\n",
                    t.id,
                    t.status,
                    t.summary.as_deref().unwrap_or(""),
                )
            })
            .collect();
        let prompt = format!(
            "Review the {review_type} state of epic {} — {}.\n\nSpec:\n{spec}\n\nTasks:\n{summary}\n\
             Reply with a line `VERDICT: SHIP`, `VERDICT: NEEDS_WORK`, or `VERDICT: MAJOR_RETHINK`.",
            record.id, record.title,
        );

        let worker = WorkerTask::new(format!("reviewer-{review_type}"), prompt);
        let verdict = match self.adapter.run(worker, None, self.cancel.clone()).await {
            Ok(output) if output.exit_ok => {
                Verdict::parse(&output.output).unwrap_or(Verdict::NeedsWork)
            }
            _ => return Reply::error("review", "generator_failed", "reviewer did not finish"),
        };
        let tag = match verdict {
            Verdict::Ship => "SHIP",
            Verdict::NeedsWork => "NEEDS_WORK",
            Verdict::MajorRethink => "MAJOR_RETHINK",
        };
        self.feed_event(
            FeedKind::Other("review.done".to_string()),
            Some(target),
            Some(tag),
        );
        Reply::with(
            "review",
            format!("Review verdict for {target}: {tag}."),
            json!({ "verdict": tag, "type": review_type }),
        )
    }

    pub(crate) fn handle_checkpoint_save(&self, id: Option<String>) -> Reply {
        let epics = match id {
            Some(id) => vec![EpicId::new(id)],
            None => self.crew.list_epics().into_iter().map(|e| e.id).collect(),
        };
        if epics.is_empty() {
            return Reply::error("checkpoint.save", "not_found", "no epics to snapshot");
        }
        let mut saved = Vec::new();
        for epic in &epics {
            match self.crew.save_checkpoint(epic) {
                Ok(_) => saved.push(epic.clone()),
                Err(e) => return crew_error("checkpoint.save", e),
            }
        }
        Reply::with(
            "checkpoint.save",
            format!("Saved {} checkpoint(s).", saved.len()),
            json!({ "saved": saved }),
        )
    }

    pub(crate) fn handle_checkpoint_restore(&self, id: &str) -> Reply {
        match self.crew.restore_checkpoint(&EpicId::new(id)) {
            Ok(checkpoint) => Reply::with(
                "checkpoint.restore",
                format!(
                    "Restored {id} to its snapshot from {}. Current state replaced.",
                    checkpoint.created_at,
                ),
                json!({ "id": id, "createdAt": checkpoint.created_at }),
            ),
            Err(e) => crew_error("checkpoint.restore", e),
        }
    }

    pub(crate) fn handle_checkpoint_delete(&self, id: &str) -> Reply {
        match self.crew.delete_checkpoint(&EpicId::new(id)) {
            Ok(()) => Reply::ok("checkpoint.delete", format!("Deleted checkpoint for {id}.")),
            Err(e) => crew_error("checkpoint.delete", e),
        }
    }

    pub(crate) fn handle_checkpoint_list(&self) -> Reply {
        let checkpoints = self.crew.list_checkpoints();
        let text = if checkpoints.is_empty() {
            "No checkpoints.".to_string()
        } else {
            checkpoints
                .iter()
                .map(|c| format!("{} — {} task(s), saved {}", c.id, c.task_count, c.created_at))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let rows: Vec<Value> = checkpoints
            .iter()
            .map(|c| json!({ "id": c.id, "createdAt": c.created_at, "tasks": c.task_count }))
            .collect();
        Reply::with("checkpoint.list", text, json!({ "checkpoints": rows }))
    }

    pub(crate) fn handle_crew_status(&self) -> Reply {
        let epics = self.crew.list_epics();
        let active = epics
            .iter()
            .filter(|e| {
                matches!(
                    e.status,
                    pim_core::EpicStatus::Planning | pim_core::EpicStatus::Active,
                )
            })
            .count();
        Reply::with(
            "crew.status",
            format!("{} epic(s), {active} open.", epics.len()),
            json!({
                "epics": epics.len(),
                "open": active,
            }),
        )
    }

    pub(crate) fn handle_crew_validate(&self, id: Option<String>) -> Reply {
        let epics = match id {
            Some(id) => vec![EpicId::new(id)],
            None => self.crew.list_epics().into_iter().map(|e| e.id).collect(),
        };
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for epic in &epics {
            match self.crew.validate_epic(epic) {
                Ok(report) => {
                    errors.extend(report.errors);
                    warnings.extend(report.warnings);
                }
                Err(e) => return crew_error("crew.validate", e),
            }
        }

        if errors.is_empty() && warnings.is_empty() {
            return Reply::with(
                "crew.validate",
                "All epics are consistent.",
                json!({ "errors": [], "warnings": [] }),
            );
        }
        let kind = errors.iter().find_map(|e| {
            if e.contains("circular") {
                Some("circular_dependency")
            } else if e.contains("unknown task") {
                Some("orphan_dependency")
            } else {
                None
            }
        });
        let text = errors
            .iter()
            .map(|e| format!("error: {e}"))
            .chain(warnings.iter().map(|w| format!("warning: {w}")))
            .collect::<Vec<_>>()
            .join("\n");
        match kind {
            Some(kind) => Reply::error_with(
                "crew.validate",
                kind,
                text,
                json!({ "errors": errors, "warnings": warnings }),
            ),
            None => Reply::with(
                "crew.validate",
                format!("Warning: {text}"),
                json!({ "errors": errors, "warnings": warnings }),
            ),
        }
    }

    pub(crate) fn handle_crew_agents(&self) -> Reply {
        let agents: Vec<_> = self
            .registry
            .active_agents()
            .into_iter()
            .filter(|r| {
                r.name.starts_with("crew-")
                    || r.name.starts_with("scout-")
                    || r.name.starts_with("reviewer-")
                    || r.name == "analyst"
            })
            .map(|r| r.name)
            .collect();
        let text = if agents.is_empty() {
            "No crew workers active.".to_string()
        } else {
            agents.join("\n")
        };
        Reply::with("crew.agents", text, json!({ "agents": agents }))
    }

    pub(crate) fn handle_crew_install(&self) -> Reply {
        let dirs = [
            self.layout.epics_dir(),
            self.layout.epic_specs_dir(),
            self.layout.tasks_dir(),
            self.layout.blocks_dir(),
            self.layout.checkpoints_dir(),
            self.layout.artifacts_dir(),
        ];
        for dir in &dirs {
            if let Err(e) = std::fs::create_dir_all(dir) {
                return Reply::error("crew.install", "io", e.to_string());
            }
        }
        Reply::ok(
            "crew.install",
            format!("Crew directories ready under {}.", self.layout.crew_dir().display()),
        )
    }

    pub(crate) fn handle_crew_uninstall(&self) -> Reply {
        let dir = self.layout.crew_dir();
        if !dir.exists() {
            return Reply::ok("crew.uninstall", "Nothing to remove.");
        }
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Reply::ok(
                "crew.uninstall",
                format!("Removed {} and all crew state.", dir.display()),
            ),
            Err(e) => Reply::error("crew.uninstall", "io", e.to_string()),
        }
    }
}
