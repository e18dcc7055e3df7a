// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crew file store
//!
//! Epics, tasks, and their spec files live under `P/.pi/messenger/crew/`.
//! This module is the raw file layer; the lifecycle rules live in
//! `epics.rs` and `tasks.rs`.

use crate::error::CrewError;
use pim_core::{Clock, Epic, EpicId, Task, TaskId};
use pim_store::{
    atomic::{read_json, read_text, remove_quiet, write_json, write_text},
    Layout,
};
use std::path::{Path, PathBuf};

/// Placeholder body written for freshly created epic and task specs.
pub(crate) const STUB_SPEC: &str = "(spec pending)";

/// Handle over one project's crew state.
#[derive(Debug, Clone)]
pub struct Crew<C: Clock> {
    pub(crate) layout: Layout,
    pub(crate) clock: C,
    pub(crate) project_root: PathBuf,
}

impl<C: Clock> Crew<C> {
    pub fn new(layout: Layout, clock: C, project_root: PathBuf) -> Self {
        Self {
            layout,
            clock,
            project_root,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub(crate) fn project_root(&self) -> &Path {
        &self.project_root
    }

    // -- epics --

    pub fn load_epic(&self, id: &EpicId) -> Option<Epic> {
        read_json(&self.layout.epic_path(id))
    }

    pub(crate) fn require_epic(&self, id: &EpicId) -> Result<Epic, CrewError> {
        self.load_epic(id)
            .ok_or_else(|| CrewError::EpicNotFound(id.clone()))
    }

    pub(crate) fn save_epic(&self, epic: &Epic) -> Result<(), CrewError> {
        write_json(&self.layout.epic_path(&epic.id), epic)?;
        Ok(())
    }

    /// Every epic on disk, sorted by number.
    pub fn list_epics(&self) -> Vec<Epic> {
        let mut epics: Vec<Epic> = json_files(&self.layout.epics_dir())
            .iter()
            .filter_map(|path| read_json(path))
            .collect();
        epics.sort_by_key(|e: &Epic| e.id.number().unwrap_or(u64::MAX));
        epics
    }

    pub fn epic_spec(&self, id: &EpicId) -> Option<String> {
        read_text(&self.layout.epic_spec_path(id))
    }

    pub(crate) fn save_epic_spec(&self, id: &EpicId, content: &str) -> Result<(), CrewError> {
        write_text(&self.layout.epic_spec_path(id), content)?;
        Ok(())
    }

    // -- tasks --

    pub fn load_task(&self, id: &TaskId) -> Option<Task> {
        read_json(&self.layout.task_path(id))
    }

    pub(crate) fn require_task(&self, id: &TaskId) -> Result<Task, CrewError> {
        self.load_task(id)
            .ok_or_else(|| CrewError::TaskNotFound(id.clone()))
    }

    pub(crate) fn save_task(&self, task: &Task) -> Result<(), CrewError> {
        write_json(&self.layout.task_path(&task.id), task)?;
        Ok(())
    }

    /// Every task of one epic, sorted by per-epic number.
    pub fn list_tasks(&self, epic: &EpicId) -> Vec<Task> {
        let mut tasks: Vec<Task> = json_files(&self.layout.tasks_dir())
            .iter()
            .filter_map(|path| read_json::<Task>(path))
            .filter(|t| t.epic_id == *epic)
            .collect();
        tasks.sort_by_key(|t| t.id.number().unwrap_or(u64::MAX));
        tasks
    }

    pub fn task_spec(&self, id: &TaskId) -> Option<String> {
        read_text(&self.layout.task_spec_path(id))
    }

    pub(crate) fn save_task_spec(&self, id: &TaskId, content: &str) -> Result<(), CrewError> {
        write_text(&self.layout.task_spec_path(id), content)?;
        Ok(())
    }

    pub(crate) fn remove_task_files(&self, id: &TaskId) {
        remove_quiet(&self.layout.task_path(id));
        remove_quiet(&self.layout.task_spec_path(id));
        remove_quiet(&self.layout.block_path(id));
    }

    // -- blocks --

    pub fn block_context(&self, id: &TaskId) -> Option<String> {
        read_text(&self.layout.block_path(id))
    }

    pub(crate) fn save_block(&self, id: &TaskId, content: &str) -> Result<(), CrewError> {
        write_text(&self.layout.block_path(id), content)?;
        Ok(())
    }

    pub(crate) fn remove_block(&self, id: &TaskId) {
        remove_quiet(&self.layout.block_path(id));
    }
}

pub(crate) fn json_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "json"))
        .collect();
    files.sort();
    files
}
