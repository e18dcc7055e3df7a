// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory layout for messenger state
//!
//! Two roots: the base directory `B` (shared by every agent on the machine,
//! default `~/.pi/agent/messenger`, overridable with `PI_MESSENGER_DIR`) and
//! the per-project directory `P/.pi/messenger` under the working directory.

use pim_core::{EpicId, TaskId};
use std::path::{Path, PathBuf};

/// Environment variable overriding the base directory.
pub const BASE_DIR_ENV: &str = "PI_MESSENGER_DIR";

/// Resolved state roots and path accessors.
#[derive(Debug, Clone)]
pub struct Layout {
    base: PathBuf,
    project: PathBuf,
}

impl Layout {
    /// Resolve the layout for a working directory, honoring
    /// `PI_MESSENGER_DIR`.
    pub fn discover(cwd: &Path) -> Self {
        let base = std::env::var_os(BASE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".pi/agent/messenger")
            });
        Self {
            base,
            project: cwd.join(".pi/messenger"),
        }
    }

    /// Explicit roots, used by tests and embedders.
    pub fn with_roots(base: impl Into<PathBuf>, project: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            project: project.into(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn project(&self) -> &Path {
        &self.project
    }

    // -- base directory --

    pub fn registry_dir(&self) -> PathBuf {
        self.base.join("registry")
    }

    pub fn presence_path(&self, name: &str) -> PathBuf {
        self.registry_dir().join(format!("{name}.json"))
    }

    pub fn inbox_root(&self) -> PathBuf {
        self.base.join("inbox")
    }

    pub fn inbox_dir(&self, name: &str) -> PathBuf {
        self.inbox_root().join(name)
    }

    pub fn claims_path(&self) -> PathBuf {
        self.base.join("claims.json")
    }

    pub fn completions_path(&self) -> PathBuf {
        self.base.join("completions.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base.join("swarm.lock")
    }

    // -- project directory --

    pub fn feed_path(&self) -> PathBuf {
        self.project.join("feed.jsonl")
    }

    pub fn crew_dir(&self) -> PathBuf {
        self.project.join("crew")
    }

    pub fn epics_dir(&self) -> PathBuf {
        self.crew_dir().join("epics")
    }

    pub fn epic_path(&self, id: &EpicId) -> PathBuf {
        self.epics_dir().join(format!("{id}.json"))
    }

    pub fn epic_specs_dir(&self) -> PathBuf {
        self.crew_dir().join("specs")
    }

    pub fn epic_spec_path(&self, id: &EpicId) -> PathBuf {
        self.epic_specs_dir().join(format!("{id}.md"))
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.crew_dir().join("tasks")
    }

    pub fn task_path(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir().join(format!("{id}.json"))
    }

    pub fn task_spec_path(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir().join(format!("{id}.md"))
    }

    pub fn blocks_dir(&self) -> PathBuf {
        self.crew_dir().join("blocks")
    }

    pub fn block_path(&self, id: &TaskId) -> PathBuf {
        self.blocks_dir().join(format!("{id}.md"))
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.crew_dir().join("checkpoints")
    }

    pub fn checkpoint_path(&self, id: &EpicId) -> PathBuf {
        self.checkpoints_dir().join(format!("{id}.json"))
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.crew_dir().join("artifacts")
    }

    // -- configuration files --

    /// Project-level config, highest precedence.
    pub fn project_config_path(cwd: &Path) -> PathBuf {
        cwd.join(".pi/pi-messenger.json")
    }

    /// User-level messenger config.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".pi/agent/pi-messenger.json"))
    }

    /// Host agent settings file; the messenger reads its `messenger` key.
    pub fn settings_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".pi/agent/settings.json"))
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
