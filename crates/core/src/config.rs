// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messenger configuration
//!
//! Options merge from project config > user config > agent settings >
//! defaults. Each file contributes a [`ConfigLayer`]; [`MessengerConfig::resolve`]
//! folds them in precedence order.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shorthand for the three context booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    Full,
    Minimal,
    None,
}

/// Custom word lists for name generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameWords {
    #[serde(default)]
    pub adjectives: Vec<String>,
    #[serde(default)]
    pub nouns: Vec<String>,
}

/// One configuration file's contribution. Every field optional; absent
/// fields defer to lower-precedence layers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigLayer {
    pub auto_register: Option<bool>,
    pub auto_register_paths: Option<Vec<String>>,
    pub scope_to_folder: Option<bool>,
    pub context_mode: Option<ContextMode>,
    pub registration_context: Option<bool>,
    pub reply_hint: Option<bool>,
    pub sender_details_on_first_contact: Option<bool>,
    pub stuck_threshold: Option<u64>,
    pub stuck_notify: Option<bool>,
    pub auto_status: Option<bool>,
    pub name_theme: Option<String>,
    pub name_words: Option<NameWords>,
    pub feed_retention: Option<usize>,
    pub crew: Option<CrewLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrewLayer {
    pub concurrency: Option<CrewConcurrencyLayer>,
    pub work: Option<CrewWorkLayer>,
    pub artifacts: Option<CrewArtifactsLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrewConcurrencyLayer {
    pub scouts: Option<usize>,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrewWorkLayer {
    pub max_attempts_per_task: Option<u32>,
    pub max_waves: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrewArtifactsLayer {
    pub enabled: Option<bool>,
    pub cleanup_days: Option<u32>,
}

/// Crew orchestration settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrewConfig {
    pub scouts: usize,
    pub workers: usize,
    pub max_attempts_per_task: u32,
    pub max_waves: u32,
    pub artifacts_enabled: bool,
    pub artifacts_cleanup_days: u32,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            scouts: 3,
            workers: 2,
            max_attempts_per_task: 5,
            max_waves: 50,
            artifacts_enabled: true,
            artifacts_cleanup_days: 7,
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessengerConfig {
    pub auto_register: bool,
    pub auto_register_paths: Vec<String>,
    pub scope_to_folder: bool,
    pub registration_context: bool,
    pub reply_hint: bool,
    pub sender_details_on_first_contact: bool,
    /// Seconds without activity before a working agent counts as stuck.
    pub stuck_threshold: u64,
    pub stuck_notify: bool,
    pub auto_status: bool,
    pub name_theme: Option<String>,
    pub name_words: Option<NameWords>,
    pub feed_retention: usize,
    pub crew: CrewConfig,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            auto_register: false,
            auto_register_paths: Vec::new(),
            scope_to_folder: false,
            registration_context: true,
            reply_hint: true,
            sender_details_on_first_contact: true,
            stuck_threshold: 900,
            stuck_notify: true,
            auto_status: true,
            name_theme: None,
            name_words: None,
            feed_retention: 500,
            crew: CrewConfig::default(),
        }
    }
}

impl MessengerConfig {
    /// Fold layers over the defaults, lowest precedence first.
    pub fn resolve(layers_low_to_high: &[ConfigLayer]) -> Self {
        let mut config = Self::default();
        for layer in layers_low_to_high {
            config.apply(layer);
        }
        config
    }

    fn apply(&mut self, layer: &ConfigLayer) {
        // contextMode first so explicit booleans in the same layer win.
        if let Some(mode) = layer.context_mode {
            let (reg, hint, details) = match mode {
                ContextMode::Full => (true, true, true),
                ContextMode::Minimal => (true, false, false),
                ContextMode::None => (false, false, false),
            };
            self.registration_context = reg;
            self.reply_hint = hint;
            self.sender_details_on_first_contact = details;
        }
        if let Some(v) = layer.auto_register {
            self.auto_register = v;
        }
        if let Some(ref v) = layer.auto_register_paths {
            self.auto_register_paths = v.clone();
        }
        if let Some(v) = layer.scope_to_folder {
            self.scope_to_folder = v;
        }
        if let Some(v) = layer.registration_context {
            self.registration_context = v;
        }
        if let Some(v) = layer.reply_hint {
            self.reply_hint = v;
        }
        if let Some(v) = layer.sender_details_on_first_contact {
            self.sender_details_on_first_contact = v;
        }
        if let Some(v) = layer.stuck_threshold {
            self.stuck_threshold = v;
        }
        if let Some(v) = layer.stuck_notify {
            self.stuck_notify = v;
        }
        if let Some(v) = layer.auto_status {
            self.auto_status = v;
        }
        if let Some(ref v) = layer.name_theme {
            self.name_theme = Some(v.clone());
        }
        if let Some(ref v) = layer.name_words {
            self.name_words = Some(v.clone());
        }
        if let Some(v) = layer.feed_retention {
            self.feed_retention = v;
        }
        if let Some(ref crew) = layer.crew {
            if let Some(ref c) = crew.concurrency {
                if let Some(v) = c.scouts {
                    self.crew.scouts = v;
                }
                if let Some(v) = c.workers {
                    self.crew.workers = v;
                }
            }
            if let Some(ref w) = crew.work {
                if let Some(v) = w.max_attempts_per_task {
                    self.crew.max_attempts_per_task = v;
                }
                if let Some(v) = w.max_waves {
                    self.crew.max_waves = v;
                }
            }
            if let Some(ref a) = crew.artifacts {
                if let Some(v) = a.enabled {
                    self.crew.artifacts_enabled = v;
                }
                if let Some(v) = a.cleanup_days {
                    self.crew.artifacts_cleanup_days = v;
                }
            }
        }
    }

    /// Whether `cwd` matches any auto-register entry.
    ///
    /// Entries support `~` home expansion, a trailing `/*` (any directory
    /// under the base, but not the base itself), a trailing `*` prefix
    /// wildcard, and otherwise exact equality.
    pub fn auto_register_matches(&self, cwd: &Path, home: &Path) -> bool {
        let cwd = cwd.to_string_lossy();
        self.auto_register_paths.iter().any(|entry| {
            let expanded = expand_home(entry, home);
            if let Some(base) = expanded.strip_suffix("/*") {
                cwd.strip_prefix(base)
                    .is_some_and(|rest| rest.starts_with('/'))
            } else if let Some(prefix) = expanded.strip_suffix('*') {
                cwd.starts_with(prefix)
            } else {
                cwd == expanded
            }
        })
    }
}

fn expand_home(entry: &str, home: &Path) -> String {
    if entry == "~" {
        return home.to_string_lossy().into_owned();
    }
    if let Some(rest) = entry.strip_prefix("~/") {
        return format!("{}/{}", home.to_string_lossy(), rest);
    }
    entry.to_string()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
