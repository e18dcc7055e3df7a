// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity feed: append-only JSONL, bounded by a retention count

use crate::atomic::write_text;
use pim_core::FeedEvent;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

/// Slack before an append triggers a retention rewrite, so the file is not
/// rewritten on every event once full.
const TRIM_SLACK: usize = 64;

/// Writer/reader over `P/.pi/messenger/feed.jsonl`.
#[derive(Debug, Clone)]
pub struct FeedLog {
    path: PathBuf,
    retention: usize,
}

impl FeedLog {
    pub fn new(path: PathBuf, retention: usize) -> Self {
        Self { path, retention }
    }

    /// Append one event, trimming to the retention count when the file has
    /// grown past it.
    pub fn append(&self, event: &FeedEvent) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        drop(file);

        let lines = self.raw_lines();
        if lines.len() > self.retention + TRIM_SLACK {
            let kept = &lines[lines.len() - self.retention..];
            let mut text = kept.join("\n");
            text.push('\n');
            write_text(&self.path, &text)?;
        }
        Ok(())
    }

    /// The newest `limit` events, oldest first. Malformed lines are skipped.
    pub fn recent(&self, limit: usize) -> Vec<FeedEvent> {
        let events: Vec<FeedEvent> = self
            .raw_lines()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        let skip = events.len().saturating_sub(limit);
        events.into_iter().skip(skip).collect()
    }

    fn raw_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.path)
            .map(|text| {
                text.lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
