// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher results
//!
//! Every action returns `{text, details}`. `details.mode` echoes the
//! action; `details.error` is a short kind string on failure. Failures are
//! values, never exceptions: only programming errors and process-fatal I/O
//! propagate past the dispatcher.

use serde::Serialize;
use serde_json::{json, Value};

/// One dispatcher result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub details: Value,
}

impl Reply {
    /// A success reply carrying only the mode.
    pub fn ok(mode: &str, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            details: json!({ "mode": mode }),
        }
    }

    /// A success reply with extra detail fields merged over the mode.
    pub fn with(mode: &str, text: impl Into<String>, extra: Value) -> Self {
        let mut details = json!({ "mode": mode });
        if let (Some(base), Some(extra)) = (details.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        Self {
            text: text.into(),
            details,
        }
    }

    /// An error reply with its short kind tag.
    pub fn error(mode: &str, kind: &str, text: impl Into<String>) -> Self {
        Self {
            text: format!("Error: {}", text.into()),
            details: json!({ "mode": mode, "error": kind }),
        }
    }

    /// An error reply with extra structured context.
    pub fn error_with(mode: &str, kind: &str, text: impl Into<String>, extra: Value) -> Self {
        let mut reply = Self::error(mode, kind, text);
        if let (Some(base), Some(extra)) = (reply.details.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        reply
    }

    /// A warning reply: surfaced with a `Warning:` prefix but not an error.
    pub fn warning(mode: &str, text: impl Into<String>) -> Self {
        Self {
            text: format!("Warning: {}", text.into()),
            details: json!({ "mode": mode }),
        }
    }

    /// The error kind, when this reply is a failure.
    pub fn error_kind(&self) -> Option<&str> {
        self.details.get("error").and_then(Value::as_str)
    }
}

#[cfg(test)]
#[path = "reply_tests.rs"]
mod tests;
