// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic write-then-rename primitive
//!
//! Every mutation of a tracked file writes `<path>.tmp-<pid>-<nanos>` and
//! renames into place. Rename on one POSIX filesystem is atomic, so readers
//! never observe partial contents. Reads are lenient: a missing or
//! unparseable file is "not present", never an error: a concurrent writer
//! on a non-POSIX filesystem can leave a torn file, and the caller must not
//! treat that as fatal.

use nix::errno::Errno;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Retries for transient errno values during write/rename.
const TRANSIENT_RETRIES: u32 = 3;

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(code)
            if code == Errno::EBUSY as i32
                || code == Errno::EINTR as i32
                || code == Errno::EEXIST as i32
    )
}

fn tmp_path(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(&format!(".tmp-{}-{}", std::process::id(), nanos));
    path.with_file_name(name)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    let mut last_err = None;
    for _ in 0..=TRANSIENT_RETRIES {
        let result = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, path));
        match result {
            Ok(()) => return Ok(()),
            Err(e) if is_transient(&e) => {
                tracing::debug!(path = %path.display(), error = %e, "transient write error, retrying");
                last_err = Some(e);
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        }
    }
    let _ = fs::remove_file(&tmp);
    Err(last_err.unwrap_or_else(|| io::Error::other("atomic write failed")))
}

/// Atomically write `value` as indented JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_bytes(path, &bytes)
}

/// Atomically write a text file, creating parent directories.
pub fn write_text(path: &Path, text: &str) -> io::Result<()> {
    write_bytes(path, text.as_bytes())
}

/// Read and parse a JSON file. Missing and malformed both yield `None`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "unparseable file treated as missing");
            None
        }
    }
}

/// Read a text file. Missing yields `None`.
pub fn read_text(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok()
}

/// Best-effort unlink: a failure is ignored because the next scanner will
/// observe the same condition.
pub fn remove_quiet(path: &Path) {
    let _ = fs::remove_file(path);
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
