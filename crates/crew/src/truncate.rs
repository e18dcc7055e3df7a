// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker output truncation
//!
//! Captured output is capped line-first, then byte-first. The byte cut
//! lands on a line boundary, found by binary search over the cumulative
//! line lengths, so a truncated capture never ends mid-line.

/// Default byte cap for captured worker output.
pub const MAX_OUTPUT_BYTES: usize = 200 * 1024;

/// Default line cap for captured worker output.
pub const MAX_OUTPUT_LINES: usize = 5_000;

/// Cap `input` to `max_lines` and `max_bytes`. Returns the kept text and
/// whether anything was dropped.
pub fn truncate_output(input: &str, max_lines: usize, max_bytes: usize) -> (String, bool) {
    let lines: Vec<&str> = input.lines().collect();
    let mut kept = lines.len().min(max_lines);
    let mut truncated = kept < lines.len();

    // Cumulative byte length of the first k lines, newline-joined.
    let mut offsets = Vec::with_capacity(kept + 1);
    offsets.push(0usize);
    let mut total = 0usize;
    for (i, line) in lines[..kept].iter().enumerate() {
        total += line.len() + usize::from(i > 0);
        offsets.push(total);
    }

    if offsets[kept] > max_bytes {
        truncated = true;
        kept = offsets.partition_point(|&bytes| bytes <= max_bytes) - 1;
    }

    (lines[..kept].join("\n"), truncated)
}

#[cfg(test)]
#[path = "truncate_tests.rs"]
mod tests;
