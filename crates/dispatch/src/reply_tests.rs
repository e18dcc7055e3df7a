// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn ok_reply_echoes_mode() {
    let reply = Reply::ok("send", "Message sent to B.");
    assert_eq!(reply.text, "Message sent to B.");
    assert_eq!(reply.details["mode"], "send");
    assert_eq!(reply.error_kind(), None);
}

#[test]
fn with_merges_extra_details() {
    let reply = Reply::with("claim", "Claimed T1.", json!({ "claimedAt": "now" }));
    assert_eq!(reply.details["mode"], "claim");
    assert_eq!(reply.details["claimedAt"], "now");
}

#[test]
fn error_reply_has_prefix_and_kind() {
    let reply = Reply::error("claim", "already_claimed", "T1 is taken");
    assert_eq!(reply.text, "Error: T1 is taken");
    assert_eq!(reply.error_kind(), Some("already_claimed"));
}

#[test]
fn error_with_carries_context() {
    let reply = Reply::error_with(
        "claim",
        "already_claimed",
        "taken",
        json!({ "conflict": { "agent": "alice" } }),
    );
    assert_eq!(reply.details["conflict"]["agent"], "alice");
}

#[test]
fn warning_is_not_an_error() {
    let reply = Reply::warning("spec", "spec file does not exist yet");
    assert!(reply.text.starts_with("Warning:"));
    assert_eq!(reply.error_kind(), None);
}
