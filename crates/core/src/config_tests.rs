// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

fn layer(json: &str) -> ConfigLayer {
    serde_json::from_str(json).unwrap()
}

#[test]
fn defaults_without_layers() {
    let config = MessengerConfig::resolve(&[]);
    assert!(!config.auto_register);
    assert_eq!(config.stuck_threshold, 900);
    assert_eq!(config.crew.max_attempts_per_task, 5);
    assert_eq!(config.crew.max_waves, 50);
    assert!(config.registration_context);
}

#[test]
fn higher_layer_wins() {
    let low = layer(r#"{"stuckThreshold": 600, "autoStatus": false}"#);
    let high = layer(r#"{"stuckThreshold": 300}"#);
    let config = MessengerConfig::resolve(&[low, high]);
    assert_eq!(config.stuck_threshold, 300);
    // Untouched by the higher layer, so the lower layer's value holds.
    assert!(!config.auto_status);
}

#[test]
fn context_mode_expands_to_three_booleans() {
    let config = MessengerConfig::resolve(&[layer(r#"{"contextMode": "none"}"#)]);
    assert!(!config.registration_context);
    assert!(!config.reply_hint);
    assert!(!config.sender_details_on_first_contact);

    let config = MessengerConfig::resolve(&[layer(r#"{"contextMode": "minimal"}"#)]);
    assert!(config.registration_context);
    assert!(!config.reply_hint);
}

#[test]
fn explicit_boolean_beats_context_mode_in_same_layer() {
    let config = MessengerConfig::resolve(&[layer(
        r#"{"contextMode": "none", "replyHint": true}"#,
    )]);
    assert!(config.reply_hint);
    assert!(!config.registration_context);
}

#[test]
fn crew_options_merge_piecewise() {
    let low = layer(r#"{"crew": {"concurrency": {"scouts": 5}}}"#);
    let high = layer(r#"{"crew": {"work": {"maxWaves": 10}}}"#);
    let config = MessengerConfig::resolve(&[low, high]);
    assert_eq!(config.crew.scouts, 5);
    assert_eq!(config.crew.workers, 2);
    assert_eq!(config.crew.max_waves, 10);
}

#[test]
fn unknown_keys_are_ignored() {
    // Foreign settings files carry unrelated sections.
    let config = MessengerConfig::resolve(&[layer(r#"{"theme": "dark", "autoRegister": true}"#)]);
    assert!(config.auto_register);
}

#[yare::parameterized(
    exact          = { "/work/repo", "/work/repo", true },
    exact_other    = { "/work/repo", "/work/other", false },
    subdirs        = { "/work/*", "/work/repo", true },
    subdirs_self   = { "/work/*", "/work", false },
    star_prefix    = { "/work/repo*", "/work/repo-v2", true },
    home_tilde     = { "~/code/*", "/home/pi/code/app", true },
    home_exact     = { "~", "/home/pi", true },
)]
fn auto_register_path_matching(entry: &str, cwd: &str, expected: bool) {
    let mut config = MessengerConfig::default();
    config.auto_register_paths = vec![entry.to_string()];
    let home = PathBuf::from("/home/pi");
    assert_eq!(
        config.auto_register_matches(&PathBuf::from(cwd), &home),
        expected,
    );
}
