// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration loading
//!
//! Layers merge project > user > host settings > defaults. Each file is
//! optional and read leniently: a malformed layer contributes nothing
//! rather than failing the session.

use pim_core::{ConfigLayer, MessengerConfig};
use pim_store::{atomic::read_json, Layout};
use serde_json::Value;
use std::path::Path;

fn layer_from(value: Option<Value>) -> ConfigLayer {
    value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Load the merged configuration for a working directory.
pub fn load_config(cwd: &Path) -> MessengerConfig {
    // Lowest precedence first.
    let settings = Layout::settings_path()
        .and_then(|p| read_json::<Value>(&p))
        .and_then(|v| v.get("messenger").cloned());
    let user = Layout::user_config_path().and_then(|p| read_json::<Value>(&p));
    let project = read_json::<Value>(&Layout::project_config_path(cwd));

    MessengerConfig::resolve(&[
        layer_from(settings),
        layer_from(user),
        layer_from(project),
    ])
}
