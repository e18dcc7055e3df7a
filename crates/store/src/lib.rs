// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pim-store: Filesystem substrate for Pi Messenger
//!
//! Everything cross-process lives as files under the messenger base
//! directory and the project directory. This crate owns the atomic write
//! primitive, the directory layout, the PID liveness probe, the swarm lock,
//! the claims/completions store, and the activity feed log.

pub mod atomic;
pub mod claims;
pub mod feed;
pub mod layout;
pub mod lock;
pub mod proc;

pub use atomic::{read_json, read_text, remove_quiet, write_json, write_text};
pub use claims::{ClaimError, Claimant, ClaimsStore};
pub use feed::FeedLog;
pub use layout::Layout;
pub use lock::{with_swarm_lock, LockError, LockGuard};
pub use proc::{current_pid, pid_alive};
