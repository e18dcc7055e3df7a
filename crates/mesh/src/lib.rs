// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pim-mesh: Presence, messaging, and reservations
//!
//! The mesh is the set of presence records with live PIDs on one
//! workstation. This crate owns registration and discovery, the activity
//! tracker that keeps the presence record fresh, path reservations with the
//! write-enforcement hook, the inbox with its filesystem watcher, and the
//! per-sender chat history with echo-loop suppression.

pub mod activity;
pub mod history;
pub mod inbox;
pub mod names;
pub mod registry;
pub mod reserve;
pub mod watcher;

pub use activity::{ActivityTracker, SessionEvent};
pub use history::{ChatHistory, Delivered};
pub use inbox::{BroadcastOutcome, DeliveryHandler, Inbox, SendError};
pub use names::NamePool;
pub use registry::{RegisterRequest, Registry, RegistryError};
pub use reserve::{conflicts_with_other_agents, ReservationConflict};
pub use watcher::{start_watcher, WatcherHandle};
