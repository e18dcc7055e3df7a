// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pim-crew: Epic/task orchestration on top of the messenger substrate
//!
//! Epics group dependency-ordered tasks; the executor runs ready tasks as
//! child-process workers with bounded concurrency; checkpoints freeze and
//! restore an epic's full state. All cross-process mutations go through the
//! swarm lock and the atomic write primitive from pim-store.

mod checkpoint;
mod epics;
mod error;
mod orchestrate;
mod plan;
mod store;
mod tasks;
mod truncate;
mod validate;
mod worker;

pub use checkpoint::{Checkpoint, CheckpointInfo};
pub use error::CrewError;
pub use orchestrate::{work, Verdict, WorkOptions, WorkReport};
pub use plan::{parse_task_blocks, plan, PlanOutcome, TaskBlock};
pub use store::Crew;
pub use truncate::{truncate_output, MAX_OUTPUT_BYTES, MAX_OUTPUT_LINES};
pub use validate::ValidationReport;
pub use worker::{
    ProcessWorkerAdapter, WorkerAdapter, WorkerError, WorkerOutput, WorkerProgress, WorkerTask,
};

#[cfg(any(test, feature = "test-support"))]
pub use worker::{FakeRun, FakeWorkerAdapter};
