// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crew error types

use pim_core::{EpicId, TaskId, TaskStatus};
use pim_store::LockError;
use thiserror::Error;

/// Errors from epic/task operations
#[derive(Debug, Error)]
pub enum CrewError {
    #[error("epic {0} not found")]
    EpicNotFound(EpicId),
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    #[error("epic has {remaining} task(s) not done")]
    IncompleteTasks { remaining: u32 },
    #[error("task is {status}, expected {expected}")]
    InvalidTransition {
        status: TaskStatus,
        expected: &'static str,
    },
    #[error("no checkpoint for epic {0}")]
    CheckpointNotFound(EpicId),
    #[error("no scout workers configured")]
    NoScouts,
    #[error("scout workers produced no usable reports")]
    GeneratorFailed,
    #[error("analyst produced no task blocks")]
    AnalystFailed,
    #[error("work run was cancelled")]
    Cancelled,
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
