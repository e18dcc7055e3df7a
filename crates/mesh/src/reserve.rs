// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path reservations and the write-enforcement hook
//!
//! A reservation lives on the owner's presence record, so it disappears
//! with the record when the owner dies. Matching is literal: trailing-slash
//! directory prefix or exact equality, nothing else. Callers supply
//! canonical paths.

use crate::registry::{Registry, RegistryError};
use chrono::{DateTime, Utc};
use pim_core::{Clock, PresenceRecord, Reservation};

/// One other agent's reservation covering a probed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationConflict {
    pub agent: String,
    pub pattern: String,
    pub reason: Option<String>,
    pub since: DateTime<Utc>,
}

/// The write-enforcement hook: every other live agent whose reservation
/// matches `path`. A non-empty result is a hard block.
pub fn conflicts_with_other_agents<C: Clock>(
    registry: &Registry<C>,
    self_name: &str,
    path: &str,
) -> Vec<ReservationConflict> {
    registry
        .active_agents()
        .iter()
        .filter(|record| record.name != self_name)
        .flat_map(|record| {
            record
                .reservations_matching(path)
                .map(|r| ReservationConflict {
                    agent: record.name.clone(),
                    pattern: r.pattern.clone(),
                    reason: r.reason.clone(),
                    since: r.since,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Add reservations to own record. Re-reserving a pattern refreshes its
/// reason and timestamp instead of duplicating it.
pub fn reserve<C: Clock>(
    registry: &Registry<C>,
    name: &str,
    patterns: &[String],
    reason: Option<&str>,
    since: DateTime<Utc>,
) -> Result<PresenceRecord, RegistryError> {
    registry.update_own(name, |record| {
        for pattern in patterns {
            record.reservations.retain(|r| r.pattern != *pattern);
            record.reservations.push(Reservation {
                pattern: pattern.clone(),
                reason: reason.map(str::to_string),
                since,
            });
        }
    })
}

/// Remove reservations from own record; `None` releases everything.
/// Returns the number of reservations dropped.
pub fn release<C: Clock>(
    registry: &Registry<C>,
    name: &str,
    patterns: Option<&[String]>,
) -> Result<usize, RegistryError> {
    let mut removed = 0;
    registry.update_own(name, |record| {
        let before = record.reservations.len();
        match patterns {
            None => record.reservations.clear(),
            Some(patterns) => record
                .reservations
                .retain(|r| !patterns.contains(&r.pattern)),
        }
        removed = before - record.reservations.len();
    })?;
    Ok(removed)
}

#[cfg(test)]
#[path = "reserve_tests.rs"]
mod tests;
