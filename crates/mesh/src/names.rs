// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent name generation
//!
//! Names are adjective-noun pairs from a themed word list. Collision
//! retries must be deterministically distinct: attempt `n` derives its
//! candidate from the pool seed plus `n`, so two agents racing on the same
//! proposal diverge by attempt number.

use pim_core::NameWords;

const DEFAULT_ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "daring", "eager", "fuzzy", "gentle", "hasty", "ivory", "jolly",
    "keen", "lucid", "mellow", "nimble", "oaken", "plucky", "quiet", "rustic", "spry", "tidy",
    "umber", "vivid", "wry", "zesty",
];

const DEFAULT_NOUNS: &[&str] = &[
    "badger", "crane", "dingo", "egret", "ferret", "gecko", "heron", "ibis", "jackal", "kestrel",
    "lemur", "marmot", "newt", "otter", "plover", "quail", "raven", "shrew", "tapir", "urchin",
    "vole", "wombat", "yak", "zebra",
];

/// A pool of adjective/noun words with a per-session seed.
#[derive(Debug, Clone)]
pub struct NamePool {
    adjectives: Vec<String>,
    nouns: Vec<String>,
    seed: u64,
}

impl NamePool {
    /// Build a pool from configured word lists, falling back to the
    /// defaults when a list is absent or empty.
    pub fn from_config(words: Option<&NameWords>) -> Self {
        let adjectives = words
            .filter(|w| !w.adjectives.is_empty())
            .map(|w| w.adjectives.clone())
            .unwrap_or_else(|| DEFAULT_ADJECTIVES.iter().map(|s| s.to_string()).collect());
        let nouns = words
            .filter(|w| !w.nouns.is_empty())
            .map(|w| w.nouns.clone())
            .unwrap_or_else(|| DEFAULT_NOUNS.iter().map(|s| s.to_string()).collect());
        Self {
            adjectives,
            nouns,
            seed: rand::random(),
        }
    }

    /// Fixed-seed pool for tests.
    pub fn with_seed(words: Option<&NameWords>, seed: u64) -> Self {
        let mut pool = Self::from_config(words);
        pool.seed = seed;
        pool
    }

    /// The candidate name for a retry attempt.
    pub fn candidate(&self, attempt: u32) -> String {
        let i = self.seed.wrapping_add(attempt as u64);
        let adjective = &self.adjectives[(i % self.adjectives.len() as u64) as usize];
        let noun = &self.nouns[(i.wrapping_mul(31) % self.nouns.len() as u64) as usize];
        format!("{adjective}-{noun}")
    }
}

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;
