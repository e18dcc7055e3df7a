// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbox directory watcher
//!
//! Watches `B/inbox/<self>/` and forwards debounced change notifications to
//! the drain loop. Platform watchers coalesce and sometimes drop events;
//! the contract here is only "some notification, possibly merged", which
//! the 50 ms debounce plus drain-on-attach absorbs. A watcher that fails
//! re-attaches with exponential backoff and goes dormant after five
//! failures until the next explicit recovery.

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Window within which raw filesystem events coalesce into one fire.
pub const DEBOUNCE: Duration = Duration::from_millis(50);

/// Re-attach attempts before the watcher goes dormant.
pub const MAX_REATTACH: u32 = 5;

/// Backoff before re-attach attempt `retry` (1-based):
/// `min(1000 * 2^(retry-1), 30000)` milliseconds.
pub fn reattach_delay(retry: u32) -> Duration {
    let ms = 1000u64.saturating_mul(1u64 << (retry.saturating_sub(1)).min(16));
    Duration::from_millis(ms.min(30_000))
}

enum RawSignal {
    Changed,
    Failed,
}

/// Running watcher task; dropping the handle shuts it down.
pub struct WatcherHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    /// Stop watching. Idempotent.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Start watching an inbox directory. Each debounced change produces one
/// `()` on `fire_tx`; the receiver runs the drain.
pub fn start_watcher(dir: PathBuf, fire_tx: mpsc::Sender<()>) -> WatcherHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(watch_loop(dir, fire_tx, shutdown_rx));
    WatcherHandle {
        shutdown: Some(shutdown_tx),
        task,
    }
}

fn attach(dir: &Path, tx: mpsc::Sender<RawSignal>) -> Result<RecommendedWatcher, notify::Error> {
    std::fs::create_dir_all(dir)?;
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
        let signal = match res {
            Ok(_) => RawSignal::Changed,
            Err(_) => RawSignal::Failed,
        };
        let _ = tx.blocking_send(signal);
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

async fn watch_loop(dir: PathBuf, fire_tx: mpsc::Sender<()>, mut shutdown_rx: oneshot::Receiver<()>) {
    let mut retries: u32 = 0;
    'attach: loop {
        let (raw_tx, mut raw_rx) = mpsc::channel::<RawSignal>(64);
        let watcher = match attach(&dir, raw_tx) {
            Ok(watcher) => watcher,
            Err(e) => {
                retries += 1;
                if retries > MAX_REATTACH {
                    tracing::warn!(dir = %dir.display(), error = %e, "inbox watcher dormant after {MAX_REATTACH} failures");
                    return;
                }
                let delay = reattach_delay(retries);
                tracing::debug!(dir = %dir.display(), retry = retries, ?delay, "watch attach failed, backing off");
                tokio::select! {
                    _ = &mut shutdown_rx => return,
                    _ = tokio::time::sleep(delay) => continue 'attach,
                }
            }
        };
        retries = 0;

        // Cover anything that arrived while unwatched.
        if fire_tx.send(()).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    drop(watcher);
                    return;
                }
                signal = raw_rx.recv() => match signal {
                    Some(RawSignal::Changed) => {
                        debounce(&mut raw_rx).await;
                        if fire_tx.send(()).await.is_err() {
                            return;
                        }
                    }
                    Some(RawSignal::Failed) | None => {
                        drop(watcher);
                        retries += 1;
                        if retries > MAX_REATTACH {
                            tracing::warn!(dir = %dir.display(), "inbox watcher dormant after {MAX_REATTACH} failures");
                            return;
                        }
                        let delay = reattach_delay(retries);
                        tracing::debug!(dir = %dir.display(), retry = retries, ?delay, "watch lost, backing off");
                        tokio::select! {
                            _ = &mut shutdown_rx => return,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        continue 'attach;
                    }
                }
            }
        }
    }
}

/// Absorb raw events for one debounce window.
async fn debounce(raw_rx: &mut mpsc::Receiver<RawSignal>) {
    let deadline = tokio::time::sleep(DEBOUNCE);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return,
            signal = raw_rx.recv() => {
                if signal.is_none() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
