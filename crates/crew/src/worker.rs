// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker adapter: spawning host-agent child processes
//!
//! The crew executor launches workers as child processes of the host
//! coding agent: JSON-streaming mode, session persistence off, the prompt
//! as an argument, an append-system-prompt file, and `PI_CREW_WORKER=1`
//! plus the assigned agent name in the environment. Stdout is a JSON-lines
//! progress stream. The adapter trait keeps the engine testable without
//! real processes.

use crate::truncate::{truncate_output, MAX_OUTPUT_BYTES, MAX_OUTPUT_LINES};
use async_trait::async_trait;
use pim_core::Message;
use pim_store::{atomic::write_json, atomic::write_text, Layout};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Environment variable marking a process as a crew worker.
pub const WORKER_ENV: &str = "PI_CREW_WORKER";

/// Environment variable carrying the assigned agent name.
pub const WORKER_NAME_ENV: &str = "PI_AGENT_NAME";

/// Default wait after the wrap-up steer message before signalling.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Wait after SIGTERM before SIGKILL.
pub const TERM_GRACE: Duration = Duration::from_secs(5);

/// One worker invocation.
#[derive(Debug, Clone)]
pub struct WorkerTask {
    pub agent_name: String,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_output_bytes: usize,
    pub max_output_lines: usize,
    /// When set, the run's prompt/output/stream/metadata are recorded here.
    pub artifacts_dir: Option<PathBuf>,
}

impl WorkerTask {
    pub fn new(agent_name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            prompt: prompt.into(),
            system_prompt: None,
            provider: None,
            model: None,
            max_output_bytes: MAX_OUTPUT_BYTES,
            max_output_lines: MAX_OUTPUT_LINES,
            artifacts_dir: None,
        }
    }
}

/// One parsed line of a worker's progress stream.
#[derive(Debug, Clone)]
pub struct WorkerProgress {
    pub agent_name: String,
    pub event: serde_json::Value,
}

/// Captured result of a finished worker.
#[derive(Debug, Clone)]
pub struct WorkerOutput {
    pub agent_name: String,
    pub output: String,
    pub truncated: bool,
    pub exit_ok: bool,
}

/// Errors from worker execution
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker: {0}")]
    Spawn(String),
    #[error("worker cancelled")]
    Cancelled,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Abstraction over worker launching, so orchestration is testable.
#[async_trait]
pub trait WorkerAdapter: Clone + Send + Sync + 'static {
    async fn run(
        &self,
        task: WorkerTask,
        progress: Option<mpsc::Sender<WorkerProgress>>,
        cancel: CancellationToken,
    ) -> Result<WorkerOutput, WorkerError>;
}

/// Run tasks with bounded concurrency, preserving input order in the
/// result vector.
pub async fn run_all<W: WorkerAdapter>(
    adapter: &W,
    tasks: Vec<WorkerTask>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Vec<Result<WorkerOutput, WorkerError>> {
    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut join_set = tokio::task::JoinSet::new();
    let count = tasks.len();
    for (index, task) in tasks.into_iter().enumerate() {
        let adapter = adapter.clone();
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        join_set.spawn(async move {
            let _permit = semaphore.acquire().await;
            (index, adapter.run(task, None, cancel).await)
        });
    }

    let mut results: Vec<Result<WorkerOutput, WorkerError>> = (0..count)
        .map(|_| Err(WorkerError::Cancelled))
        .collect();
    while let Some(joined) = join_set.join_next().await {
        if let Ok((index, result)) = joined {
            results[index] = result;
        }
    }
    results
}

/// Production adapter spawning the host agent binary.
#[derive(Debug, Clone)]
pub struct ProcessWorkerAdapter {
    layout: Layout,
    host_cmd: String,
    shutdown_grace: Duration,
}

impl ProcessWorkerAdapter {
    pub fn new(layout: Layout, host_cmd: impl Into<String>) -> Self {
        Self {
            layout,
            host_cmd: host_cmd.into(),
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    fn system_prompt_path(&self) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("pim-system-{}-{nanos}.md", std::process::id()))
    }

    fn build_command(&self, task: &WorkerTask, system_prompt: Option<&PathBuf>) -> Command {
        let mut cmd = Command::new(&self.host_cmd);
        cmd.arg("--output-format")
            .arg("stream-json")
            .arg("--no-session")
            .arg("--prompt")
            .arg(&task.prompt);
        if let Some(provider) = &task.provider {
            cmd.arg("--provider").arg(provider);
        }
        if let Some(model) = &task.model {
            cmd.arg("--model").arg(model);
        }
        if let Some(path) = system_prompt {
            cmd.arg("--append-system-prompt").arg(path);
        }
        cmd.env(WORKER_ENV, "1")
            .env(WORKER_NAME_ENV, &task.agent_name)
            // Own process group, so shutdown signals reach anything the
            // worker forks.
            .process_group(0)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Steer, then SIGTERM, then SIGKILL. Signals address the worker's
    /// process group (the child is its own group leader).
    async fn graceful_shutdown(&self, child: &mut Child, agent_name: &str) {
        let steer = Message::new(
            "crew",
            agent_name,
            "Wrap up: finish or summarize your current step, the run is shutting down.",
            chrono::Utc::now(),
            None,
        );
        let path = self.layout.inbox_dir(agent_name).join(steer.file_name());
        if let Err(e) = write_json(&path, &steer) {
            tracing::debug!(agent_name, error = %e, "steer message failed");
        }
        if wait_with_timeout(child, self.shutdown_grace).await {
            return;
        }

        if let Some(pid) = child.id() {
            tracing::info!(agent_name, pid, "worker ignored wrap-up, sending SIGTERM");
            signal_group(pid, nix::sys::signal::Signal::SIGTERM);
        }
        if wait_with_timeout(child, TERM_GRACE).await {
            return;
        }

        tracing::warn!(agent_name, "worker ignored SIGTERM, killing");
        if let Some(pid) = child.id() {
            signal_group(pid, nix::sys::signal::Signal::SIGKILL);
        }
        let _ = child.kill().await;
    }

    fn record_artifacts(&self, task: &WorkerTask, output: &str, stream: &[String], exit_ok: bool) {
        let Some(dir) = &task.artifacts_dir else {
            return;
        };
        let meta = serde_json::json!({
            "agent": task.agent_name,
            "exitOk": exit_ok,
            "recordedAt": chrono::Utc::now(),
        });
        let results = [
            write_text(&dir.join("prompt.md"), &task.prompt),
            write_text(&dir.join("output.txt"), output),
            write_text(&dir.join("stream.jsonl"), &stream.join("\n")),
            write_json(&dir.join("meta.json"), &meta),
        ];
        if let Some(Err(e)) = results.into_iter().find(|r| r.is_err()) {
            tracing::debug!(dir = %dir.display(), error = %e, "artifact write failed");
        }
    }
}

async fn wait_with_timeout(child: &mut Child, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, child.wait()).await.is_ok()
}

/// Signal a worker's whole process group via the negated pgid.
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(-(pid as i32)), signal);
}

#[async_trait]
impl WorkerAdapter for ProcessWorkerAdapter {
    async fn run(
        &self,
        task: WorkerTask,
        progress: Option<mpsc::Sender<WorkerProgress>>,
        cancel: CancellationToken,
    ) -> Result<WorkerOutput, WorkerError> {
        let system_prompt_path = match &task.system_prompt {
            Some(content) => {
                let path = self.system_prompt_path();
                write_text(&path, content)?;
                Some(path)
            }
            None => None,
        };

        let mut child = self
            .build_command(&task, system_prompt_path.as_ref())
            .spawn()
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;
        tracing::info!(agent = task.agent_name, pid = child.id(), "worker spawned");

        let stdout = child.stdout.take();
        let mut lines = stdout.map(|s| BufReader::new(s).lines());
        let mut raw_stream: Vec<String> = Vec::new();
        let mut captured = String::new();
        let mut cancelled = false;

        if let Some(lines) = &mut lines {
            loop {
                tokio::select! {
                    _ = cancel.cancelled(), if !cancelled => {
                        cancelled = true;
                        self.graceful_shutdown(&mut child, &task.agent_name).await;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if captured.len() < task.max_output_bytes.saturating_mul(2) {
                                if !captured.is_empty() {
                                    captured.push('\n');
                                }
                                match serde_json::from_str::<serde_json::Value>(&line) {
                                    Ok(event) => {
                                        if let Some(text) =
                                            event.get("text").and_then(|t| t.as_str())
                                        {
                                            captured.push_str(text);
                                        } else {
                                            captured.push_str(&line);
                                        }
                                        if let Some(tx) = &progress {
                                            let _ = tx
                                                .send(WorkerProgress {
                                                    agent_name: task.agent_name.clone(),
                                                    event,
                                                })
                                                .await;
                                        }
                                    }
                                    Err(_) => captured.push_str(&line),
                                }
                            }
                            raw_stream.push(line);
                        }
                        Ok(None) | Err(_) => break,
                    }
                }
            }
        }

        let status = child.wait().await?;
        let (output, truncated) =
            truncate_output(&captured, task.max_output_lines, task.max_output_bytes);
        self.record_artifacts(&task, &output, &raw_stream, status.success());
        if let Some(path) = system_prompt_path {
            pim_store::atomic::remove_quiet(&path);
        }

        if cancelled {
            return Err(WorkerError::Cancelled);
        }
        Ok(WorkerOutput {
            agent_name: task.agent_name,
            output,
            truncated,
            exit_ok: status.success(),
        })
    }
}

/// Scripted adapter for tests: a responder closure maps each task to its
/// output.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone)]
pub struct FakeWorkerAdapter {
    responder: std::sync::Arc<dyn Fn(&WorkerTask) -> FakeRun + Send + Sync>,
    calls: std::sync::Arc<parking_lot::Mutex<Vec<WorkerTask>>>,
}

/// One scripted fake outcome.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub struct FakeRun {
    pub output: String,
    pub exit_ok: bool,
    pub delay: Duration,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeRun {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit_ok: true,
            delay: Duration::ZERO,
        }
    }

    pub fn failed() -> Self {
        Self {
            output: String::new(),
            exit_ok: false,
            delay: Duration::ZERO,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeWorkerAdapter {
    fn default() -> Self {
        Self::with_responder(|_| FakeRun::ok("ok"))
    }
}

#[cfg(any(test, feature = "test-support"))]
impl FakeWorkerAdapter {
    pub fn with_responder(
        responder: impl Fn(&WorkerTask) -> FakeRun + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: std::sync::Arc::new(responder),
            calls: std::sync::Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    /// Every task this adapter has run, in call order.
    pub fn calls(&self) -> Vec<WorkerTask> {
        self.calls.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl WorkerAdapter for FakeWorkerAdapter {
    async fn run(
        &self,
        task: WorkerTask,
        _progress: Option<mpsc::Sender<WorkerProgress>>,
        cancel: CancellationToken,
    ) -> Result<WorkerOutput, WorkerError> {
        self.calls.lock().push(task.clone());
        let run = (self.responder)(&task);
        if !run.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
                _ = tokio::time::sleep(run.delay) => {}
            }
        }
        let (output, truncated) =
            truncate_output(&run.output, task.max_output_lines, task.max_output_bytes);
        Ok(WorkerOutput {
            agent_name: task.agent_name,
            output,
            truncated,
            exit_ok: run.exit_ok,
        })
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
