// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session state and the dispatch entry point
//!
//! One `MessengerSession` per host process. Everything the source kept in
//! process-wide singletons (overlay handles, exchange deques, timers)
//! lives here explicitly, owned by the session and torn down by
//! `shutdown`.

use crate::action::Action;
use crate::reply::Reply;
use parking_lot::Mutex;
use pim_core::{Clock, FeedEvent, FeedKind, Message, MessengerConfig, SessionId};
use pim_crew::{Crew, WorkerAdapter};
use pim_mesh::{
    activity::spawn_flush_task, start_watcher, ActivityTracker, ChatHistory, DeliveryHandler,
    Inbox, NamePool, Registry, WatcherHandle,
};
use pim_store::{ClaimsStore, FeedLog, Layout};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Environment variable forcing the agent name.
pub const AGENT_NAME_ENV: &str = "PI_AGENT_NAME";

/// Host-facing record of one delivered message.
#[derive(Debug, Clone)]
pub struct Arrival {
    pub message: Message,
    /// Treat the text as steering input and wake the host agent.
    pub wake: bool,
    /// Suppression note appended when wake is withheld.
    pub note: Option<String>,
    /// Sender location/model line, on first contact of a new session.
    pub sender_info: Option<String>,
}

/// Construction parameters for a session.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub cwd: PathBuf,
    pub model: String,
    pub is_human: bool,
    /// Command used to spawn crew workers.
    pub host_cmd: String,
    /// Name override; defaults to `PI_AGENT_NAME` when unset.
    pub forced_name: Option<String>,
}

impl SessionSetup {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            model: "unknown".to_string(),
            is_human: false,
            host_cmd: "pi".to_string(),
            forced_name: std::env::var(AGENT_NAME_ENV).ok().filter(|s| !s.is_empty()),
        }
    }
}

pub(crate) struct SessionState {
    pub name: Option<String>,
    pub spec: Option<String>,
    pub watcher: Option<WatcherHandle>,
    pub drain_task: Option<tokio::task::JoinHandle<()>>,
    pub flush_task: Option<tokio::task::JoinHandle<()>>,
}

/// One host process's connection to the mesh.
pub struct MessengerSession<C: Clock, W: WorkerAdapter> {
    pub(crate) clock: C,
    pub(crate) layout: Layout,
    pub(crate) config: MessengerConfig,
    pub(crate) setup: SessionSetup,
    pub(crate) session_id: SessionId,
    pub(crate) registry: Registry<C>,
    pub(crate) claims: ClaimsStore<C>,
    pub(crate) feed: FeedLog,
    pub(crate) crew: Crew<C>,
    pub(crate) adapter: W,
    pub(crate) history: Arc<ChatHistory<C>>,
    pub(crate) tracker: Arc<ActivityTracker<C>>,
    pub(crate) state: Mutex<SessionState>,
    pub(crate) cancel: CancellationToken,
    arrivals_tx: mpsc::UnboundedSender<Arrival>,
    arrivals_rx: Mutex<Option<mpsc::UnboundedReceiver<Arrival>>>,
}

impl<C: Clock + 'static, W: WorkerAdapter> MessengerSession<C, W> {
    /// Build a session over an explicit layout (tests and embedders).
    pub fn with_layout(
        setup: SessionSetup,
        layout: Layout,
        config: MessengerConfig,
        clock: C,
        adapter: W,
    ) -> Self {
        let registry = Registry::new(
            layout.clone(),
            clock.clone(),
            setup.cwd.clone(),
            config.scope_to_folder,
        );
        let claims = ClaimsStore::new(layout.clone(), clock.clone());
        let feed = FeedLog::new(layout.feed_path(), config.feed_retention);
        let crew = Crew::new(layout.clone(), clock.clone(), setup.cwd.clone());
        let history = Arc::new(ChatHistory::new(clock.clone()));
        let tracker = Arc::new(ActivityTracker::new(clock.clone(), config.auto_status));
        let (arrivals_tx, arrivals_rx) = mpsc::unbounded_channel();
        Self {
            clock,
            layout,
            config,
            setup,
            session_id: SessionId::generate(),
            registry,
            claims,
            feed,
            crew,
            adapter,
            history,
            tracker,
            state: Mutex::new(SessionState {
                name: None,
                spec: None,
                watcher: None,
                drain_task: None,
                flush_task: None,
            }),
            cancel: CancellationToken::new(),
            arrivals_tx,
            arrivals_rx: Mutex::new(Some(arrivals_rx)),
        }
    }

    /// Build a session with the standard layout and merged configuration.
    pub fn discover(setup: SessionSetup, clock: C, adapter: W) -> Self {
        let layout = Layout::discover(&setup.cwd);
        let config = crate::config::load_config(&setup.cwd);
        Self::with_layout(setup, layout, config, clock, adapter)
    }

    /// The receiver of delivered messages; the host owns it after taking.
    pub fn take_arrivals(&self) -> Option<mpsc::UnboundedReceiver<Arrival>> {
        self.arrivals_rx.lock().take()
    }

    /// Feed a host tool event into the activity tracker. The debounced
    /// flusher folds it into the presence record.
    pub fn record_event(&self, event: pim_mesh::SessionEvent) {
        self.tracker.record(event);
    }

    /// Registered name, when joined.
    pub fn name(&self) -> Option<String> {
        self.state.lock().name.clone()
    }

    pub fn config(&self) -> &MessengerConfig {
        &self.config
    }

    /// The dispatch entry point: one tool record in, one reply out.
    pub async fn dispatch(&self, record: &Value) -> Reply {
        let action = match Action::parse(record) {
            Ok(action) => action,
            Err(failure) => {
                let mode = record
                    .get("action")
                    .and_then(Value::as_str)
                    .unwrap_or("status");
                return Reply::error(mode, failure.kind, failure.text);
            }
        };
        tracing::debug!(mode = action.mode(), "dispatching");
        self.handle(action).await
    }

    /// Append a feed event, logging write failures instead of failing the
    /// action.
    pub(crate) fn feed_event(&self, kind: FeedKind, target: Option<&str>, preview: Option<&str>) {
        let agent = self
            .name()
            .unwrap_or_else(|| format!("pid-{}", std::process::id()));
        let mut event = FeedEvent::new(self.clock.timestamp(), agent, kind);
        event.target = target.map(str::to_string);
        event.preview = preview.map(truncate_preview);
        if let Err(e) = self.feed.append(&event) {
            tracing::debug!(error = %e, "feed append failed");
        }
    }

    /// Spec paths are absolutized against the session cwd on write and
    /// compared as opaque strings on read.
    pub(crate) fn canonical_spec(&self, spec: &str) -> String {
        let path = Path::new(spec);
        if path.is_absolute() {
            spec.to_string()
        } else {
            self.setup.cwd.join(path).to_string_lossy().into_owned()
        }
    }

    /// The spec for swarm actions: explicit argument, else session spec.
    pub(crate) fn resolve_spec(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(|s| self.canonical_spec(s))
            .or_else(|| self.state.lock().spec.clone())
    }

    pub(crate) fn claimant(&self) -> Option<pim_store::Claimant> {
        let name = self.state.lock().name.clone()?;
        Some(pim_store::Claimant {
            agent: name,
            session_id: self.session_id.clone(),
            pid: std::process::id(),
        })
    }

    /// Join the mesh: register, start the inbox watcher and the activity
    /// flusher.
    pub(crate) fn start_background(&self, name: &str) {
        let (fire_tx, mut fire_rx) = mpsc::channel(8);
        let watcher = start_watcher(self.layout.inbox_dir(name), fire_tx);

        let inbox = Inbox::new(self.layout.clone(), self.clock.clone(), name);
        let handler: Arc<dyn DeliveryHandler> = Arc::new(SessionDelivery {
            registry: self.registry.clone(),
            history: self.history.clone(),
            arrivals_tx: self.arrivals_tx.clone(),
            sender_details: self.config.sender_details_on_first_contact,
        });
        let drain_task = tokio::spawn(async move {
            while let Some(()) = fire_rx.recv().await {
                inbox.drain(handler.as_ref()).await;
            }
        });

        let flush_task = spawn_flush_task(
            self.tracker.clone(),
            self.registry.clone(),
            name.to_string(),
            self.cancel.clone(),
        );

        let mut state = self.state.lock();
        state.watcher = Some(watcher);
        state.drain_task = Some(drain_task);
        state.flush_task = Some(flush_task);
    }

    /// Leave the mesh and stop background tasks.
    pub async fn shutdown(&self) {
        let (name, watcher, drain_task, flush_task) = {
            let mut state = self.state.lock();
            (
                state.name.take(),
                state.watcher.take(),
                state.drain_task.take(),
                state.flush_task.take(),
            )
        };
        self.cancel.cancel();
        if let Some(watcher) = watcher {
            watcher.shutdown();
        }
        if let Some(task) = drain_task {
            task.abort();
        }
        if let Some(task) = flush_task {
            task.abort();
        }
        if let Some(name) = name {
            if let Err(e) = self.claims.release_agent(&name, None).await {
                tracing::debug!(error = %e, "claim cleanup failed on shutdown");
            }
            self.registry.unregister(&name);
            let event = FeedEvent::new(self.clock.timestamp(), name, FeedKind::Leave);
            if let Err(e) = self.feed.append(&event) {
                tracing::debug!(error = %e, "feed append failed");
            }
        }
    }

    pub(crate) fn name_pool(&self) -> NamePool {
        NamePool::from_config(self.config.name_words.as_ref())
    }
}

fn truncate_preview(text: &str) -> String {
    const PREVIEW_MAX: usize = 80;
    if text.len() <= PREVIEW_MAX {
        text.to_string()
    } else {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < PREVIEW_MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &text[..cut])
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

struct SessionDelivery<C: Clock> {
    registry: Registry<C>,
    history: Arc<ChatHistory<C>>,
    arrivals_tx: mpsc::UnboundedSender<Arrival>,
    sender_details: bool,
}

#[async_trait::async_trait]
impl<C: Clock> DeliveryHandler for SessionDelivery<C> {
    async fn deliver(&self, message: Message) {
        let sender = self.registry.get(&message.from);
        let delivered = self
            .history
            .record_incoming(message, sender.as_ref().map(|r| &r.session_id));
        let sender_info = if delivered.first_contact && self.sender_details {
            sender.map(|r| {
                format!(
                    "{} · {} · {}",
                    r.name,
                    r.cwd.display(),
                    r.model,
                )
            })
        } else {
            None
        };
        let _ = self.arrivals_tx.send(Arrival {
            message: delivered.message,
            wake: delivered.wake,
            note: delivered.note,
            sender_info,
        });
    }
}
