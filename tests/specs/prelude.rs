//! Shared fixtures for the behavioral specs.

#![allow(dead_code)]

use pim_core::{MessengerConfig, SystemClock};
use pim_crew::FakeWorkerAdapter;
use pim_dispatch::{Arrival, MessengerSession, SessionSetup};
use pim_store::Layout;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub type Session = MessengerSession<SystemClock, FakeWorkerAdapter>;

/// One workstation: a shared base directory plus a project directory.
pub struct TestMesh {
    pub dir: tempfile::TempDir,
    pub layout: Layout,
}

impl TestMesh {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::with_roots(
            dir.path().join("base"),
            dir.path().join("project/.pi/messenger"),
        );
        Self { dir, layout }
    }

    pub fn cwd(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    /// A session pre-wired with a forced name and the fake worker adapter.
    pub fn session(&self, name: &str) -> Session {
        self.session_with(name, FakeWorkerAdapter::default(), MessengerConfig::default())
    }

    pub fn session_with(
        &self,
        name: &str,
        adapter: FakeWorkerAdapter,
        config: MessengerConfig,
    ) -> Session {
        let mut setup = SessionSetup::new(self.cwd());
        setup.forced_name = Some(name.to_string());
        setup.model = "opus".to_string();
        MessengerSession::with_layout(setup, self.layout.clone(), config, SystemClock, adapter)
    }
}

/// Dispatch a JSON record and return the reply.
pub async fn call(session: &Session, record: Value) -> pim_dispatch::Reply {
    session.dispatch(&record).await
}

/// Wait for the next delivered message, failing the test on timeout.
pub async fn next_arrival(rx: &mut UnboundedReceiver<Arrival>) -> Arrival {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a delivery")
        .expect("arrival channel closed")
}
