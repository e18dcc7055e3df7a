// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::fs::PermissionsExt;

fn script_adapter(dir: &tempfile::TempDir, body: &str) -> ProcessWorkerAdapter {
    let script = dir.path().join("fake-host.sh");
    std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    let layout = Layout::with_roots(dir.path().join("base"), dir.path().join("project"));
    ProcessWorkerAdapter::new(layout, script.to_string_lossy())
}

#[tokio::test]
async fn process_worker_captures_text_from_the_stream() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = script_adapter(
        &dir,
        r#"echo '{"text":"hello"}'
echo '{"text":"world"}'"#,
    );

    let output = adapter
        .run(
            WorkerTask::new("scout-1", "look around"),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(output.exit_ok);
    assert_eq!(output.output, "hello\nworld");
    assert!(!output.truncated);
}

#[tokio::test]
async fn process_worker_reports_exit_failure() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = script_adapter(&dir, "echo '{\"text\":\"boom\"}'\nexit 3");

    let output = adapter
        .run(
            WorkerTask::new("w", "p"),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(!output.exit_ok);
    assert_eq!(output.output, "boom");
}

#[tokio::test]
async fn process_worker_forwards_progress_events() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = script_adapter(&dir, r#"echo '{"step":"reading","text":"x"}'"#);
    let (tx, mut rx) = mpsc::channel(8);

    adapter
        .run(
            WorkerTask::new("w", "p"),
            Some(tx),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let progress = rx.recv().await.unwrap();
    assert_eq!(progress.agent_name, "w");
    assert_eq!(progress.event["step"], "reading");
}

#[tokio::test]
async fn cancellation_runs_the_shutdown_ladder() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = script_adapter(&dir, "sleep 60").with_shutdown_grace(Duration::from_millis(100));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let started = std::time::Instant::now();
    let result = adapter
        .run(WorkerTask::new("slow", "p"), None, cancel)
        .await;

    assert!(matches!(result, Err(WorkerError::Cancelled)));
    // Steer + short grace + SIGTERM; nowhere near the 60 s sleep.
    assert!(started.elapsed() < Duration::from_secs(10));

    // The wrap-up steer message landed in the worker's inbox.
    let layout = Layout::with_roots(dir.path().join("base"), dir.path().join("project"));
    let steers = std::fs::read_dir(layout.inbox_dir("slow")).unwrap().count();
    assert_eq!(steers, 1);
}

#[tokio::test]
async fn artifacts_are_recorded_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = script_adapter(&dir, r#"echo '{"text":"result"}'"#);
    let artifacts = dir.path().join("artifacts/run-1");

    let mut task = WorkerTask::new("w", "the prompt");
    task.artifacts_dir = Some(artifacts.clone());
    adapter.run(task, None, CancellationToken::new()).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(artifacts.join("prompt.md")).unwrap(),
        "the prompt"
    );
    assert_eq!(
        std::fs::read_to_string(artifacts.join("output.txt")).unwrap(),
        "result"
    );
    assert!(artifacts.join("stream.jsonl").exists());
    assert!(artifacts.join("meta.json").exists());
}

#[tokio::test]
async fn run_all_keeps_input_order_in_results() {
    let adapter =
        FakeWorkerAdapter::with_responder(|task| FakeRun::ok(format!("out:{}", task.agent_name)));

    let tasks: Vec<_> = (0..6)
        .map(|i| WorkerTask::new(format!("w{i}"), "p"))
        .collect();
    let results = run_all(&adapter, tasks, 2, &CancellationToken::new()).await;

    assert_eq!(results.len(), 6);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.as_ref().unwrap().output, format!("out:w{i}"));
    }
}

#[tokio::test]
async fn fake_adapter_records_calls() {
    let adapter = FakeWorkerAdapter::default();
    adapter
        .run(WorkerTask::new("a", "p1"), None, CancellationToken::new())
        .await
        .unwrap();
    adapter
        .run(WorkerTask::new("b", "p2"), None, CancellationToken::new())
        .await
        .unwrap();

    let calls = adapter.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].prompt, "p1");
}
