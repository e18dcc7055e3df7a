// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pim - Pi Messenger CLI
//!
//! A thin host shim around the dispatcher: one JSON action record in, one
//! `{text, details}` reply out. With `--watch`, the process stays joined
//! and prints delivered messages until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use pim_core::SystemClock;
use pim_crew::ProcessWorkerAdapter;
use pim_dispatch::{Arrival, MessengerSession, SessionSetup};
use serde_json::{json, Value};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pim",
    version,
    about = "Pi Messenger - file-based coordination for coding agents"
)]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Model label written into the presence record
    #[arg(long, default_value = "unknown")]
    model: String,

    /// Command used to spawn crew workers
    #[arg(long = "host-cmd", default_value = "pi")]
    host_cmd: String,

    /// Stay joined after the action and print incoming messages
    #[arg(long)]
    watch: bool,

    /// Pretty-print the reply JSON
    #[arg(long)]
    pretty: bool,

    /// The action record as JSON; reads stdin when omitted
    record: Option<String>,
}

fn read_record(arg: Option<String>) -> Result<Value> {
    let raw = match arg {
        Some(raw) => raw,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading action record from stdin")?;
            buffer
        }
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(trimmed).context("parsing action record")
}

fn print_arrival(arrival: &Arrival) {
    if let Some(info) = &arrival.sender_info {
        println!("[{}]", info);
    }
    let wake = if arrival.wake { "" } else { " (no wake)" };
    println!("{}{wake}: {}", arrival.message.from, arrival.message.text);
    if let Some(note) = &arrival.note {
        println!("{note}");
    }
}

#[cfg(test)]
mod tests {
    use super::read_record;
    use serde_json::json;

    #[test]
    fn record_arg_parses_as_json() {
        let record = read_record(Some(r#"{"action":"status"}"#.to_string())).unwrap();
        assert_eq!(record, json!({ "action": "status" }));
    }

    #[test]
    fn empty_arg_is_a_status_query() {
        assert_eq!(read_record(Some("  ".to_string())).unwrap(), json!({}));
    }

    #[test]
    fn malformed_arg_is_rejected() {
        assert!(read_record(Some("{not json".to_string())).is_err());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)
            .with_context(|| format!("changing directory to {}", dir.display()))?;
    }
    let cwd = std::env::current_dir().context("resolving working directory")?;

    let record = read_record(cli.record)?;

    let mut setup = SessionSetup::new(cwd);
    setup.model = cli.model;
    setup.host_cmd = cli.host_cmd.clone();
    let layout = pim_store::Layout::discover(&setup.cwd);
    let adapter = ProcessWorkerAdapter::new(layout, cli.host_cmd);
    let cwd_for_match = setup.cwd.clone();
    let session = MessengerSession::discover(setup, SystemClock, adapter);

    // A bare invocation in an auto-register folder joins the mesh, so a
    // host that merely starts here comes up reachable.
    let record = if record.as_object().is_some_and(|o| o.is_empty())
        && session.config().auto_register
        && dirs::home_dir()
            .is_some_and(|home| session.config().auto_register_matches(&cwd_for_match, &home))
    {
        json!({ "action": "join" })
    } else {
        record
    };

    let mut arrivals = session.take_arrivals();
    let reply = session.dispatch(&record).await;
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&reply)?
    } else {
        serde_json::to_string(&reply)?
    };
    println!("{rendered}");

    if cli.watch && session.name().is_some() {
        tracing::info!("watching for messages; press Ctrl-C to leave");
        if let Some(arrivals) = &mut arrivals {
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    arrival = arrivals.recv() => match arrival {
                        Some(arrival) => print_arrival(&arrival),
                        None => break,
                    }
                }
            }
        } else {
            let _ = tokio::signal::ctrl_c().await;
        }
        session.shutdown().await;
    }

    Ok(())
}
