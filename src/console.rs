// src/console.rs

//! Interactive operator console on stdin.
//!
//! One command per line; output goes to stdout so it does not mix with the
//! log on stderr.

use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::routes::status_text;
use crate::engine::Engine;
use crate::exec::LaunchOutcome;

pub const HELP: &str = "\
commands:
  list              artifacts in the watched directory
  entries <name>    archive entries of an artifact
  scan <name>       scan an artifact without launching it
  run <name>        scan and launch an artifact
  stop <name>       stop a running artifact
  status            jobs and watcher state
  watch on|off      switch the directory watcher
  help              this text
  exit              shut down";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Entries(String),
    Scan(String),
    Run(String),
    Stop(String),
    Status,
    Watch(bool),
    Help,
    Exit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            return Err("empty command".to_string());
        };
        let arg = words.next();
        if words.next().is_some() {
            return Err(format!("too many arguments for '{cmd}'"));
        }

        let named = |make: fn(String) -> ConsoleCommand| match arg {
            Some(name) => Ok(make(name.to_string())),
            None => Err(format!("usage: {} <name>", cmd.to_lowercase())),
        };
        let bare = |command: ConsoleCommand| match arg {
            None => Ok(command),
            Some(_) => Err(format!("'{}' takes no arguments", cmd.to_lowercase())),
        };

        match cmd.to_lowercase().as_str() {
            "list" | "ls" => bare(ConsoleCommand::List),
            "entries" => named(ConsoleCommand::Entries),
            "scan" => named(ConsoleCommand::Scan),
            "run" => named(ConsoleCommand::Run),
            "stop" => named(ConsoleCommand::Stop),
            "status" => bare(ConsoleCommand::Status),
            "watch" => match arg.map(str::to_lowercase).as_deref() {
                Some("on") => Ok(ConsoleCommand::Watch(true)),
                Some("off") => Ok(ConsoleCommand::Watch(false)),
                _ => Err("usage: watch on|off".to_string()),
            },
            "help" | "?" => bare(ConsoleCommand::Help),
            "exit" | "quit" => bare(ConsoleCommand::Exit),
            other => Err(format!("unknown command '{other}' (try 'help')")),
        }
    }
}

/// Run `cmd` and return the text to show the operator.
pub async fn execute(engine: &Engine, cmd: &ConsoleCommand) -> String {
    match cmd {
        ConsoleCommand::List => {
            let artifacts = engine.store().list_artifacts();
            if artifacts.is_empty() {
                return "(no artifacts)".to_string();
            }
            let mut out = String::new();
            for a in artifacts {
                let _ = writeln!(out, "{}  {} bytes  {}", a.name, a.size, a.modified.to_rfc3339());
            }
            out
        }
        ConsoleCommand::Entries(name) => match engine.entries(name).await {
            Ok(entries) => entries.join("\n"),
            Err(err) => format!("error: {err}"),
        },
        ConsoleCommand::Scan(name) => match engine.scan_named(name).await {
            Ok(findings) if findings.is_empty() => format!("{name}: clean"),
            Ok(findings) => {
                let mut out = format!("{name}: {} finding(s)\n", findings.len());
                for f in findings {
                    let _ = writeln!(
                        out,
                        "  {:?} {} ({})",
                        f.severity,
                        f.entry.as_deref().unwrap_or("-"),
                        f.signature
                    );
                }
                out
            }
            Err(err) => format!("error: {err}"),
        },
        ConsoleCommand::Run(name) => match engine.execute(name).await {
            Ok(LaunchOutcome::Accepted { job, .. }) => {
                format!("{name}: launch accepted (launch {})", job.launch_id)
            }
            Ok(LaunchOutcome::AlreadyActive(job)) => format!("{name}: already {}", job.state),
            Ok(LaunchOutcome::Rejected { reason }) => format!("{name}: rejected: {reason}"),
            Err(err) => format!("error: {err}"),
        },
        ConsoleCommand::Stop(name) => {
            if engine.stop(name).await {
                format!("{name}: stopped")
            } else {
                format!("{name}: not running")
            }
        }
        ConsoleCommand::Status => {
            let control = engine.watcher();
            let mut out = status_text(engine);
            if out.is_empty() {
                out.push_str("(no jobs)\n");
            }
            let _ = write!(
                out,
                "watcher {} (enabled: {}, restarts: {})",
                control.state(),
                control.is_enabled(),
                control.restarts()
            );
            out
        }
        ConsoleCommand::Watch(on) => {
            let control = engine.watcher();
            let changed = if *on { control.enable() } else { control.disable() };
            let state = if *on { "on" } else { "off" };
            if changed {
                format!("watcher switched {state}")
            } else {
                format!("watcher already {state}")
            }
        }
        ConsoleCommand::Help => HELP.to_string(),
        ConsoleCommand::Exit => "bye".to_string(),
    }
}

/// Read commands from `input` until `exit`, end of input, or shutdown.
pub async fn run_console<R, W>(
    engine: &Engine,
    input: R,
    mut output: W,
    shutdown: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output.write_all(b"jarwatch console; type 'help'\n").await?;
    output.flush().await?;

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("console input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let (reply, exit) = match line.parse::<ConsoleCommand>() {
            Ok(cmd) => (execute(engine, &cmd).await, cmd == ConsoleCommand::Exit),
            Err(err) => (err, false),
        };
        output.write_all(reply.trim_end().as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;

        if exit {
            break;
        }
    }
    Ok(())
}
