// src/api/routes.rs

use serde::Serialize;
use tracing::debug;

use crate::api::http::{Method, Request, Response};
use crate::engine::Engine;
use crate::errors::JarwatchError;
use crate::exec::LaunchOutcome;
use crate::watch::WatcherState;

#[derive(Debug, Serialize)]
struct WatcherStatus {
    enabled: bool,
    state: WatcherState,
    restarts: u32,
}

#[derive(Debug, Serialize)]
struct StopResponse<'a> {
    artifact: &'a str,
    stopped: bool,
}

/// Dispatch one request against the engine.
pub async fn route(engine: &Engine, req: &Request) -> Response {
    let segments: Vec<&str> = req.segments.iter().map(String::as_str).collect();

    match (req.method, segments.as_slice()) {
        (Method::Get, ["status"]) => Response::json(200, &engine.status()),
        (Method::Get, ["status.txt"]) => Response::text(200, status_text(engine)),
        (Method::Get, ["artifacts"]) => Response::json(200, &engine.store().list_artifacts()),
        (Method::Get, ["watcher"]) => Response::json(200, &watcher_status(engine)),
        (Method::Post, ["execute", name]) => execute(engine, name).await,
        (Method::Post, ["stop", name]) => stop(engine, name).await,
        (Method::Post, ["watcher", "on"]) => {
            engine.watcher().enable();
            Response::json(200, &watcher_status(engine))
        }
        (Method::Post, ["watcher", "off"]) => {
            engine.watcher().disable();
            Response::json(200, &watcher_status(engine))
        }
        (_, segments) if is_known(segments) => {
            Response::error(405, &format!("method not allowed for {}", req.path))
        }
        _ => Response::error(404, &format!("no route for {}", req.path)),
    }
}

fn is_known(segments: &[&str]) -> bool {
    matches!(
        segments,
        ["status"]
            | ["status.txt"]
            | ["artifacts"]
            | ["watcher"]
            | ["execute", _]
            | ["stop", _]
            | ["watcher", "on" | "off"]
    )
}

/// One `name STATE` line per job.
pub fn status_text(engine: &Engine) -> String {
    engine
        .status()
        .iter()
        .map(|job| format!("{} {}\n", job.artifact, job.state))
        .collect()
}

fn watcher_status(engine: &Engine) -> WatcherStatus {
    let control = engine.watcher();
    WatcherStatus {
        enabled: control.is_enabled(),
        state: control.state(),
        restarts: control.restarts(),
    }
}

async fn execute(engine: &Engine, name: &str) -> Response {
    match engine.execute(name).await {
        Ok(LaunchOutcome::Accepted { job, .. }) => Response::json(202, &job),
        Ok(LaunchOutcome::AlreadyActive(job)) => Response::json(200, &job),
        Ok(LaunchOutcome::Rejected { reason }) => Response::error(409, &reason),
        Err(err @ JarwatchError::ArtifactNotFound(_)) => Response::error(404, &err.to_string()),
        Err(err) => {
            debug!(artifact = name, error = %err, "execute failed");
            Response::error(500, &err.to_string())
        }
    }
}

async fn stop(engine: &Engine, name: &str) -> Response {
    if engine.stop(name).await {
        Response::json(
            200,
            &StopResponse {
                artifact: name,
                stopped: true,
            },
        )
    } else {
        Response::error(404, &format!("{name} is not running"))
    }
}
