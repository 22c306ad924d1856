// src/watch/watcher.rs

use std::sync::Arc;

use notify::{Config, ErrorKind, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::errors::{JarwatchError, Result};
use crate::watch::control::WatcherState;
use crate::watch::event_handler::handle_event;

/// Watch the engine's directory until `stop` fires or the event source fails.
///
/// Returns `Ok(())` when stopped on request. An error means the watch can no
/// longer deliver events (directory gone, watch limit reached) and the caller
/// should re-arm it later.
pub async fn run_session(engine: Arc<Engine>, stop: CancellationToken) -> Result<()> {
    let dir = engine.store().dir().to_path_buf();

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            // The receiver is gone once the session ended; nothing to do then.
            let _ = event_tx.send(res);
        },
        Config::default(),
    )?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    engine.watcher().set_state(WatcherState::Running);

    info!(dir = ?dir, "directory watcher started");

    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                info!(dir = ?dir, "directory watcher stopped");
                return Ok(());
            }

            msg = event_rx.recv() => match msg {
                Some(Ok(event)) => {
                    debug!(?event, "received notify event");
                    handle_event(&engine, &event).await?;
                }
                Some(Err(err)) if is_fatal(&err) => {
                    return Err(JarwatchError::Watch(err));
                }
                Some(Err(err)) => {
                    warn!(error = %err, "file watch error; continuing");
                }
                None => {
                    return Err(JarwatchError::Other(anyhow::anyhow!(
                        "notify event source closed"
                    )));
                }
            }
        }
    }
}

/// Errors after which the watch delivers nothing more.
pub fn is_fatal(err: &notify::Error) -> bool {
    match &err.kind {
        ErrorKind::PathNotFound
        | ErrorKind::WatchNotFound
        | ErrorKind::MaxFilesWatch
        | ErrorKind::InvalidConfig(_) => true,
        ErrorKind::Io(io) => io.kind() == std::io::ErrorKind::NotFound,
        _ => false,
    }
}
