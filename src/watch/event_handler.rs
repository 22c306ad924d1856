// src/watch/event_handler.rs

//! Turning notify events into engine actions.

use std::path::Path;

use notify::{Event, EventKind};
use tracing::{debug, trace};

use crate::engine::Engine;
use crate::errors::{JarwatchError, Result};

/// Process one notify event.
///
/// Per-path failures are handled (and logged) by the engine; the only error
/// returned here is the loss of the watched directory itself, which ends the
/// watcher run.
pub async fn handle_event(engine: &Engine, event: &Event) -> Result<()> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
        _ => {
            trace!(?event, "ignoring event kind");
            return Ok(());
        }
    }

    let dir = engine.store().dir();
    for path in &event.paths {
        if path == dir {
            if !engine.store().fs().is_dir(dir) {
                return Err(JarwatchError::Watch(
                    notify::Error::path_not_found().add_path(dir.to_path_buf()),
                ));
            }
            continue;
        }
        process_path(engine, path).await;
    }
    Ok(())
}

/// Reconcile one path with the registry.
///
/// The decision is made from what is on disk now, not from the event kind:
/// an existing candidate is (re)launched as needed, a missing one is stopped
/// and forgotten. This also covers renames in either direction.
pub async fn process_path(engine: &Engine, path: &Path) {
    let store = engine.store();
    let Some(name) = store.candidate_name(path) else {
        trace!(?path, "not an artifact; ignoring");
        return;
    };

    match store.artifact_at(path) {
        Some(artifact) => {
            debug!(artifact = %name, "artifact created or modified");
            engine.handle_changed(&artifact).await;
        }
        None => {
            debug!(artifact = %name, "artifact gone");
            engine.handle_removed(&name).await;
        }
    }
}
