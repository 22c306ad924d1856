// src/watch/supervise.rs

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::watch::control::{Backoff, WatcherState};
use crate::watch::watcher::run_session;

/// Keep the directory watcher running while it is enabled.
///
/// The session itself publishes `Running` once its watch is registered; see
/// [`crate::watch::WatcherControl::wait_armed`].
///
/// A failed run is logged at ERROR and re-armed after an exponential backoff.
/// With `max_restarts > 0` the supervisor gives up after that many
/// consecutive failures and switches the watcher off; an operator can switch
/// it back on. Returns when `shutdown` fires.
pub async fn supervise(engine: Arc<Engine>, shutdown: CancellationToken) {
    let cfg = engine.config().watcher.clone();
    let control = engine.watcher();
    let mut enabled_rx = control.subscribe();
    let mut backoff = Backoff::new(cfg.backoff_initial, cfg.backoff_max);
    let mut failures: u32 = 0;

    loop {
        // Parked until switched on.
        while !*enabled_rx.borrow_and_update() {
            control.set_state(WatcherState::Stopped);
            tokio::select! {
                _ = shutdown.cancelled() => return,
                changed = enabled_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        let session_stop = shutdown.child_token();
        let started = Instant::now();
        let result = {
            let session = run_session(Arc::clone(&engine), session_stop.clone());
            tokio::pin!(session);
            loop {
                tokio::select! {
                    res = &mut session => break res,
                    changed = enabled_rx.changed() => {
                        if changed.is_err() || !*enabled_rx.borrow() {
                            session_stop.cancel();
                        }
                    }
                }
            }
        };

        if shutdown.is_cancelled() {
            control.set_state(WatcherState::Stopped);
            return;
        }

        let err = match result {
            Ok(()) => {
                // Switched off by an operator.
                control.set_state(WatcherState::Stopped);
                backoff.reset();
                failures = 0;
                continue;
            }
            Err(err) => err,
        };

        // A run that survived a full backoff cycle counts as healthy.
        if started.elapsed() >= cfg.backoff_max {
            backoff.reset();
            failures = 0;
        }
        failures += 1;
        error!(error = %err, failures, "directory watcher failed");

        if cfg.max_restarts > 0 && failures > cfg.max_restarts {
            error!(
                max_restarts = cfg.max_restarts,
                "directory watcher exceeded its restart limit; switching it off"
            );
            control.disable();
            control.set_state(WatcherState::Stopped);
            backoff.reset();
            failures = 0;
            continue;
        }

        control.set_state(WatcherState::Restarting);
        let delay = backoff.next_delay();
        warn!(delay_ms = delay.as_millis() as u64, "re-arming directory watcher after backoff");

        if !wait_backoff(delay, &shutdown, &mut enabled_rx).await {
            control.set_state(WatcherState::Stopped);
            return;
        }
        if control.is_enabled() {
            control.record_restart();
            info!(restarts = control.restarts(), "re-arming directory watcher");
        }
    }
}

/// Sleep for `delay`. Returns false if shutdown fired meanwhile.
///
/// Switching the watcher off during the wait is picked up by the caller's
/// enabled check.
async fn wait_backoff(
    delay: std::time::Duration,
    shutdown: &CancellationToken,
    enabled_rx: &mut watch::Receiver<bool>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return false,
            _ = &mut sleep => return true,
            changed = enabled_rx.changed() => {
                if changed.is_err() {
                    return false;
                }
                if !*enabled_rx.borrow() {
                    return true;
                }
            }
        }
    }
}
