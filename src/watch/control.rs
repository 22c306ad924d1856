// src/watch/control.rs

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

/// Observable state of the directory watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatcherState {
    Stopped,
    Running,
    /// Last run failed; waiting out the backoff before re-arming.
    Restarting,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatcherState::Stopped => "STOPPED",
            WatcherState::Running => "RUNNING",
            WatcherState::Restarting => "RESTARTING",
        };
        f.write_str(s)
    }
}

/// Operator switch plus status for the watcher supervisor.
///
/// The supervisor task reads the switch through [`WatcherControl::subscribe`]
/// and publishes its state back with `set_state`. `Running` is only published
/// once the directory watch is registered.
#[derive(Debug)]
pub struct WatcherControl {
    enabled: watch::Sender<bool>,
    state: watch::Sender<WatcherState>,
    restarts: AtomicU32,
}

impl WatcherControl {
    pub fn new(enabled: bool) -> Self {
        let (enabled, _) = watch::channel(enabled);
        let (state, _) = watch::channel(WatcherState::Stopped);
        Self {
            enabled,
            state,
            restarts: AtomicU32::new(0),
        }
    }

    /// Turn the watcher on. Returns false if it already was.
    pub fn enable(&self) -> bool {
        self.enabled.send_if_modified(|on| !std::mem::replace(on, true))
    }

    /// Turn the watcher off. Returns false if it already was.
    pub fn disable(&self) -> bool {
        self.enabled.send_if_modified(|on| std::mem::replace(on, false))
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.enabled.subscribe()
    }

    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, state: WatcherState) {
        self.state.send_replace(state);
    }

    /// Wait until the supervisor has either registered the watch or failed
    /// its first attempt. Returns true only in the first case.
    ///
    /// Returns false at once when the watcher is switched off, and after
    /// `timeout` if neither happened.
    pub async fn wait_armed(&self, timeout: Duration) -> bool {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(|state| match state {
            WatcherState::Running | WatcherState::Restarting => true,
            WatcherState::Stopped => !self.is_enabled(),
        });
        matches!(
            tokio::time::timeout(timeout, settled).await,
            Ok(Ok(state)) if *state == WatcherState::Running
        )
    }

    /// How many times the watcher has been re-armed after a failure.
    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::Relaxed)
    }

    pub(crate) fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }
}

/// Exponential backoff: `initial`, doubling per failure, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial.min(max),
        }
    }

    /// Delay to wait now; doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial.min(self.max);
    }
}

