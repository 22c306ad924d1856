// src/watch/mod.rs

//! Directory watching.
//!
//! - [`watcher`] wires `notify` to an async loop for one run of the watch.
//! - [`event_handler`] turns each event into a launch, restart or removal.
//! - [`supervise`] keeps re-arming the watcher with backoff while enabled.
//! - [`control`] is the operator switch and observable state.
//! - [`hash`] tracks artifact content so duplicate modify events are ignored.

pub mod control;
pub mod event_handler;
pub mod hash;
pub mod supervise;
pub mod watcher;

pub use control::{Backoff, WatcherControl, WatcherState};
pub use hash::{compute_file_hash, ContentTracker};
pub use supervise::supervise;
pub use watcher::{is_fatal, run_session};
