// src/engine/mod.rs

//! Engine context for jarwatch.
//!
//! There is no global state: everything the watcher, the scheduler, the
//! control API and the console share lives in one [`Engine`]:
//! - the artifact store and security scanner
//! - the process registry and the launcher in front of the worker pool
//! - the operation journal
//! - the watcher on/off switch
//! - the shutdown token
//!
//! The decision rules on the scan → launch path are pure functions in
//! [`pipeline`]; [`context`] does the IO around them.

pub mod context;
pub mod pipeline;

pub use context::Engine;
pub use pipeline::{blocking_findings, change_action, ChangeAction};
