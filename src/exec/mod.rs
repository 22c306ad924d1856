// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] renders the `[launch]` template into a `tokio::process::Command`.
//! - [`launcher`] is the public entry point: claim, queue, stop, restart.
//! - [`pool`] owns the fixed set of workers that perform the spawns.
//! - [`supervisor`] watches one running process until it exits or is stopped.

pub mod command;
pub mod launcher;
pub mod pool;
pub mod supervisor;

pub use command::CommandTemplate;
pub use launcher::{LaunchOutcome, Launcher, SpawnTicket};
pub use pool::{LaunchRequest, WorkerContext, WorkerPool};
pub use supervisor::{StopOutcome, StopRequest};
