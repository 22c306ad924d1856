// src/config/mod.rs

//! Configuration loading and validation for jarwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate invariants the engine relies on (`validate.rs`).
//!
//! Configuration is read once at startup and never reloaded.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str, load_or_default};
pub use model::{
    ApiSection, ConfigFile, EngineSection, JournalSection, LaunchSection, RawConfigFile,
    ScannerSection, SchedulerSection, WatcherSection,
};
