// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `jarwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jarwatch",
    version,
    about = "Watch a directory for JARs, screen them and keep them running.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Jarwatch.toml` in the current working directory. A missing
    /// file means built-in defaults.
    #[arg(long, value_name = "PATH", default_value = "Jarwatch.toml")]
    pub config: String,

    /// Watch this directory instead of `[engine] watch_dir`.
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JARWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the effective config and the artifacts that would be launched,
    /// then exit without launching anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Launch everything present once, wait for the processes to exit, then
    /// exit. No watcher, scheduler or API.
    #[arg(long, conflicts_with = "interactive")]
    pub once: bool,

    /// Read operator commands from stdin.
    #[arg(long)]
    pub interactive: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The level as a filter directive.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
