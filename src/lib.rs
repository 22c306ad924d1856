// src/lib.rs

pub mod api;
pub mod cli;
pub mod config;
pub mod console;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod journal;
pub mod logging;
pub mod registry;
pub mod scan;
pub mod schedule;
pub mod store;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::api::ControlApi;
use crate::cli::CliArgs;
use crate::config::model::ConfigFile;
use crate::config::{default_config_path, load_and_validate, load_or_default};
use crate::engine::Engine;
use crate::fs::{FileSystem, RealFileSystem};
use crate::schedule::Scheduler;
use crate::scan::SecurityScanner;
use crate::store::ArtifactStore;

/// How often `--once` checks whether every launched process has exited.
const IDLE_POLL: Duration = Duration::from_millis(200);
const WATCH_ARM_TIMEOUT: Duration = Duration::from_secs(5);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ `--dir` override)
/// - the engine and its bootstrap sweep
/// - directory watcher, scheduler and control API
/// - the optional console
/// - Ctrl-C handling and graceful shutdown
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = if config_path == default_config_path() {
        load_or_default(&config_path)?
    } else {
        load_and_validate(&config_path)
            .with_context(|| format!("loading config {:?}", config_path))?
    };
    if let Some(dir) = &args.dir {
        cfg.engine.watch_dir = dir.clone();
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    if args.dry_run {
        return print_dry_run(&cfg, fs);
    }

    let engine = Engine::new(cfg, fs)?;

    if args.once {
        return run_once(&engine).await;
    }

    let token = engine.shutdown_token().clone();
    let mut tasks = JoinSet::new();

    // Arm the watch first so nothing published during the sweep is missed.
    tasks.spawn(watch::supervise(Arc::clone(&engine), token.child_token()));
    if engine.watcher().is_enabled() && !engine.watcher().wait_armed(WATCH_ARM_TIMEOUT).await {
        warn!("directory watcher not armed before the startup sweep");
    }
    engine.bootstrap().await;

    let scheduler = Scheduler::new(Arc::clone(&engine));
    if scheduler.is_enabled() {
        tasks.spawn(scheduler.run(token.child_token()));
    } else {
        info!("scheduler disabled (interval = 0)");
    }

    if engine.config().api.enabled {
        let api = ControlApi::bind(Arc::clone(&engine), &engine.config().api.bind).await?;
        tasks.spawn(api.serve(token.child_token()));
    }

    if args.interactive {
        let stdin = BufReader::new(tokio::io::stdin());
        tokio::select! {
            res = console::run_console(&engine, stdin, tokio::io::stdout(), token.clone()) => {
                if let Err(err) = res {
                    warn!(error = %format!("{err:#}"), "console ended with error");
                }
            }
            res = tokio::signal::ctrl_c() => res.context("listening for Ctrl+C")?,
        }
    } else {
        tokio::signal::ctrl_c()
            .await
            .context("listening for Ctrl+C")?;
    }

    info!("shutdown requested");
    engine.shutdown().await;

    while let Some(res) = tasks.join_next().await {
        if let Err(err) = res {
            warn!(error = %err, "background task ended abnormally");
        }
    }
    Ok(())
}

/// `--once`: launch what is there, wait for every process to exit, shut down.
async fn run_once(engine: &Engine) -> Result<()> {
    let outcomes = engine.bootstrap().await;
    let mut jobs = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        if let Some(job) = outcome.settle().await {
            jobs.push(job);
        }
    }
    info!(launched = jobs.len(), "waiting for launched processes to exit");

    tokio::select! {
        _ = engine.wait_idle(IDLE_POLL) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("listening for Ctrl+C")?;
            info!("interrupted; stopping processes");
        }
    }
    engine.shutdown().await;

    for job in engine.status() {
        info!(
            artifact = %job.artifact,
            state = %job.state,
            exit_code = ?job.exit_code,
            "final state"
        );
    }
    Ok(())
}

/// Print the effective config and what would be launched.
fn print_dry_run(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Result<()> {
    let store = ArtifactStore::from_config(cfg, Arc::clone(&fs))?;
    let scanner = SecurityScanner::from_config(cfg, fs)?;

    println!("jarwatch dry-run");
    println!("  engine.watch_dir = {:?}", store.dir());
    println!("  engine.patterns = {:?}", cfg.engine.patterns);
    if !cfg.engine.exclude.is_empty() {
        println!("  engine.exclude = {:?}", cfg.engine.exclude);
    }
    println!(
        "  engine.workers = {} (queue {})",
        cfg.engine.workers, cfg.engine.queue_capacity
    );
    println!("  engine.launch_on_startup = {}", cfg.engine.launch_on_startup);
    println!("  launch.command = {:?}", cfg.launch.command);
    if !cfg.launch.args.is_empty() {
        println!("  launch.args = {:?}", cfg.launch.args);
    }
    println!("  launch.working_dir = {:?}", cfg.effective_working_dir());
    println!("  launch.stop_grace = {:?}", cfg.launch.stop_grace);
    println!("  launch.restart_on_change = {}", cfg.launch.restart_on_change);
    println!(
        "  scanner.policy = {:?} ({} deny entries, {} regexes)",
        cfg.scanner.policy,
        cfg.scanner.deny.len(),
        cfg.scanner.deny_regex.len()
    );
    if cfg.scheduler.interval.is_zero() {
        println!("  scheduler = disabled");
    } else {
        println!(
            "  scheduler = every {:?}, target {}",
            cfg.scheduler.interval, cfg.scheduler.target
        );
    }
    println!(
        "  watcher.enabled = {} (backoff {:?}..{:?}, max_restarts {})",
        cfg.watcher.enabled,
        cfg.watcher.backoff_initial,
        cfg.watcher.backoff_max,
        cfg.watcher.max_restarts
    );
    if cfg.api.enabled {
        println!("  api.bind = {}", cfg.api.bind);
    } else {
        println!("  api = disabled");
    }
    if let Some(path) = &cfg.journal.path {
        println!("  journal.path = {:?}", path);
    }
    println!();

    let artifacts = store.list_artifacts();
    println!("artifacts ({}):", artifacts.len());
    for artifact in &artifacts {
        let findings = scanner.scan(artifact);
        println!("  - {} ({} bytes)", artifact.name, artifact.size);
        for f in &findings {
            println!(
                "      {:?}: {} ({})",
                f.severity,
                f.entry.as_deref().unwrap_or("-"),
                f.signature
            );
        }
    }

    debug!("dry-run complete (nothing launched)");
    Ok(())
}
