// src/engine/context.rs

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::errors::JarwatchError;
use crate::exec::{CommandTemplate, LaunchOutcome, Launcher, WorkerContext, WorkerPool};
use crate::fs::FileSystem;
use crate::journal::{Journal, Operation};
use crate::registry::{Job, ProcessRegistry};
use crate::scan::{ScanFinding, SecurityScanner};
use crate::store::{Artifact, ArtifactStore};
use crate::types::Trigger;
use crate::watch::hash::{compute_file_hash, ContentTracker};
use crate::watch::WatcherControl;

use super::pipeline::{blocking_findings, change_action, ChangeAction};

/// Owns every long-lived component and the shared registry.
///
/// Built once per process (tests build several) and shared as `Arc<Engine>`
/// by the watcher, the scheduler, the control API and the console.
#[derive(Debug)]
pub struct Engine {
    config: ConfigFile,
    store: ArtifactStore,
    scanner: Arc<SecurityScanner>,
    registry: Arc<ProcessRegistry>,
    launcher: Launcher,
    journal: Arc<Journal>,
    tracker: ContentTracker,
    watcher: WatcherControl,
    shutdown: CancellationToken,
    pool: Mutex<Option<WorkerPool>>,
}

impl Engine {
    /// Build the engine and start its launch worker pool.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: ConfigFile, fs: Arc<dyn FileSystem>) -> Result<Arc<Self>> {
        let store = ArtifactStore::from_config(&config, Arc::clone(&fs))?;
        let scanner = Arc::new(SecurityScanner::from_config(&config, Arc::clone(&fs))?);
        let journal = Arc::new(match &config.journal.path {
            Some(path) => Journal::open(path)?,
            None => Journal::disabled(),
        });
        let registry = Arc::new(ProcessRegistry::new());
        let shutdown = CancellationToken::new();

        let ctx = Arc::new(WorkerContext {
            registry: Arc::clone(&registry),
            template: CommandTemplate::from_config(&config),
            journal: Arc::clone(&journal),
        });
        let pool = WorkerPool::spawn(
            config.engine.workers,
            config.engine.queue_capacity,
            ctx,
            shutdown.child_token(),
        );
        let launcher = Launcher::new(
            Arc::clone(&registry),
            pool.sender(),
            Arc::clone(&journal),
            config.launch.stop_grace,
        );

        info!(
            dir = ?store.dir(),
            workers = pool.size(),
            policy = ?config.scanner.policy,
            "engine ready"
        );

        Ok(Arc::new(Self {
            watcher: WatcherControl::new(config.watcher.enabled),
            config,
            store,
            scanner,
            registry,
            launcher,
            journal,
            tracker: ContentTracker::new(),
            shutdown,
            pool: Mutex::new(Some(pool)),
        }))
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn scanner(&self) -> &SecurityScanner {
        &self.scanner
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn watcher(&self) -> &WatcherControl {
        &self.watcher
    }

    /// Token cancelled by [`Engine::shutdown`]; background tasks hang off it.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn status(&self) -> Vec<Job> {
        self.registry.snapshot()
    }

    /// Scan `artifact` off the async threads.
    pub async fn scan(&self, artifact: &Artifact) -> Vec<ScanFinding> {
        let scanner = Arc::clone(&self.scanner);
        let target = artifact.clone();
        match tokio::task::spawn_blocking(move || scanner.scan(&target)).await {
            Ok(findings) => findings,
            Err(err) => {
                warn!(artifact = %artifact.name, error = %err, "scan task failed");
                Vec::new()
            }
        }
    }

    /// Shared scan + launch path used by every trigger.
    pub async fn process_artifact(&self, artifact: &Artifact, trigger: Trigger) -> LaunchOutcome {
        if self.registry.get(&artifact.name).is_none() {
            self.journal.record(
                Operation::Discovered,
                &artifact.name,
                Some(format!("{} bytes", artifact.size)),
            );
        }

        if let Some(outcome) = self.screen(artifact).await {
            return outcome;
        }
        self.launcher.launch(artifact, trigger).await
    }

    /// Scan and apply the policy. `Some` means the launch must not happen.
    async fn screen(&self, artifact: &Artifact) -> Option<LaunchOutcome> {
        let findings = self.scan(artifact).await;
        self.journal.record(
            Operation::Scanned,
            &artifact.name,
            Some(format!("{} finding(s)", findings.len())),
        );

        let blocking = blocking_findings(self.config.scanner.policy, &findings);
        if blocking.is_empty() {
            return None;
        }

        let signatures: Vec<&str> = blocking.iter().map(|f| f.signature.as_str()).collect();
        let reason = format!("blocked by scan policy: {}", signatures.join(", "));
        warn!(artifact = %artifact.name, findings = blocking.len(), "launch blocked by scan policy");
        self.journal
            .record(Operation::Skipped, &artifact.name, Some(reason.clone()));
        Some(LaunchOutcome::Rejected { reason })
    }

    /// Record the current content hash; true if it differs from the last one.
    async fn observe_content(&self, artifact: &Artifact) -> bool {
        let fs = Arc::clone(self.store.fs());
        let path = artifact.path.clone();
        let hashed = tokio::task::spawn_blocking(move || compute_file_hash(fs.as_ref(), &path)).await;

        match hashed {
            Ok(Ok(hash)) => self.tracker.observe(&artifact.name, &hash),
            Ok(Err(err)) => {
                debug!(artifact = %artifact.name, error = %format!("{err:#}"), "could not hash artifact");
                true
            }
            Err(err) => {
                warn!(artifact = %artifact.name, error = %err, "hash task failed");
                true
            }
        }
    }

    /// React to a create/modify of an existing artifact.
    ///
    /// Returns `None` when the event was a no-op.
    pub async fn handle_changed(&self, artifact: &Artifact) -> Option<LaunchOutcome> {
        let changed = self.observe_content(artifact).await;
        let current = self.registry.get(&artifact.name);

        match change_action(current.as_ref(), changed, self.config.launch.restart_on_change) {
            ChangeAction::Launch => Some(self.process_artifact(artifact, Trigger::FileWatch).await),
            ChangeAction::Restart => {
                if let Some(outcome) = self.screen(artifact).await {
                    return Some(outcome);
                }
                Some(self.launcher.restart(artifact, Trigger::FileWatch).await)
            }
            ChangeAction::Ignore => {
                debug!(artifact = %artifact.name, changed, "event ignored");
                None
            }
        }
    }

    /// React to an artifact leaving the directory: stop it and forget it.
    ///
    /// The record is dropped only once its job has ended. A launch claimed
    /// while the stop was in flight, or a process that survived the kill,
    /// keeps its entry. Returns true if a running process was stopped.
    pub async fn handle_removed(&self, name: &str) -> bool {
        let before = self.registry.get(name);
        let stopped = self.launcher.stop(name).await;
        self.tracker.forget(name);

        if let Some(job) = self.registry.remove_if_terminal(name) {
            info!(artifact = name, state = %job.state, stopped, "artifact removed");
            self.journal.record(Operation::Removed, name, None);
            return stopped;
        }

        match (before, self.registry.get(name)) {
            (Some(old), Some(current)) if old.launch_id == current.launch_id => {
                error!(
                    artifact = name,
                    launch_id = current.launch_id,
                    state = %current.state,
                    pid = ?current.pid,
                    "artifact removed but its process could not be stopped; keeping the record"
                );
            }
            (_, Some(current)) => {
                warn!(
                    artifact = name,
                    launch_id = current.launch_id,
                    state = %current.state,
                    "artifact removed while a new launch was starting; keeping the new job"
                );
            }
            (_, None) => {}
        }
        stopped
    }

    /// Look up an artifact currently in the directory.
    pub fn find_artifact(&self, name: &str) -> crate::errors::Result<Artifact> {
        self.store
            .find(name)
            .ok_or_else(|| JarwatchError::ArtifactNotFound(name.to_string()))
    }

    /// Entry names of a named artifact (console "entries").
    pub async fn entries(&self, name: &str) -> crate::errors::Result<Vec<String>> {
        let artifact = self.find_artifact(name)?;
        let scanner = Arc::clone(&self.scanner);
        let entries = tokio::task::spawn_blocking(move || scanner.entries(&artifact))
            .await
            .map_err(anyhow::Error::from)??;
        Ok(entries)
    }

    /// Scan a named artifact without launching it.
    pub async fn scan_named(&self, name: &str) -> crate::errors::Result<Vec<ScanFinding>> {
        let artifact = self.find_artifact(name)?;
        Ok(self.scan(&artifact).await)
    }

    /// Launch a named artifact on operator request.
    pub async fn execute(&self, name: &str) -> crate::errors::Result<LaunchOutcome> {
        let artifact = self.find_artifact(name)?;
        self.observe_content(&artifact).await;
        Ok(self.process_artifact(&artifact, Trigger::Manual).await)
    }

    pub async fn stop(&self, name: &str) -> bool {
        self.launcher.stop(name).await
    }

    /// Initial sweep: remember every artifact's content and launch them all
    /// when `launch_on_startup` is set.
    pub async fn bootstrap(&self) -> Vec<LaunchOutcome> {
        let artifacts = self.store.list_artifacts();
        info!(count = artifacts.len(), "bootstrapping from watched directory");

        let mut outcomes = Vec::new();
        for artifact in &artifacts {
            self.observe_content(artifact).await;
            if self.config.engine.launch_on_startup {
                outcomes.push(self.process_artifact(artifact, Trigger::Startup).await);
            }
        }
        outcomes
    }

    /// Resolve once no job is `Pending` or `Running`.
    pub async fn wait_idle(&self, poll: Duration) {
        while self.registry.active_count() > 0 {
            tokio::time::sleep(poll).await;
        }
    }

    /// Stop background tasks and every job. Returns how many processes were stopped.
    pub async fn shutdown(&self) -> usize {
        info!("engine shutting down");
        self.shutdown.cancel();
        self.watcher.disable();

        let stopped = self.launcher.stop_all().await;

        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            pool.join().await;
        }

        info!(stopped, "engine stopped");
        stopped
    }
}
