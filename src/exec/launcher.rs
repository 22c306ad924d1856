// src/exec/launcher.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::exec::pool::LaunchRequest;
use crate::exec::supervisor::{StopOutcome, StopRequest};
use crate::journal::{Journal, Operation};
use crate::registry::{Claim, Job, ProcessRegistry};
use crate::store::Artifact;
use crate::types::{JobState, Trigger};

/// Result of [`Launcher::launch`].
#[derive(Debug)]
pub enum LaunchOutcome {
    /// A new job was claimed and queued for a worker.
    Accepted { job: Job, ticket: SpawnTicket },
    /// The artifact already has a `Pending` or `Running` job.
    AlreadyActive(Job),
    /// Nothing was launched.
    Rejected { reason: String },
}

impl LaunchOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, LaunchOutcome::Accepted { .. })
    }

    /// Wait for the spawn attempt (if one was queued) and return the job.
    pub async fn settle(self) -> Option<Job> {
        match self {
            LaunchOutcome::Accepted { ticket, .. } => ticket.wait().await,
            LaunchOutcome::AlreadyActive(job) => Some(job),
            LaunchOutcome::Rejected { .. } => None,
        }
    }
}

/// Resolves once a worker has attempted the spawn.
#[derive(Debug)]
pub struct SpawnTicket {
    rx: oneshot::Receiver<Job>,
}

impl SpawnTicket {
    /// The job after the spawn attempt (`Running` or `Failed`), or `None` if
    /// the request was dropped (pool shut down, launch withdrawn and removed).
    pub async fn wait(self) -> Option<Job> {
        self.rx.await.ok()
    }
}

/// Front door for starting and stopping artifact processes.
///
/// Cheap to clone; every clone shares the registry and the worker queue.
#[derive(Debug, Clone)]
pub struct Launcher {
    registry: Arc<ProcessRegistry>,
    requests: mpsc::Sender<LaunchRequest>,
    journal: Arc<Journal>,
    stop_grace: Duration,
}

impl Launcher {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        requests: mpsc::Sender<LaunchRequest>,
        journal: Arc<Journal>,
        stop_grace: Duration,
    ) -> Self {
        Self {
            registry,
            requests,
            journal,
            stop_grace,
        }
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// Claim `artifact` and queue it for spawning.
    ///
    /// Waits for queue capacity when the pool is saturated.
    pub async fn launch(&self, artifact: &Artifact, trigger: Trigger) -> LaunchOutcome {
        let job = match self.registry.try_claim(&artifact.name, trigger) {
            Claim::Claimed(job) => job,
            Claim::Active(existing) => {
                debug!(
                    artifact = %artifact.name,
                    state = %existing.state,
                    launch_id = existing.launch_id,
                    "launch skipped; job already active"
                );
                return LaunchOutcome::AlreadyActive(existing);
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = LaunchRequest {
            artifact: artifact.clone(),
            launch_id: job.launch_id,
            reply: Some(reply_tx),
        };

        if self.requests.send(request).await.is_err() {
            let reason = "launch queue is closed".to_string();
            warn!(artifact = %artifact.name, "{reason}");
            self.registry.update(&artifact.name, job.launch_id, |job| {
                job.state = JobState::Failed;
                job.error = Some(reason.clone());
                job.finished_at = Some(Utc::now());
            });
            return LaunchOutcome::Rejected { reason };
        }

        info!(
            artifact = %artifact.name,
            launch_id = job.launch_id,
            trigger = %trigger,
            "launch queued"
        );
        LaunchOutcome::Accepted {
            job,
            ticket: SpawnTicket { rx: reply_rx },
        }
    }

    /// Stop the running process for `name`.
    ///
    /// Returns `true` only if a running process was terminated. A pending
    /// launch is withdrawn (marked `Stopped` before it spawns) and reports
    /// `false`.
    pub async fn stop(&self, name: &str) -> bool {
        let Some(job) = self.registry.get(name) else {
            debug!(artifact = name, "stop: no job");
            return false;
        };

        match job.state {
            JobState::Pending => {
                let withdrawn = self.registry.update(name, job.launch_id, |job| {
                    if job.state == JobState::Pending {
                        job.state = JobState::Stopped;
                        job.finished_at = Some(Utc::now());
                    }
                });
                if withdrawn.is_some_and(|j| j.state == JobState::Stopped) {
                    info!(artifact = name, launch_id = job.launch_id, "pending launch withdrawn");
                    self.journal
                        .record(Operation::Stopped, name, Some("withdrawn before spawn".into()));
                    return false;
                }
                // Raced with a worker; it may be running now.
                self.stop_running(name).await
            }
            JobState::Running => self.stop_running(name).await,
            JobState::Stopped | JobState::Failed => {
                debug!(artifact = name, state = %job.state, "stop: job not running");
                false
            }
        }
    }

    async fn stop_running(&self, name: &str) -> bool {
        let Some((job, handle)) = self.registry.handle(name) else {
            debug!(artifact = name, "stop: process is not supervised");
            return false;
        };
        if job.state != JobState::Running {
            return false;
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = StopRequest {
            grace: self.stop_grace,
            reply: reply_tx,
        };
        if handle.stop_tx.send(request).await.is_err() {
            // Supervisor already finished; the exit has been recorded.
            debug!(artifact = name, "stop: supervisor already gone");
            return false;
        }

        match reply_rx.await {
            Ok(StopOutcome::Stopped { .. }) => true,
            Ok(StopOutcome::KillFailed(reason)) => {
                warn!(artifact = name, reason = %reason, "stop failed");
                false
            }
            Err(_) => {
                // The process exited on its own while the request was in flight.
                debug!(artifact = name, "stop: supervisor finished before replying");
                false
            }
        }
    }

    /// Stop whatever runs for `artifact`, then launch it again.
    pub async fn restart(&self, artifact: &Artifact, trigger: Trigger) -> LaunchOutcome {
        info!(artifact = %artifact.name, trigger = %trigger, "restarting");
        self.stop(&artifact.name).await;
        self.launch(artifact, trigger).await
    }

    /// Stop every active job concurrently. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let names = self.registry.active_names();
        if names.is_empty() {
            return 0;
        }
        info!(count = names.len(), "stopping all jobs");

        let mut set = JoinSet::new();
        for name in names {
            let launcher = self.clone();
            set.spawn(async move { launcher.stop(&name).await });
        }

        let mut stopped = 0;
        while let Some(res) = set.join_next().await {
            match res {
                Ok(true) => stopped += 1,
                Ok(false) => {}
                Err(err) => warn!(error = %err, "stop task panicked"),
            }
        }
        stopped
    }
}
