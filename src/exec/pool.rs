// src/exec/pool.rs

//! Fixed-size launch worker pool.
//!
//! Launch requests go through one bounded queue; `workers` tasks pull from it
//! and do the actual spawn + output wiring. A burst of filesystem events
//! therefore never creates more than `workers` concurrent spawns, and callers
//! feel backpressure once `queue_capacity` requests are waiting.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::JarwatchError;
use crate::exec::command::CommandTemplate;
use crate::exec::supervisor::Supervisor;
use crate::journal::{Journal, Operation};
use crate::registry::{Job, JobHandle, ProcessRegistry};
use crate::store::Artifact;
use crate::types::JobState;

/// A claimed launch waiting for a worker.
#[derive(Debug)]
pub struct LaunchRequest {
    pub artifact: Artifact,
    pub launch_id: u64,
    /// Receives the job as it stands after the spawn attempt.
    pub reply: Option<oneshot::Sender<Job>>,
}

/// Everything a worker needs to turn a request into a supervised process.
#[derive(Debug)]
pub struct WorkerContext {
    pub registry: Arc<ProcessRegistry>,
    pub template: CommandTemplate,
    pub journal: Arc<Journal>,
}

#[derive(Debug)]
pub struct WorkerPool {
    tx: mpsc::Sender<LaunchRequest>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers behind a queue of `capacity` requests.
    pub fn spawn(
        size: usize,
        capacity: usize,
        ctx: Arc<WorkerContext>,
        shutdown: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<LaunchRequest>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..size.max(1))
            .map(|id| {
                let rx = Arc::clone(&rx);
                let ctx = Arc::clone(&ctx);
                let shutdown = shutdown.clone();
                tokio::spawn(worker_loop(id, rx, ctx, shutdown))
            })
            .collect();

        info!(workers = size.max(1), capacity = capacity.max(1), "launch worker pool started");
        Self { tx, workers }
    }

    pub fn sender(&self) -> mpsc::Sender<LaunchRequest> {
        self.tx.clone()
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Wait for all workers to exit (after the shutdown token fired).
    pub async fn join(self) {
        drop(self.tx);
        for worker in self.workers {
            if let Err(err) = worker.await {
                warn!(error = %err, "launch worker ended abnormally");
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<LaunchRequest>>>,
    ctx: Arc<WorkerContext>,
    shutdown: CancellationToken,
) {
    debug!(worker = id, "launch worker started");

    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                req = rx.recv() => req,
            }
        };

        let Some(req) = next else {
            break;
        };
        handle_request(id, req, &ctx).await;
    }

    debug!(worker = id, "launch worker finished");
}

/// Spawn the process for one request and hand it to a supervisor.
async fn handle_request(worker: usize, req: LaunchRequest, ctx: &WorkerContext) {
    let LaunchRequest {
        artifact,
        launch_id,
        reply,
    } = req;
    let name = artifact.name.clone();

    // The claim may have been withdrawn (stop/delete) while queued.
    match ctx.registry.get(&name) {
        Some(job) if job.launch_id == launch_id && job.state == JobState::Pending => {}
        other => {
            debug!(
                artifact = %name,
                launch_id,
                current = ?other.as_ref().map(|j| (j.launch_id, j.state)),
                "launch withdrawn before a worker picked it up"
            );
            if let (Some(reply), Some(job)) = (reply, other) {
                let _ = reply.send(job);
            }
            return;
        }
    }

    let command_line = ctx.template.display(&artifact);
    info!(worker, artifact = %name, launch_id, cmd = %command_line, "starting process");

    let mut cmd = ctx.template.build(&artifact);
    let job = match cmd.spawn() {
        Ok(mut child) => {
            let pid = child.id();
            let (stop_tx, stop_rx) = mpsc::channel(4);

            match ctx
                .registry
                .mark_running(&name, launch_id, pid, JobHandle::new(stop_tx))
            {
                Some(job) => {
                    ctx.journal.record(
                        Operation::Launched,
                        &name,
                        Some(format!("pid {} ({})", pid.unwrap_or_default(), command_line)),
                    );
                    let supervisor = Supervisor {
                        artifact: name.clone(),
                        launch_id,
                        pid,
                        registry: Arc::clone(&ctx.registry),
                        journal: Arc::clone(&ctx.journal),
                    };
                    tokio::spawn(supervisor.run(child, stop_rx));
                    job
                }
                None => {
                    warn!(artifact = %name, launch_id, "launch withdrawn during spawn; killing process");
                    if let Err(err) = child.kill().await {
                        error!(artifact = %name, error = %err, "failed to kill withdrawn process");
                    }
                    match ctx.registry.get(&name) {
                        Some(job) => job,
                        None => return,
                    }
                }
            }
        }
        Err(err) => {
            error!(
                artifact = %name,
                launch_id,
                cmd = %command_line,
                error = %err,
                "failed to spawn process"
            );
            let reason = JarwatchError::Spawn {
                artifact: name.clone(),
                reason: err.to_string(),
            }
            .to_string();
            ctx.journal
                .record(Operation::Failed, &name, Some(reason.clone()));
            match ctx.registry.update(&name, launch_id, |job| {
                job.state = JobState::Failed;
                job.error = Some(reason);
                job.finished_at = Some(Utc::now());
            }) {
                Some(job) => job,
                None => return,
            }
        }
    };

    if let Some(reply) = reply {
        let _ = reply.send(job);
    }
}
