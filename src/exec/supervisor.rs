// src/exec/supervisor.rs

//! Per-process supervisor task.
//!
//! Owns the `Child` of one launch. It pumps stdout/stderr into the log,
//! waits for the process to exit, and serves stop requests coming from
//! [`Launcher::stop`](crate::exec::Launcher::stop). All registry updates it
//! makes are keyed by the launch id, so a supervisor of an old launch can
//! never overwrite the record of a newer one.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::journal::{Journal, Operation};
use crate::registry::ProcessRegistry;
use crate::types::{ArtifactName, JobState};

/// Request to terminate a supervised process.
#[derive(Debug)]
pub struct StopRequest {
    /// How long to wait after the graceful signal before killing.
    pub grace: Duration,
    pub reply: oneshot::Sender<StopOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process is gone. `forced` is true if it had to be killed.
    Stopped { exit_code: Option<i32>, forced: bool },
    /// Even the forced kill failed; the job keeps its last known state.
    KillFailed(String),
}

pub(crate) struct Supervisor {
    pub artifact: ArtifactName,
    pub launch_id: u64,
    pub pid: Option<u32>,
    pub registry: Arc<ProcessRegistry>,
    pub journal: Arc<Journal>,
}

impl Supervisor {
    /// Run until the process exits or is stopped.
    pub async fn run(self, mut child: Child, mut stop_rx: mpsc::Receiver<StopRequest>) {
        if let Some(stdout) = child.stdout.take() {
            spawn_line_pump(stdout, self.artifact.clone(), self.pid, Stream::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_pump(stderr, self.artifact.clone(), self.pid, Stream::Stderr);
        }

        let mut stop_open = true;
        loop {
            tokio::select! {
                status_res = child.wait() => {
                    match status_res {
                        Ok(status) => self.record_exit(status),
                        Err(err) => self.record_wait_error(&err),
                    }
                    break;
                }

                req = stop_rx.recv(), if stop_open => {
                    let Some(req) = req else {
                        // Every handle is gone; keep waiting for a natural exit.
                        stop_open = false;
                        continue;
                    };

                    let outcome = self.terminate(&mut child, req.grace).await;
                    let finished = matches!(outcome, StopOutcome::Stopped { .. });
                    if let StopOutcome::Stopped { exit_code, forced } = &outcome {
                        self.record_stopped(*exit_code, *forced);
                    }
                    if req.reply.send(outcome).is_err() {
                        debug!(artifact = %self.artifact, "stop requester went away before reply");
                    }
                    if finished {
                        break;
                    }
                }
            }
        }

        debug!(artifact = %self.artifact, launch_id = self.launch_id, "supervisor finished");
    }

    /// Graceful signal, bounded wait, then kill.
    async fn terminate(&self, child: &mut Child, grace: Duration) -> StopOutcome {
        info!(
            artifact = %self.artifact,
            pid = ?self.pid,
            grace_ms = grace.as_millis() as u64,
            "stopping process"
        );

        if let Err(err) = send_terminate(child) {
            warn!(
                artifact = %self.artifact,
                error = %err,
                "failed to deliver terminate signal; killing instead"
            );
        } else {
            match timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    return StopOutcome::Stopped {
                        exit_code: status.code(),
                        forced: false,
                    };
                }
                Ok(Err(err)) => {
                    warn!(artifact = %self.artifact, error = %err, "error while waiting for graceful exit");
                }
                Err(_elapsed) => {
                    warn!(
                        artifact = %self.artifact,
                        pid = ?self.pid,
                        "process did not exit within grace period; killing"
                    );
                }
            }
        }

        match child.kill().await {
            Ok(()) => {
                let exit_code = child.try_wait().ok().flatten().and_then(|s| s.code());
                StopOutcome::Stopped {
                    exit_code,
                    forced: true,
                }
            }
            Err(err) => {
                error!(
                    artifact = %self.artifact,
                    pid = ?self.pid,
                    error = %err,
                    "failed to kill process; leaving job in its last known state"
                );
                StopOutcome::KillFailed(err.to_string())
            }
        }
    }

    fn record_exit(&self, status: ExitStatus) {
        let code = status.code();
        let (state, error) = if status.success() {
            (JobState::Stopped, None)
        } else {
            (JobState::Failed, Some(format!("process exited with {status}")))
        };

        info!(
            artifact = %self.artifact,
            launch_id = self.launch_id,
            exit_code = ?code,
            success = status.success(),
            "process exited"
        );

        let updated = self.registry.update(&self.artifact, self.launch_id, |job| {
            job.state = state;
            job.exit_code = code;
            job.error = error.clone();
            job.finished_at = Some(Utc::now());
        });

        if updated.is_some() {
            let op = if state == JobState::Stopped {
                Operation::Stopped
            } else {
                Operation::Failed
            };
            self.journal.record(op, &self.artifact, Some(status.to_string()));
        }
    }

    fn record_wait_error(&self, err: &std::io::Error) {
        error!(artifact = %self.artifact, error = %err, "failed waiting for process");
        let updated = self.registry.update(&self.artifact, self.launch_id, |job| {
            job.state = JobState::Failed;
            job.error = Some(format!("waiting for process: {err}"));
            job.finished_at = Some(Utc::now());
        });
        if updated.is_some() {
            self.journal
                .record(Operation::Failed, &self.artifact, Some(err.to_string()));
        }
    }

    fn record_stopped(&self, exit_code: Option<i32>, forced: bool) {
        info!(
            artifact = %self.artifact,
            launch_id = self.launch_id,
            exit_code = ?exit_code,
            forced,
            "process stopped"
        );
        let updated = self.registry.update(&self.artifact, self.launch_id, |job| {
            job.state = JobState::Stopped;
            job.exit_code = exit_code;
            job.finished_at = Some(Utc::now());
        });
        if updated.is_some() {
            let detail = if forced { "killed" } else { "terminated" };
            self.journal
                .record(Operation::Stopped, &self.artifact, Some(detail.to_string()));
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already reaped.
        return Ok(());
    };
    let pid = i32::try_from(pid)
        .map_err(|_| std::io::Error::other(format!("pid {pid} out of range")))?;
    kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) -> std::io::Result<()> {
    // No graceful signal outside unix.
    child.start_kill()
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Forward a child's output line by line into the log so buffers never fill.
fn spawn_line_pump<R>(reader: R, artifact: ArtifactName, pid: Option<u32>, stream: Stream)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match stream {
                    Stream::Stdout => info!(artifact = %artifact, pid = ?pid, "stdout: {}", line),
                    Stream::Stderr => warn!(artifact = %artifact, pid = ?pid, "stderr: {}", line),
                },
                Ok(None) => break,
                Err(err) => {
                    debug!(artifact = %artifact, error = %err, "output stream closed with error");
                    break;
                }
            }
        }
    });
}
