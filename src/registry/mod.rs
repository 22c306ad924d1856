// src/registry/mod.rs

//! Concurrent process registry: artifact name → job.
//!
//! The registry is the single source of truth for "what is running". It is
//! a `DashMap`, so readers and writers on different artifacts never contend
//! on one global lock, and every operation is atomic per key.
//!
//! Central invariant: **at most one job in `Pending` or `Running` per
//! artifact name**. [`ProcessRegistry::try_claim`] enforces it with a single
//! entry-level compare-and-insert, so concurrent launch attempts cannot both
//! succeed.
//!
//! Every job carries a `launch_id`. Updates that originate from a specific
//! launch (spawn result, exit status) name that id and are dropped if the
//! entry has since been replaced or removed; nothing holds an entry across an
//! await point.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::exec::supervisor::StopRequest;
use crate::types::{ArtifactName, JobState, Trigger};

/// Runtime record of one launch of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub artifact: ArtifactName,
    pub launch_id: u64,
    pub state: JobState,
    pub trigger: Trigger,
    pub pid: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl Job {
    fn pending(artifact: &str, launch_id: u64, trigger: Trigger) -> Self {
        Self {
            artifact: artifact.to_string(),
            launch_id,
            state: JobState::Pending,
            trigger,
            pid: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            exit_code: None,
            error: None,
        }
    }
}

/// Control channel to the task supervising a running process.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub(crate) stop_tx: mpsc::Sender<StopRequest>,
}

impl JobHandle {
    pub(crate) fn new(stop_tx: mpsc::Sender<StopRequest>) -> Self {
        Self { stop_tx }
    }
}

#[derive(Debug)]
struct JobEntry {
    job: Job,
    handle: Option<JobHandle>,
}

/// Result of [`ProcessRegistry::try_claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// A new `Pending` job was inserted; the caller owns the launch.
    Claimed(Job),
    /// A `Pending`/`Running` job already exists; nothing was changed.
    Active(Job),
}

#[derive(Debug)]
pub struct ProcessRegistry {
    jobs: DashMap<ArtifactName, JobEntry>,
    next_launch_id: AtomicU64,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            next_launch_id: AtomicU64::new(1),
        }
    }

    /// Atomically insert a `Pending` job for `artifact` unless an active one exists.
    ///
    /// Terminal (`Stopped`/`Failed`) records are replaced.
    pub fn try_claim(&self, artifact: &str, trigger: Trigger) -> Claim {
        match self.jobs.entry(artifact.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().job.state.is_active() {
                    return Claim::Active(occupied.get().job.clone());
                }
                let job = Job::pending(artifact, self.allocate_launch_id(), trigger);
                occupied.insert(JobEntry {
                    job: job.clone(),
                    handle: None,
                });
                debug!(artifact, launch_id = job.launch_id, "claimed (replaced terminal record)");
                Claim::Claimed(job)
            }
            Entry::Vacant(vacant) => {
                let job = Job::pending(artifact, self.allocate_launch_id(), trigger);
                vacant.insert(JobEntry {
                    job: job.clone(),
                    handle: None,
                });
                debug!(artifact, launch_id = job.launch_id, "claimed");
                Claim::Claimed(job)
            }
        }
    }

    fn allocate_launch_id(&self) -> u64 {
        self.next_launch_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, artifact: &str) -> Option<Job> {
        self.jobs.get(artifact).map(|entry| entry.job.clone())
    }

    /// Apply `f` to the job for `artifact` if it still belongs to `launch_id`.
    ///
    /// Returns the updated job, or `None` if the entry is gone or was replaced
    /// by a newer launch.
    pub fn update<F>(&self, artifact: &str, launch_id: u64, f: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut entry = self.jobs.get_mut(artifact)?;
        if entry.job.launch_id != launch_id {
            debug!(
                artifact,
                launch_id,
                current = entry.job.launch_id,
                "ignoring update for stale launch"
            );
            return None;
        }
        f(&mut entry.job);
        if entry.job.state.is_terminal() {
            entry.handle = None;
        }
        Some(entry.job.clone())
    }

    /// Transition a `Pending` launch to `Running` and attach its control
    /// channel in one step.
    ///
    /// Returns `None` if the launch was withdrawn or replaced in the meantime;
    /// the caller then owns a process nobody tracks and must kill it.
    pub fn mark_running(
        &self,
        artifact: &str,
        launch_id: u64,
        pid: Option<u32>,
        handle: JobHandle,
    ) -> Option<Job> {
        let mut entry = self.jobs.get_mut(artifact)?;
        if entry.job.launch_id != launch_id || entry.job.state != JobState::Pending {
            return None;
        }
        entry.job.state = JobState::Running;
        entry.job.pid = pid;
        entry.job.started_at = Some(Utc::now());
        entry.handle = Some(handle);
        Some(entry.job.clone())
    }

    /// Current job plus its control channel, if the process is supervised.
    pub fn handle(&self, artifact: &str) -> Option<(Job, JobHandle)> {
        let entry = self.jobs.get(artifact)?;
        let handle = entry.handle.clone()?;
        Some((entry.job.clone(), handle))
    }

    /// Remove the entry only if it still belongs to `launch_id`.
    pub fn remove_if(&self, artifact: &str, launch_id: u64) -> Option<Job> {
        self.jobs
            .remove_if(artifact, |_, entry| entry.job.launch_id == launch_id)
            .map(|(_, entry)| entry.job)
    }

    /// Remove the entry only if its job has ended.
    ///
    /// An active job found here was claimed after the caller last looked
    /// (or could not be stopped) and stays tracked.
    pub fn remove_if_terminal(&self, artifact: &str) -> Option<Job> {
        self.jobs
            .remove_if(artifact, |_, entry| entry.job.state.is_terminal())
            .map(|(_, entry)| entry.job)
    }

    /// Consistent-per-entry copy of all jobs, sorted by artifact name.
    pub fn snapshot(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|entry| entry.job.clone()).collect();
        jobs.sort_by(|a, b| a.artifact.cmp(&b.artifact));
        jobs
    }

    /// Names of artifacts with a `Pending` or `Running` job.
    pub fn active_names(&self) -> Vec<ArtifactName> {
        self.jobs
            .iter()
            .filter(|entry| entry.job.state.is_active())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|entry| entry.job.state.is_active())
            .count()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
