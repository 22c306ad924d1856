// src/schedule/mod.rs

//! Fixed-interval scan + launch cycles.
//!
//! Every tick starts a cycle over the artifacts selected by
//! `[scheduler] target`, unless the previous cycle is still in flight; such
//! ticks are skipped and counted. Ticks missed while the runtime was busy are
//! dropped rather than bunched up.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::exec::LaunchOutcome;
use crate::types::{ScheduleTarget, Trigger};

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub considered: usize,
    pub launched: usize,
    pub already_active: usize,
    pub rejected: usize,
}

/// Result of [`Scheduler::try_tick`].
#[derive(Debug)]
pub enum TickOutcome {
    Started(JoinHandle<CycleReport>),
    /// A cycle was already running.
    Skipped,
}

#[derive(Debug)]
pub struct Scheduler {
    engine: Arc<Engine>,
    interval: Duration,
    target: ScheduleTarget,
    in_flight: Arc<AtomicBool>,
    cycles: AtomicU64,
    skipped: AtomicU64,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>) -> Self {
        let cfg = &engine.config().scheduler;
        let interval = cfg.interval;
        let target = cfg.target.clone();
        Self {
            engine,
            interval,
            target,
            in_flight: Arc::new(AtomicBool::new(false)),
            cycles: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Start a cycle unless one is in flight.
    pub fn try_tick(&self) -> TickOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let skipped = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(skipped, "scheduler tick skipped; previous cycle still running");
            return TickOutcome::Skipped;
        }

        self.cycles.fetch_add(1, Ordering::Relaxed);
        let guard = InFlight(Arc::clone(&self.in_flight));
        let engine = Arc::clone(&self.engine);
        let target = self.target.clone();

        TickOutcome::Started(tokio::spawn(async move {
            let _guard = guard;
            run_cycle(&engine, &target).await
        }))
    }

    /// Tick every `interval` until `shutdown` fires. Returns immediately when
    /// the interval is zero.
    pub async fn run(self, shutdown: CancellationToken) {
        if !self.is_enabled() {
            info!("scheduler disabled");
            return;
        }
        info!(
            interval_secs = self.interval.as_secs(),
            target = %self.target,
            "scheduler started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick is immediate; startup is covered by the bootstrap sweep.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(cycles = self.cycles(), skipped = self.skipped(), "scheduler stopped");
                    break;
                }

                _ = interval.tick() => {
                    // The cycle runs detached; its report is logged there.
                    let _ = self.try_tick();
                }
            }
        }
    }
}

/// Clears the in-flight flag when the cycle ends, even by panic.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Scan + launch every targeted artifact and wait for each spawn attempt.
pub async fn run_cycle(engine: &Engine, target: &ScheduleTarget) -> CycleReport {
    let mut report = CycleReport::default();

    let artifacts: Vec<_> = engine
        .store()
        .list_artifacts()
        .into_iter()
        .filter(|a| target.includes(&a.name))
        .collect();
    debug!(count = artifacts.len(), target = %target, "scheduler cycle started");

    for artifact in &artifacts {
        report.considered += 1;
        match engine.process_artifact(artifact, Trigger::Schedule).await {
            outcome @ LaunchOutcome::Accepted { .. } => {
                report.launched += 1;
                outcome.settle().await;
            }
            LaunchOutcome::AlreadyActive(_) => report.already_active += 1,
            LaunchOutcome::Rejected { .. } => report.rejected += 1,
        }
    }

    info!(
        considered = report.considered,
        launched = report.launched,
        already_active = report.already_active,
        rejected = report.rejected,
        "scheduler cycle finished"
    );
    report
}
