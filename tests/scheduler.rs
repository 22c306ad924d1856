// tests/scheduler.rs

use std::sync::Arc;
use std::time::Duration;

use jarwatch::engine::Engine;
use jarwatch::fs::mock::MockFileSystem;
use jarwatch::schedule::{run_cycle, Scheduler, TickOutcome};
use jarwatch::types::{JobState, ScheduleTarget};
use jarwatch_test_utils::builders::{exit_command, ConfigFileBuilder};
use jarwatch_test_utils::fixtures::jar_bytes;
use jarwatch_test_utils::{eventually, init_tracing, with_timeout};

const DIR: &str = "/deploy";

struct Fixture {
    fs: MockFileSystem,
    engine: Arc<Engine>,
    // Processes need a real working directory.
    _workdir: tempfile::TempDir,
}

fn fixture(names: &[&str], configure: impl FnOnce(ConfigFileBuilder) -> ConfigFileBuilder) -> Fixture {
    let fs = MockFileSystem::new();
    for name in names {
        fs.add_file(format!("{DIR}/{name}"), jar_bytes(&["META-INF/MANIFEST.MF"]).unwrap());
    }
    let workdir = tempfile::tempdir().unwrap();
    let config = configure(ConfigFileBuilder::new(DIR).working_dir(workdir.path())).build();
    let engine = Engine::new(config, Arc::new(fs.clone())).unwrap();
    Fixture {
        fs,
        engine,
        _workdir: workdir,
    }
}

#[tokio::test]
async fn overlapping_tick_is_skipped() {
    init_tracing();
    let fx = fixture(&["app.jar"], |b| {
        b.scheduler(Duration::from_secs(3600), ScheduleTarget::All)
    });
    fx.fs.set_read_delay(Some(Duration::from_millis(150)));
    let scheduler = Scheduler::new(Arc::clone(&fx.engine));

    let TickOutcome::Started(handle) = scheduler.try_tick() else {
        panic!("first tick must start a cycle");
    };
    assert!(scheduler.in_flight());
    assert!(matches!(scheduler.try_tick(), TickOutcome::Skipped));
    assert_eq!(scheduler.skipped(), 1);
    assert_eq!(scheduler.cycles(), 1);

    let report = with_timeout(handle).await.unwrap();
    assert_eq!(report.considered, 1);
    assert_eq!(report.launched, 1);
    assert!(!scheduler.in_flight());
    assert_eq!(fx.engine.registry().get("app.jar").unwrap().state, JobState::Running);

    // The next tick runs again and finds the process still up.
    fx.fs.set_read_delay(None);
    let TickOutcome::Started(handle) = scheduler.try_tick() else {
        panic!("tick after completion must start a cycle");
    };
    let report = with_timeout(handle).await.unwrap();
    assert_eq!(report.launched, 0);
    assert_eq!(report.already_active, 1);
    assert_eq!(scheduler.cycles(), 2);

    fx.engine.shutdown().await;
}

#[tokio::test]
async fn named_target_limits_the_cycle() {
    init_tracing();
    let fx = fixture(&["a.jar", "b.jar"], |b| b);

    let report = run_cycle(&fx.engine, &ScheduleTarget::Named("b.jar".into())).await;

    assert_eq!(report.considered, 1);
    assert_eq!(report.launched, 1);
    assert!(fx.engine.registry().get("a.jar").is_none());
    assert!(fx.engine.registry().get("b.jar").is_some());
    fx.engine.shutdown().await;
}

#[tokio::test]
async fn cycle_relaunches_exited_jobs() {
    init_tracing();
    let fx = fixture(&["app.jar"], |b| b.command_vec(exit_command(0)));

    let first = run_cycle(&fx.engine, &ScheduleTarget::All).await;
    assert_eq!(first.launched, 1);
    assert!(
        eventually(Duration::from_secs(5), || {
            fx.engine.registry().active_count() == 0
        })
        .await
    );

    let second = run_cycle(&fx.engine, &ScheduleTarget::All).await;
    assert_eq!(second.launched, 1);
    fx.engine.shutdown().await;
}

#[tokio::test]
async fn zero_interval_scheduler_returns_immediately() {
    let fx = fixture(&[], |b| b);
    let scheduler = Scheduler::new(Arc::clone(&fx.engine));

    assert!(!scheduler.is_enabled());
    with_timeout(scheduler.run(fx.engine.shutdown_token().child_token())).await;
    fx.engine.shutdown().await;
}

#[tokio::test]
async fn running_scheduler_ticks_until_shutdown() {
    init_tracing();
    let fx = fixture(&["app.jar"], |b| {
        b.scheduler(Duration::from_millis(50), ScheduleTarget::All)
    });
    let scheduler = Scheduler::new(Arc::clone(&fx.engine));
    let task = tokio::spawn(scheduler.run(fx.engine.shutdown_token().child_token()));

    assert!(
        eventually(Duration::from_secs(5), || {
            fx.engine.registry().get("app.jar").is_some_and(|j| j.state == JobState::Running)
        })
        .await
    );

    fx.engine.shutdown().await;
    with_timeout(task).await.unwrap();
}
