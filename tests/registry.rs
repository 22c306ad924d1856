// tests/registry.rs

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use jarwatch::registry::{Claim, ProcessRegistry};
use jarwatch::types::{JobState, Trigger};
use proptest::prelude::*;

fn claimed(claim: Claim) -> jarwatch::registry::Job {
    match claim {
        Claim::Claimed(job) => job,
        Claim::Active(job) => panic!("expected a fresh claim, got active {job:?}"),
    }
}

#[test]
fn claim_inserts_pending_job() {
    let registry = ProcessRegistry::new();
    let job = claimed(registry.try_claim("app.jar", Trigger::Manual));

    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.trigger, Trigger::Manual);
    assert!(job.pid.is_none());
    assert_eq!(registry.get("app.jar"), Some(job));
    assert_eq!(registry.active_count(), 1);
}

#[test]
fn second_claim_reports_the_active_job() {
    let registry = ProcessRegistry::new();
    let first = claimed(registry.try_claim("app.jar", Trigger::Startup));

    match registry.try_claim("app.jar", Trigger::Schedule) {
        Claim::Active(job) => assert_eq!(job.launch_id, first.launch_id),
        Claim::Claimed(job) => panic!("double claim: {job:?}"),
    }
}

#[test]
fn terminal_record_is_replaced_with_a_new_launch_id() {
    let registry = ProcessRegistry::new();
    let first = claimed(registry.try_claim("app.jar", Trigger::Startup));
    registry
        .update("app.jar", first.launch_id, |job| {
            job.state = JobState::Failed;
            job.error = Some("boom".into());
        })
        .unwrap();
    assert_eq!(registry.active_count(), 0);

    let second = claimed(registry.try_claim("app.jar", Trigger::Manual));
    assert!(second.launch_id > first.launch_id);
    assert!(second.error.is_none());
}

#[test]
fn stale_update_is_ignored() {
    let registry = ProcessRegistry::new();
    let first = claimed(registry.try_claim("app.jar", Trigger::Startup));
    registry.update("app.jar", first.launch_id, |job| job.state = JobState::Stopped);
    let second = claimed(registry.try_claim("app.jar", Trigger::Manual));

    let stale = registry.update("app.jar", first.launch_id, |job| {
        job.state = JobState::Failed;
    });

    assert!(stale.is_none());
    let current = registry.get("app.jar").unwrap();
    assert_eq!(current.launch_id, second.launch_id);
    assert_eq!(current.state, JobState::Pending);
}

#[test]
fn update_on_missing_entry_is_none() {
    let registry = ProcessRegistry::new();
    assert!(registry.update("ghost.jar", 1, |job| job.state = JobState::Stopped).is_none());
}

#[test]
fn remove_if_only_removes_matching_launch() {
    let registry = ProcessRegistry::new();
    let job = claimed(registry.try_claim("app.jar", Trigger::Manual));

    assert!(registry.remove_if("app.jar", job.launch_id + 100).is_none());
    assert!(registry.get("app.jar").is_some());

    assert_eq!(registry.remove_if("app.jar", job.launch_id).unwrap().launch_id, job.launch_id);
    assert!(registry.is_empty());
}

#[test]
fn remove_if_terminal_keeps_active_jobs() {
    let registry = ProcessRegistry::new();
    let job = claimed(registry.try_claim("app.jar", Trigger::Manual));

    assert!(registry.remove_if_terminal("app.jar").is_none());
    assert_eq!(registry.get("app.jar").map(|j| j.launch_id), Some(job.launch_id));

    registry.update("app.jar", job.launch_id, |job| job.state = JobState::Stopped);
    let removed = registry.remove_if_terminal("app.jar").unwrap();
    assert_eq!(removed.state, JobState::Stopped);
    assert!(registry.is_empty());

    assert!(registry.remove_if_terminal("ghost.jar").is_none());
}

#[test]
fn snapshot_is_sorted_and_active_names_skip_terminal_jobs() {
    let registry = ProcessRegistry::new();
    for name in ["c.jar", "a.jar", "b.jar"] {
        registry.try_claim(name, Trigger::Startup);
    }
    let b = registry.get("b.jar").unwrap();
    registry.update("b.jar", b.launch_id, |job| job.state = JobState::Stopped);

    let names: Vec<String> = registry.snapshot().into_iter().map(|j| j.artifact).collect();
    assert_eq!(names, vec!["a.jar", "b.jar", "c.jar"]);

    let mut active = registry.active_names();
    active.sort();
    assert_eq!(active, vec!["a.jar", "c.jar"]);
    assert_eq!(registry.len(), 3);
}

#[test]
fn concurrent_claims_admit_exactly_one() {
    let registry = Arc::new(ProcessRegistry::new());
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || matches!(registry.try_claim("app.jar", Trigger::Manual), Claim::Claimed(_)))
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
    assert_eq!(registry.active_count(), 1);
}

#[derive(Debug, Clone)]
enum Op {
    Claim(u8),
    Finish(u8),
    Remove(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4).prop_map(Op::Claim),
        (0u8..4).prop_map(Op::Finish),
        (0u8..4).prop_map(Op::Remove),
    ]
}

proptest! {
    /// Whatever the interleaving of claims, exits and removals, a claim
    /// succeeds exactly when no active job exists and launch ids never repeat.
    #[test]
    fn claims_follow_active_state(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let registry = ProcessRegistry::new();
        let mut seen_ids = HashSet::new();

        for op in ops {
            match op {
                Op::Claim(n) => {
                    let name = format!("a{n}.jar");
                    let was_active = registry.get(&name).is_some_and(|j| j.state.is_active());
                    match registry.try_claim(&name, Trigger::Schedule) {
                        Claim::Claimed(job) => {
                            prop_assert!(!was_active);
                            prop_assert!(seen_ids.insert(job.launch_id));
                        }
                        Claim::Active(_) => prop_assert!(was_active),
                    }
                }
                Op::Finish(n) => {
                    let name = format!("a{n}.jar");
                    if let Some(job) = registry.get(&name) {
                        registry.update(&name, job.launch_id, |j| j.state = JobState::Stopped);
                    }
                }
                Op::Remove(n) => {
                    registry.remove_if_terminal(&format!("a{n}.jar"));
                }
            }

            for job in registry.snapshot() {
                prop_assert!(job.launch_id >= 1);
            }
            prop_assert!(registry.active_count() <= 4);
        }
    }
}
