// tests/journal.rs

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use jarwatch::engine::Engine;
use jarwatch::fs::RealFileSystem;
use jarwatch::journal::{read_journal, Journal, Operation};
use jarwatch::types::ScanPolicy;
use jarwatch_test_utils::builders::{exit_command, ConfigFileBuilder};
use jarwatch_test_utils::fixtures::{write_clean_jar, write_jar};
use jarwatch_test_utils::{eventually, init_tracing, with_timeout};

fn ops(path: &std::path::Path) -> Vec<Operation> {
    read_journal(path)
        .map(|records| records.into_iter().map(|r| r.op).collect())
        .unwrap_or_default()
}

#[test]
fn records_are_appended_as_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/journal.jsonl");

    let journal = Journal::open(&path).unwrap();
    assert_eq!(journal.path(), Some(path.as_path()));
    journal.record(Operation::Discovered, "app.jar", Some("10 bytes".into()));
    journal.record(Operation::Removed, "app.jar", None);

    // Reopening appends.
    let journal = Journal::open(&path).unwrap();
    journal.record(Operation::Launched, "other.jar", Some("pid 1".into()));

    let records = read_journal(&path).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].op, Operation::Discovered);
    assert_eq!(records[0].detail.as_deref(), Some("10 bytes"));
    assert_eq!(records[1].detail, None);
    assert_eq!(records[2].artifact, "other.jar");

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.lines().nth(1).unwrap().contains(r#""op":"removed""#));
    assert!(!raw.lines().nth(1).unwrap().contains("detail"));
}

#[test]
fn malformed_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");
    Journal::open(&path)
        .unwrap()
        .record(Operation::Scanned, "a.jar", None);
    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "not json").unwrap();
    writeln!(file).unwrap();

    let records = read_journal(&path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].op, Operation::Scanned);
}

#[test]
fn disabled_journal_records_nothing() {
    let journal = Journal::disabled();
    journal.record(Operation::Failed, "a.jar", Some("boom".into()));
    assert!(journal.path().is_none());
}

#[tokio::test]
async fn engine_journals_the_lifecycle() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let deploy = dir.path().join("deploy");
    std::fs::create_dir(&deploy).unwrap();
    write_clean_jar(deploy.join("app.jar")).unwrap();
    let journal_path = dir.path().join("journal.jsonl");

    let engine = Engine::new(
        ConfigFileBuilder::new(&deploy)
            .command_vec(exit_command(0))
            .journal(&journal_path)
            .build(),
        Arc::new(RealFileSystem),
    )
    .unwrap();

    with_timeout(engine.execute("app.jar").await.unwrap().settle()).await;
    assert!(
        eventually(Duration::from_secs(5), || ops(&journal_path).len() >= 4).await,
        "{:?}",
        ops(&journal_path)
    );
    assert_eq!(
        ops(&journal_path),
        vec![
            Operation::Discovered,
            Operation::Scanned,
            Operation::Launched,
            Operation::Stopped,
        ]
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn blocked_launch_is_journaled_as_skipped() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let deploy = dir.path().join("deploy");
    std::fs::create_dir(&deploy).unwrap();
    write_jar(deploy.join("bad.jar"), &["lib/log4j-core-2.14.1.jar"]).unwrap();
    let journal_path = dir.path().join("journal.jsonl");

    let engine = Engine::new(
        ConfigFileBuilder::new(&deploy)
            .policy(ScanPolicy::Block)
            .journal(&journal_path)
            .build(),
        Arc::new(RealFileSystem),
    )
    .unwrap();

    engine.execute("bad.jar").await.unwrap();

    let records = read_journal(&journal_path).unwrap();
    let last = records.last().unwrap();
    assert_eq!(last.op, Operation::Skipped);
    assert!(last.detail.as_deref().unwrap().contains("log4j-core-2.14"));
    engine.shutdown().await;
}
