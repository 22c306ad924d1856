// tests/config_validation.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use jarwatch::config::{load_and_validate, load_from_str, load_or_default, ConfigFile};
use jarwatch::errors::JarwatchError;
use jarwatch::types::{ScanPolicy, ScheduleTarget};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn expect_config_error(contents: &str) -> String {
    let file = config_file(contents);
    match load_and_validate(file.path()) {
        Err(JarwatchError::ConfigError(msg)) => msg,
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn empty_file_yields_documented_defaults() {
    let file = config_file("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.engine.watch_dir.to_str(), Some("deploy"));
    assert_eq!(cfg.engine.patterns, vec!["*.jar"]);
    assert_eq!(cfg.engine.workers, 4);
    assert_eq!(cfg.engine.queue_capacity, 64);
    assert!(cfg.engine.launch_on_startup);
    assert_eq!(cfg.launch.command, vec!["java", "-jar", "{artifact}"]);
    assert_eq!(cfg.launch.stop_grace, Duration::from_secs(5));
    assert!(!cfg.launch.restart_on_change);
    assert_eq!(cfg.scanner.policy, ScanPolicy::Advisory);
    assert!(cfg.scanner.deny.iter().any(|s| s == "log4j-core-2.14"));
    assert_eq!(cfg.scheduler.interval, Duration::from_secs(3600));
    assert_eq!(cfg.scheduler.target, ScheduleTarget::All);
    assert!(cfg.watcher.enabled);
    assert_eq!(cfg.watcher.backoff_initial, Duration::from_secs(1));
    assert_eq!(cfg.watcher.backoff_max, Duration::from_secs(60));
    assert_eq!(cfg.api.bind, "127.0.0.1:8085");
    assert!(cfg.journal.path.is_none());
    assert_eq!(cfg.effective_working_dir().to_str(), Some("deploy"));
}

#[test]
fn full_config_is_parsed() {
    let file = config_file(
        r#"
[engine]
watch_dir = "/srv/apps"
patterns = ["*.jar", "*.war"]
exclude = ["*-sources.jar"]
workers = 2
queue_capacity = 8
launch_on_startup = false

[launch]
command = ["java", "-Xmx256m", "-jar", "{artifact}"]
args = ["--name={name}"]
working_dir = "/srv/run"
stop_grace = "1500ms"
restart_on_change = true

[launch.env]
APP_ENV = "prod"

[scanner]
policy = "block"
deny = ["evil-lib-1.0"]
deny_regex = ["^lib/bad-.*\\.jar$"]

[scheduler]
interval = "10m"
target = "app.jar"

[watcher]
enabled = false
backoff_initial = "2s"
backoff_max = "30s"
max_restarts = 5

[api]
enabled = true
bind = "127.0.0.1:9999"

[journal]
path = "/var/lib/jarwatch/ops.log"
"#,
    );
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.engine.patterns.len(), 2);
    assert_eq!(cfg.engine.exclude, vec!["*-sources.jar"]);
    assert_eq!(cfg.engine.workers, 2);
    assert!(!cfg.engine.launch_on_startup);
    assert_eq!(cfg.launch.args, vec!["--name={name}"]);
    assert_eq!(cfg.launch.stop_grace, Duration::from_millis(1500));
    assert_eq!(cfg.launch.env.get("APP_ENV").map(String::as_str), Some("prod"));
    assert_eq!(cfg.effective_working_dir().to_str(), Some("/srv/run"));
    assert_eq!(cfg.scanner.policy, ScanPolicy::Block);
    assert_eq!(cfg.scanner.deny, vec!["evil-lib-1.0"]);
    assert_eq!(cfg.scheduler.interval, Duration::from_secs(600));
    assert_eq!(cfg.scheduler.target, ScheduleTarget::Named("app.jar".into()));
    assert!(!cfg.watcher.enabled);
    assert_eq!(cfg.watcher.max_restarts, 5);
    assert_eq!(cfg.api.bind, "127.0.0.1:9999");
    assert!(cfg.journal.path.is_some());
}

#[test]
fn zero_interval_disables_scheduler() {
    let raw = load_from_str("[scheduler]\ninterval = \"0s\"\n").unwrap();
    let cfg = ConfigFile::try_from(raw).unwrap();
    assert!(cfg.scheduler.interval.is_zero());
}

#[test]
fn zero_workers_is_rejected() {
    let msg = expect_config_error("[engine]\nworkers = 0\n");
    assert!(msg.contains("workers"));
}

#[test]
fn zero_queue_capacity_is_rejected() {
    let msg = expect_config_error("[engine]\nqueue_capacity = 0\n");
    assert!(msg.contains("queue_capacity"));
}

#[test]
fn empty_command_is_rejected() {
    let msg = expect_config_error("[launch]\ncommand = []\n");
    assert!(msg.contains("command"));
}

#[test]
fn command_without_placeholder_is_rejected() {
    let msg = expect_config_error("[launch]\ncommand = [\"java\", \"-jar\", \"app.jar\"]\n");
    assert!(msg.contains("{artifact}"));
}

#[test]
fn placeholder_in_args_is_enough() {
    let file = config_file("[launch]\ncommand = [\"run-it\"]\nargs = [\"{name}\"]\n");
    assert!(load_and_validate(file.path()).is_ok());
}

#[test]
fn invalid_glob_is_rejected() {
    let msg = expect_config_error("[engine]\npatterns = [\"[*.jar\"]\n");
    assert!(msg.contains("invalid glob"));
}

#[test]
fn invalid_regex_is_rejected() {
    let msg = expect_config_error("[scanner]\ndeny_regex = [\"(unclosed\"]\n");
    assert!(msg.contains("deny_regex"));
}

#[test]
fn zero_stop_grace_is_rejected() {
    let msg = expect_config_error("[launch]\nstop_grace = \"0s\"\n");
    assert!(msg.contains("stop_grace"));
}

#[test]
fn backoff_initial_above_max_is_rejected() {
    let msg = expect_config_error("[watcher]\nbackoff_initial = \"2m\"\nbackoff_max = \"1m\"\n");
    assert!(msg.contains("backoff_initial"));
}

#[test]
fn bad_bind_address_is_rejected_only_when_enabled() {
    let msg = expect_config_error("[api]\nbind = \"localhost\"\n");
    assert!(msg.contains("[api].bind"));

    let file = config_file("[api]\nenabled = false\nbind = \"localhost\"\n");
    assert!(load_and_validate(file.path()).is_ok());
}

#[test]
fn malformed_duration_is_a_toml_error() {
    let file = config_file("[launch]\nstop_grace = \"5 parsecs\"\n");
    match load_and_validate(file.path()) {
        Err(JarwatchError::TomlError(e)) => assert!(e.to_string().contains("duration unit")),
        other => panic!("Expected TomlError, got: {:?}", other.map(|_| ())),
    }
}

#[test]
fn unknown_keys_are_rejected() {
    let file = config_file("[engine]\nwatchdir = \"typo\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(JarwatchError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_io_error_but_default_loader_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("Jarwatch.toml");

    assert!(matches!(
        load_and_validate(&missing),
        Err(JarwatchError::IoError(_))
    ));

    let cfg = load_or_default(&missing).unwrap();
    assert_eq!(cfg.engine.workers, 4);
}
