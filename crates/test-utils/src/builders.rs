#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use jarwatch::config::{ConfigFile, RawConfigFile};
use jarwatch::types::{ScanPolicy, ScheduleTarget};

/// Keeps running until stopped. `exec` so SIGTERM reaches `sleep` directly.
pub const SLEEP_COMMAND: [&str; 4] = ["sh", "-c", "exec sleep 30", "{artifact}"];

/// Launch command that exits immediately with `code`.
pub fn exit_command(code: i32) -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("exit {code}"),
        "{name}".to_string(),
    ]
}

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults with the parts tests rarely want
/// switched off: no control API, no scheduler, watcher disabled, no
/// launch-on-startup, and a long-running `sh` command instead of `java`.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(watch_dir: impl AsRef<Path>) -> Self {
        let mut config = RawConfigFile::default();
        config.engine.watch_dir = watch_dir.as_ref().to_path_buf();
        config.engine.launch_on_startup = false;
        config.launch.command = SLEEP_COMMAND.iter().map(|s| s.to_string()).collect();
        config.launch.stop_grace = Duration::from_secs(2);
        config.scheduler.interval = Duration::ZERO;
        config.watcher.enabled = false;
        config.api.enabled = false;
        Self { config }
    }

    pub fn command(mut self, command: &[&str]) -> Self {
        self.config.launch.command = command.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn command_vec(mut self, command: Vec<String>) -> Self {
        self.config.launch.command = command;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.launch.working_dir = Some(dir.into());
        self
    }

    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.config.launch.stop_grace = grace;
        self
    }

    pub fn restart_on_change(mut self, val: bool) -> Self {
        self.config.launch.restart_on_change = val;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.engine.workers = workers;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.engine.queue_capacity = capacity;
        self
    }

    pub fn launch_on_startup(mut self, val: bool) -> Self {
        self.config.engine.launch_on_startup = val;
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.engine.exclude.push(pattern.to_string());
        self
    }

    pub fn policy(mut self, policy: ScanPolicy) -> Self {
        self.config.scanner.policy = policy;
        self
    }

    pub fn scheduler(mut self, interval: Duration, target: ScheduleTarget) -> Self {
        self.config.scheduler.interval = interval;
        self.config.scheduler.target = target;
        self
    }

    pub fn watcher(mut self, enabled: bool) -> Self {
        self.config.watcher.enabled = enabled;
        self
    }

    pub fn backoff(mut self, initial: Duration, max: Duration, max_restarts: u32) -> Self {
        self.config.watcher.backoff_initial = initial;
        self.config.watcher.backoff_max = max;
        self.config.watcher.max_restarts = max_restarts;
        self
    }

    pub fn api(mut self, bind: &str) -> Self {
        self.config.api.enabled = true;
        self.config.api.bind = bind.to_string();
        self
    }

    pub fn journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.journal.path = Some(path.into());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}
