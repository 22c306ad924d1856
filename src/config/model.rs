// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::scan::deny::default_deny_list;
use crate::types::{parse_duration, ScanPolicy, ScheduleTarget};

/// Placeholder replaced by the artifact's full path in `launch.command` / `launch.args`.
pub const ARTIFACT_PLACEHOLDER: &str = "{artifact}";

/// Placeholder replaced by the artifact's file name.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [engine]
/// watch_dir = "deploy"
/// workers = 4
///
/// [launch]
/// command = ["java", "-jar", "{artifact}"]
/// stop_grace = "5s"
///
/// [scheduler]
/// interval = "1h"
/// target = "all"
/// ```
///
/// All sections are optional and have reasonable defaults. Durations are
/// strings with a unit suffix (`ms`, `s`, `m`, `h`) and are parsed while
/// deserializing, so a `RawConfigFile` never carries a malformed duration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub launch: LaunchSection,

    #[serde(default)]
    pub scanner: ScannerSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub watcher: WatcherSection,

    #[serde(default)]
    pub api: ApiSection,

    #[serde(default)]
    pub journal: JournalSection,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (see
/// `validate.rs`), so the rest of the crate can rely on its invariants:
/// at least one worker, a non-empty launch command, compilable patterns.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub launch: LaunchSection,
    pub scanner: ScannerSection,
    pub scheduler: SchedulerSection,
    pub watcher: WatcherSection,
    pub api: ApiSection,
    pub journal: JournalSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            engine: raw.engine,
            launch: raw.launch,
            scanner: raw.scanner,
            scheduler: raw.scheduler,
            watcher: raw.watcher,
            api: raw.api,
            journal: raw.journal,
        }
    }

    /// Directory processes are started in: `launch.working_dir` if set,
    /// otherwise the watched directory.
    pub fn effective_working_dir(&self) -> PathBuf {
        self.launch
            .working_dir
            .clone()
            .unwrap_or_else(|| self.engine.watch_dir.clone())
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Directory that is watched for artifacts (not recursive).
    #[serde(default = "default_watch_dir")]
    pub watch_dir: PathBuf,

    /// Glob patterns (matched against the file name) selecting artifacts.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    /// Glob patterns excluding otherwise matching files.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Number of launch workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the launch request queue in front of the workers.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Launch every artifact already present when the engine starts.
    #[serde(default = "default_true")]
    pub launch_on_startup: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            watch_dir: default_watch_dir(),
            patterns: default_patterns(),
            exclude: Vec::new(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            launch_on_startup: true,
        }
    }
}

/// `[launch]` section: how an artifact becomes a process.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchSection {
    /// Program and leading arguments. `{artifact}` is replaced by the
    /// artifact path and `{name}` by its file name.
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Extra arguments appended after `command` (same placeholders).
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for launched processes; defaults to `engine.watch_dir`.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables for launched processes.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// How long `stop` waits after SIGTERM before killing the process.
    #[serde(
        default = "default_stop_grace",
        deserialize_with = "deserialize_duration"
    )]
    pub stop_grace: Duration,

    /// If true, a modified artifact whose content changed while running is
    /// stopped and launched again. Otherwise the running process is kept.
    #[serde(default)]
    pub restart_on_change: bool,
}

impl Default for LaunchSection {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            stop_grace: default_stop_grace(),
            restart_on_change: false,
        }
    }
}

/// `[scanner]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerSection {
    #[serde(default)]
    pub policy: ScanPolicy,

    /// Substrings that flag an archive entry name.
    #[serde(default = "default_deny_list")]
    pub deny: Vec<String>,

    /// Regular expressions that flag an archive entry name.
    #[serde(default)]
    pub deny_regex: Vec<String>,
}

impl Default for ScannerSection {
    fn default() -> Self {
        Self {
            policy: ScanPolicy::default(),
            deny: default_deny_list(),
            deny_regex: Vec::new(),
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSection {
    /// Tick interval; `"0s"` disables the scheduler.
    #[serde(
        default = "default_schedule_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub interval: Duration,

    /// `"all"` or a single artifact name.
    #[serde(default, deserialize_with = "deserialize_target")]
    pub target: ScheduleTarget,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            interval: default_schedule_interval(),
            target: ScheduleTarget::All,
        }
    }
}

/// `[watcher]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatcherSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// First delay before re-arming a watcher whose event source failed.
    #[serde(
        default = "default_backoff_initial",
        deserialize_with = "deserialize_duration"
    )]
    pub backoff_initial: Duration,

    /// Upper bound for the doubling re-arm delay.
    #[serde(
        default = "default_backoff_max",
        deserialize_with = "deserialize_duration"
    )]
    pub backoff_max: Duration,

    /// Give up after this many consecutive re-arms (0 = never give up).
    #[serde(default)]
    pub max_restarts: u32,
}

impl Default for WatcherSection {
    fn default() -> Self {
        Self {
            enabled: true,
            backoff_initial: default_backoff_initial(),
            backoff_max: default_backoff_max(),
            max_restarts: 0,
        }
    }
}

/// `[api]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Socket address the control API listens on.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
        }
    }
}

/// `[journal]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JournalSection {
    /// Append-only operation log; no journal is written when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_watch_dir() -> PathBuf {
    PathBuf::from("deploy")
}

fn default_patterns() -> Vec<String> {
    vec!["*.jar".to_string()]
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_command() -> Vec<String> {
    vec![
        "java".to_string(),
        "-jar".to_string(),
        ARTIFACT_PLACEHOLDER.to_string(),
    ]
}

fn default_stop_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_schedule_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_backoff_initial() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_max() -> Duration {
    Duration::from_secs(60)
}

fn default_bind() -> String {
    "127.0.0.1:8085".to_string()
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

fn deserialize_target<'de, D>(deserializer: D) -> std::result::Result<ScheduleTarget, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}
