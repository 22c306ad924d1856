use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Canonical artifact name type (the file name, e.g. `app.jar`).
pub type ArtifactName = String;

/// Lifecycle state of a job in the registry.
///
/// `Pending` and `Running` are the "active" states: at most one job per
/// artifact may be in either of them at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Pending,
    Running,
    Stopped,
    Failed,
}

impl JobState {
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Pending | JobState::Running)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Stopped => "STOPPED",
            JobState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Severity of a scan finding. Findings are advisory, so there is only one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warn,
}

/// What the launcher does with an artifact that has scan findings.
///
/// - `Advisory` (default): findings are logged and journaled, launch proceeds.
/// - `Block`: an artifact with at least one signature match is not launched.
///   Archives that could not be read are still launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPolicy {
    #[default]
    Advisory,
    Block,
}

impl FromStr for ScanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "advisory" => Ok(ScanPolicy::Advisory),
            "block" => Ok(ScanPolicy::Block),
            other => Err(format!(
                "invalid scanner policy: {other} (expected \"advisory\" or \"block\")"
            )),
        }
    }
}

/// Which artifacts a scheduler tick covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScheduleTarget {
    #[default]
    All,
    Named(ArtifactName),
}

impl ScheduleTarget {
    pub fn includes(&self, name: &str) -> bool {
        match self {
            ScheduleTarget::All => true,
            ScheduleTarget::Named(target) => target == name,
        }
    }
}

impl FromStr for ScheduleTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("scheduler target must not be empty".to_string());
        }
        if s.eq_ignore_ascii_case("all") {
            Ok(ScheduleTarget::All)
        } else {
            Ok(ScheduleTarget::Named(s.to_string()))
        }
    }
}

impl fmt::Display for ScheduleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleTarget::All => f.write_str("all"),
            ScheduleTarget::Named(name) => f.write_str(name),
        }
    }
}

/// Why an artifact is being scanned and launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Initial sweep of the directory at startup.
    Startup,
    /// Filesystem create/modify event.
    FileWatch,
    /// Scheduler tick.
    Schedule,
    /// Operator request (console or control API).
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trigger::Startup => "startup",
            Trigger::FileWatch => "file-watch",
            Trigger::Schedule => "schedule",
            Trigger::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Parse a duration string like `"500ms"`, `"5s"`, `"10m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
