// src/engine/pipeline.rs

//! Pure decisions on the scan → launch path.
//!
//! Kept free of IO so the rules can be tested without processes or files;
//! [`Engine`](super::Engine) applies them.

use crate::registry::Job;
use crate::scan::ScanFinding;
use crate::types::ScanPolicy;

/// Findings that count against an artifact under `policy`.
///
/// `unreadable` findings never block: an archive the scanner cannot open is
/// still handed to the launcher, which reports the real problem.
pub fn blocking_findings<'a>(policy: ScanPolicy, findings: &'a [ScanFinding]) -> Vec<&'a ScanFinding> {
    match policy {
        ScanPolicy::Advisory => Vec::new(),
        ScanPolicy::Block => findings.iter().filter(|f| !f.is_unreadable()).collect(),
    }
}

/// What the watcher should do about a create/modify event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// Scan and launch.
    Launch,
    /// Stop the running process, scan, and launch again.
    Restart,
    /// Nothing to do (duplicate event, or already running without restart).
    Ignore,
}

/// Decide how to react to an event for an artifact.
///
/// - `current`: the registry record, if any.
/// - `content_changed`: whether the archive bytes differ from the last seen.
/// - `restart_on_change`: the `[launch] restart_on_change` setting.
pub fn change_action(current: Option<&Job>, content_changed: bool, restart_on_change: bool) -> ChangeAction {
    match current {
        None => ChangeAction::Launch,
        Some(job) if job.state.is_active() => {
            if content_changed && restart_on_change {
                ChangeAction::Restart
            } else {
                ChangeAction::Ignore
            }
        }
        // Terminal record: relaunch only for new content.
        Some(_) if content_changed => ChangeAction::Launch,
        Some(_) => ChangeAction::Ignore,
    }
}
