// src/scan/mod.rs

//! Advisory security screening of artifacts.
//!
//! The scanner opens an artifact as a zip archive (JARs are zips), walks the
//! entry names and reports a finding for every entry that matches the deny
//! list. It never fails: an archive that cannot be opened produces a single
//! synthetic `unreadable` finding instead. Whether findings gate a launch is
//! decided by the engine's [`ScanPolicy`](crate::types::ScanPolicy), not here.

pub mod deny;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::config::ConfigFile;
use crate::fs::FileSystem;
use crate::store::Artifact;
use crate::types::{ArtifactName, Severity};

pub use deny::DenyList;

/// Signature used for the synthetic finding of an archive that could not be read.
pub const UNREADABLE_SIGNATURE: &str = "unreadable";

/// One advisory observation about an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFinding {
    pub artifact: ArtifactName,
    /// Offending archive entry; `None` for the `unreadable` finding.
    pub entry: Option<String>,
    pub signature: String,
    pub severity: Severity,
}

impl ScanFinding {
    pub fn is_unreadable(&self) -> bool {
        self.entry.is_none() && self.signature == UNREADABLE_SIGNATURE
    }
}

#[derive(Debug, Clone)]
pub struct SecurityScanner {
    deny: DenyList,
    fs: Arc<dyn FileSystem>,
}

impl SecurityScanner {
    pub fn new(deny: DenyList, fs: Arc<dyn FileSystem>) -> Self {
        Self { deny, fs }
    }

    pub fn from_config(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let deny = DenyList::new(&cfg.scanner.deny, &cfg.scanner.deny_regex)?;
        Ok(Self::new(deny, fs))
    }

    /// Scan `artifact` and return its findings (empty when clean).
    ///
    /// Blocking: reads the archive's central directory. Call from `spawn_blocking` in async
    /// contexts.
    pub fn scan(&self, artifact: &Artifact) -> Vec<ScanFinding> {
        let entries = match self.entries(artifact) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    artifact = %artifact.name,
                    error = %format!("{err:#}"),
                    "artifact could not be read as an archive"
                );
                return vec![ScanFinding {
                    artifact: artifact.name.clone(),
                    entry: None,
                    signature: UNREADABLE_SIGNATURE.to_string(),
                    severity: Severity::Warn,
                }];
            }
        };

        let findings: Vec<ScanFinding> = entries
            .into_iter()
            .filter_map(|entry| {
                let signature = self.deny.first_match(&entry)?;
                Some(ScanFinding {
                    artifact: artifact.name.clone(),
                    entry: Some(entry),
                    signature,
                    severity: Severity::Warn,
                })
            })
            .collect();

        for finding in &findings {
            warn!(
                artifact = %finding.artifact,
                entry = finding.entry.as_deref().unwrap_or_default(),
                signature = %finding.signature,
                "known-vulnerable entry found in artifact"
            );
        }
        debug!(artifact = %artifact.name, findings = findings.len(), "scan complete");

        findings
    }

    /// List the entry names inside `artifact`, in archive order.
    pub fn entries(&self, artifact: &Artifact) -> Result<Vec<String>> {
        let reader = self.fs.open_seekable(&artifact.path)?;
        let mut archive = ZipArchive::new(reader)
            .with_context(|| format!("opening {:?} as a zip archive", artifact.path))?;

        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .with_context(|| format!("reading entry {index} of {:?}", artifact.path))?;
            names.push(entry.name().to_string());
        }
        Ok(names)
    }
}
