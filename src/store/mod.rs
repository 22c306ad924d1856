// src/store/mod.rs

//! Read-only view of the watched directory.
//!
//! The store never mutates anything: it lists artifacts (files whose name
//! matches the configured globs) and classifies event paths for the watcher.
//! Access failures are logged and produce empty results, never errors, so a
//! transiently unreadable directory is simply retried on the next event or
//! scheduler tick.

pub mod matcher;
pub mod path_utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ConfigFile;
use crate::fs::FileSystem;
use crate::types::ArtifactName;

pub use matcher::ArtifactMatcher;
pub use path_utils::{direct_child_name, relative_str};

/// A deployable archive discovered in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// File name; the unique key across the engine.
    pub name: ArtifactName,
    pub path: PathBuf,
    /// Last observed modification time.
    pub modified: DateTime<Utc>,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    matcher: ArtifactMatcher,
    fs: Arc<dyn FileSystem>,
}

impl ArtifactStore {
    /// Create a store over `dir`.
    ///
    /// The directory is canonicalized once so event paths reported by the OS
    /// can be related to it; if that fails (e.g. it does not exist yet) the
    /// path is used as given.
    pub fn new(dir: impl Into<PathBuf>, matcher: ArtifactMatcher, fs: Arc<dyn FileSystem>) -> Self {
        let dir = dir.into();
        let dir = fs.canonicalize(&dir).unwrap_or(dir);
        Self { dir, matcher, fs }
    }

    pub fn from_config(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let matcher = ArtifactMatcher::new(&cfg.engine.patterns, &cfg.engine.exclude)?;
        Ok(Self::new(cfg.engine.watch_dir.clone(), matcher, fs))
    }

    /// The (canonical, when possible) watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Snapshot of all artifacts currently in the directory, sorted by name.
    ///
    /// Returns an empty list if the directory is empty or unreadable.
    pub fn list_artifacts(&self) -> Vec<Artifact> {
        let entries = match self.fs.read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = ?self.dir, error = %err, "failed to list watched directory");
                return Vec::new();
            }
        };

        let mut artifacts: Vec<Artifact> = entries
            .iter()
            .filter_map(|path| self.artifact_at(path))
            .collect();
        artifacts.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(dir = ?self.dir, count = artifacts.len(), "listed artifacts");
        artifacts
    }

    /// Build an `Artifact` for `path` if it is an existing candidate file.
    pub fn artifact_at(&self, path: &Path) -> Option<Artifact> {
        let name = self.candidate_name(path)?;
        if !self.fs.is_file(path) {
            return None;
        }

        match self.fs.metadata(path) {
            Ok(meta) => Some(Artifact {
                name,
                path: path.to_path_buf(),
                modified: DateTime::<Utc>::from(meta.modified),
                size: meta.len,
            }),
            Err(err) => {
                warn!(path = ?path, error = %err, "failed to read artifact metadata");
                None
            }
        }
    }

    /// Look up an artifact by name.
    pub fn find(&self, name: &str) -> Option<Artifact> {
        if name.contains('/') || name.contains('\\') {
            return None;
        }
        self.artifact_at(&self.dir.join(name))
    }

    /// Name of the artifact `path` refers to, whether or not it still exists.
    ///
    /// Used for delete events, where the file is already gone.
    pub fn candidate_name(&self, path: &Path) -> Option<ArtifactName> {
        let name = direct_child_name(&self.dir, path)?;
        self.matcher.matches(&name).then_some(name)
    }

    pub fn is_candidate(&self, path: &Path) -> bool {
        self.candidate_name(path).is_some()
    }
}
