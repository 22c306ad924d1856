// src/store/matcher.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled include/exclude glob patterns deciding which files are artifacts.
///
/// Patterns are matched against the bare file name (the watched directory is
/// not recursive), e.g. `"*.jar"` or `"service-*.jar"`.
#[derive(Clone)]
pub struct ArtifactMatcher {
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for ArtifactMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactMatcher")
            .field("include", &self.include_set.len())
            .field("exclude", &self.exclude_set.as_ref().map(GlobSet::len))
            .finish()
    }
}

impl ArtifactMatcher {
    pub fn new(patterns: &[String], exclude: &[String]) -> Result<Self> {
        let include_set =
            build_globset(patterns).context("building artifact include globset")?;

        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building artifact exclude globset")?)
        };

        Ok(Self {
            include_set,
            exclude_set,
        })
    }

    /// Returns true if a file with this name is an artifact.
    pub fn matches(&self, file_name: &str) -> bool {
        if !self.include_set.is_match(file_name) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(file_name) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
