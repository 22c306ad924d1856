use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;
use crate::types::ArtifactName;

/// Compute the blake3 hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Remembers the last content hash seen for each artifact.
///
/// Editors and copy tools emit several modify events for a single write; the
/// watcher uses this to only treat a modification as a real change when the
/// archive bytes differ from what was last launched.
#[derive(Debug, Default)]
pub struct ContentTracker {
    hashes: Mutex<HashMap<ArtifactName, String>>,
}

impl ContentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `hash` for `name`, returning true if it differs from the
    /// previously recorded hash (or none was recorded).
    pub fn observe(&self, name: &str, hash: &str) -> bool {
        let mut hashes = self
            .hashes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match hashes.get(name) {
            Some(old) if old == hash => {
                debug!(artifact = %name, "content unchanged");
                false
            }
            _ => {
                hashes.insert(name.to_string(), hash.to_string());
                true
            }
        }
    }

    pub fn forget(&self, name: &str) {
        let mut hashes = self
            .hashes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if hashes.remove(name).is_some() {
            debug!(artifact = %name, "forgot content hash");
        }
    }
}
