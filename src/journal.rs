// src/journal.rs

//! Append-only operation journal.
//!
//! One JSON object per line:
//!
//! ```text
//! {"ts":"2026-10-16T09:12:03.114Z","op":"launched","artifact":"app.jar","detail":"pid 4242"}
//! ```
//!
//! This is the only durable state the engine keeps; the registry itself is
//! rebuilt from the directory on restart. Write failures are logged and
//! otherwise ignored.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lifecycle operations recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Discovered,
    Scanned,
    Launched,
    Stopped,
    Failed,
    Removed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub ts: DateTime<Utc>,
    pub op: Operation,
    pub artifact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug)]
pub struct Journal {
    path: Option<PathBuf>,
    file: Option<Mutex<File>>,
}

impl Journal {
    /// A journal that records nothing.
    pub fn disabled() -> Self {
        Self {
            path: None,
            file: None,
        }
    }

    /// Open (creating if needed) the journal at `path` in append mode.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating journal directory {:?}", parent))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening journal {:?}", path))?;

        Ok(Self {
            path: Some(path),
            file: Some(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, op: Operation, artifact: &str, detail: Option<String>) {
        let Some(file) = &self.file else {
            return;
        };

        let record = JournalRecord {
            ts: Utc::now(),
            op,
            artifact: artifact.to_string(),
            detail,
        };

        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                warn!(artifact, error = %err, "failed to encode journal record");
                return;
            }
        };

        let mut file = file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(err) = writeln!(file, "{line}") {
            warn!(artifact, error = %err, "failed to append to journal");
        }
    }
}

/// Read all records from a journal file, skipping lines that do not parse.
pub fn read_journal(path: &Path) -> Result<Vec<JournalRecord>> {
    let file = File::open(path).with_context(|| format!("opening journal {:?}", path))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str(trimmed) {
            Ok(record) => records.push(record),
            Err(err) => warn!(error = %err, "skipping malformed journal line"),
        }
    }
    Ok(records)
}
