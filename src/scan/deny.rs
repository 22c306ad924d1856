// src/scan/deny.rs

//! Deny-list signatures for archive entry names.

use anyhow::{Context, Result};
use regex::Regex;

/// Library name fragments with well-known remote-code-execution advisories.
///
/// Matched as case-insensitive substrings of archive entry names, so
/// `BOOT-INF/lib/log4j-core-2.14.1.jar` is caught by `log4j-core-2.14`.
const DEFAULT_DENY: &[&str] = &[
    "log4j-core-2.0",
    "log4j-core-2.1.",
    "log4j-core-2.2.",
    "log4j-core-2.3.",
    "log4j-core-2.4",
    "log4j-core-2.5",
    "log4j-core-2.6",
    "log4j-core-2.7",
    "log4j-core-2.8",
    "log4j-core-2.9",
    "log4j-core-2.10",
    "log4j-core-2.11",
    "log4j-core-2.12",
    "log4j-core-2.13",
    "log4j-core-2.14",
    "log4j-core-2.15",
    "log4j-core-2.16",
    "commons-collections-3.2.1",
    "commons-text-1.9",
    "spring-beans-5.3.17",
    "struts2-core-2.3",
    "xstream-1.4.17",
];

pub fn default_deny_list() -> Vec<String> {
    DEFAULT_DENY.iter().map(|s| s.to_string()).collect()
}

/// Compiled signatures.
#[derive(Debug, Clone)]
pub struct DenyList {
    /// Lowercased substrings, paired with the signature as configured.
    substrings: Vec<(String, String)>,
    regexes: Vec<Regex>,
}

impl DenyList {
    pub fn new(substrings: &[String], regexes: &[String]) -> Result<Self> {
        let substrings = substrings
            .iter()
            .map(|s| (s.to_lowercase(), s.clone()))
            .collect();

        let regexes = regexes
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("invalid deny regex: {pattern}"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            substrings,
            regexes,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.substrings.is_empty() && self.regexes.is_empty()
    }

    /// Return the first signature matching `entry`, if any.
    pub fn first_match(&self, entry: &str) -> Option<String> {
        let lowered = entry.to_lowercase();
        if let Some((_, signature)) = self
            .substrings
            .iter()
            .find(|(needle, _)| lowered.contains(needle.as_str()))
        {
            return Some(signature.clone());
        }

        self.regexes
            .iter()
            .find(|re| re.is_match(entry))
            .map(|re| re.as_str().to_string())
    }
}
