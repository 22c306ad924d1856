use std::net::SocketAddr;

use globset::Glob;
use regex::Regex;

use crate::config::model::{
    ConfigFile, RawConfigFile, ARTIFACT_PLACEHOLDER, NAME_PLACEHOLDER,
};
use crate::errors::{JarwatchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::JarwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_engine(cfg)?;
    validate_launch(cfg)?;
    validate_scanner(cfg)?;
    validate_watcher(cfg)?;
    validate_api(cfg)?;
    Ok(())
}

fn validate_engine(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.workers == 0 {
        return Err(JarwatchError::ConfigError(
            "[engine].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.engine.queue_capacity == 0 {
        return Err(JarwatchError::ConfigError(
            "[engine].queue_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.engine.patterns.is_empty() {
        return Err(JarwatchError::ConfigError(
            "[engine].patterns must contain at least one glob".to_string(),
        ));
    }

    for pattern in cfg.engine.patterns.iter().chain(cfg.engine.exclude.iter()) {
        Glob::new(pattern).map_err(|e| {
            JarwatchError::ConfigError(format!("invalid glob pattern '{}': {}", pattern, e))
        })?;
    }
    Ok(())
}

fn validate_launch(cfg: &RawConfigFile) -> Result<()> {
    let launch = &cfg.launch;

    match launch.command.first() {
        None => {
            return Err(JarwatchError::ConfigError(
                "[launch].command must not be empty".to_string(),
            ));
        }
        Some(program) if program.trim().is_empty() => {
            return Err(JarwatchError::ConfigError(
                "[launch].command program must not be blank".to_string(),
            ));
        }
        Some(_) => {}
    }

    let references_artifact = launch
        .command
        .iter()
        .chain(launch.args.iter())
        .any(|part| part.contains(ARTIFACT_PLACEHOLDER) || part.contains(NAME_PLACEHOLDER));
    if !references_artifact {
        return Err(JarwatchError::ConfigError(format!(
            "[launch].command or [launch].args must reference the artifact via '{}' or '{}'",
            ARTIFACT_PLACEHOLDER, NAME_PLACEHOLDER
        )));
    }

    if launch.stop_grace.is_zero() {
        return Err(JarwatchError::ConfigError(
            "[launch].stop_grace must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_scanner(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scanner.deny.iter().any(|s| s.trim().is_empty()) {
        return Err(JarwatchError::ConfigError(
            "[scanner].deny must not contain empty signatures".to_string(),
        ));
    }

    for pattern in cfg.scanner.deny_regex.iter() {
        Regex::new(pattern).map_err(|e| {
            JarwatchError::ConfigError(format!(
                "invalid [scanner].deny_regex '{}': {}",
                pattern, e
            ))
        })?;
    }
    Ok(())
}

fn validate_watcher(cfg: &RawConfigFile) -> Result<()> {
    let watcher = &cfg.watcher;
    if watcher.backoff_initial.is_zero() {
        return Err(JarwatchError::ConfigError(
            "[watcher].backoff_initial must be greater than zero".to_string(),
        ));
    }
    if watcher.backoff_initial > watcher.backoff_max {
        return Err(JarwatchError::ConfigError(format!(
            "[watcher].backoff_initial ({:?}) must not exceed backoff_max ({:?})",
            watcher.backoff_initial, watcher.backoff_max
        )));
    }
    Ok(())
}

fn validate_api(cfg: &RawConfigFile) -> Result<()> {
    if !cfg.api.enabled {
        return Ok(());
    }
    cfg.api.bind.parse::<SocketAddr>().map_err(|e| {
        JarwatchError::ConfigError(format!(
            "[api].bind '{}' is not a socket address: {}",
            cfg.api.bind, e
        ))
    })?;
    Ok(())
}
