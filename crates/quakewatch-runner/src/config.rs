//! Startup configuration for the runner.
//!
//! Two environment variables are read here. Everything else comes from
//! the YAML file, which the core crate parses and overrides.

use std::path::{Path, PathBuf};

use quakewatch_core::config::QuakewatchConfig;
use quakewatch_types::PushToken;

use crate::error::RunnerError;

/// Config file used when `QUAKEWATCH_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "quakewatch.yaml";

/// Values the runner takes straight from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerEnv {
    /// Path to the YAML config file.
    pub config_path: PathBuf,
    /// Push registration token, if this device has one.
    pub push_token: Option<PushToken>,
}

impl RunnerEnv {
    /// Read from the process environment.
    ///
    /// - `QUAKEWATCH_CONFIG` -- config file path (default `quakewatch.yaml`)
    /// - `QUAKEWATCH_PUSH_TOKEN` -- push token; unset or empty means no
    ///   push permission
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config_path = lookup("QUAKEWATCH_CONFIG")
            .filter(|path| !path.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        let push_token = lookup("QUAKEWATCH_PUSH_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .map(PushToken::new);
        Self {
            config_path,
            push_token,
        }
    }
}

/// Where the loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from the config file.
    File,
    /// The file was missing; built-in defaults were used.
    Defaults,
}

/// Load the config file, falling back to built-in defaults when it does
/// not exist. Environment overrides apply either way.
///
/// Runs before logging is initialised, so nothing is logged here; the
/// caller reports the [`ConfigSource`] once a subscriber is installed.
///
/// # Errors
///
/// Returns [`RunnerError::Config`] if the file exists but cannot be read
/// or parsed, or if an override or the resulting values are invalid.
pub fn load_config(path: &Path) -> Result<(QuakewatchConfig, ConfigSource), RunnerError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

fn load_config_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(QuakewatchConfig, ConfigSource), RunnerError> {
    if path.exists() {
        return Ok((QuakewatchConfig::from_file(path)?, ConfigSource::File));
    }
    let config = defaults_with_overrides(lookup)?;
    Ok((config, ConfigSource::Defaults))
}

fn defaults_with_overrides(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<QuakewatchConfig, RunnerError> {
    let mut config = QuakewatchConfig::default();
    config.apply_overrides(lookup)?;
    config.validate()?;
    Ok(config)
}
