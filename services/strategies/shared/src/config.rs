//! Strategy configuration utilities

use crate::traits::StrategyConfig;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Load configuration from TOML file
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Resolve the config path from `env_var`, falling back to `default_path`
pub fn resolve_config_path(env_var: &str, default_path: &str) -> PathBuf {
    match std::env::var(env_var) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(default_path),
    }
}

/// Load `path` if it exists, otherwise run with `default`
pub fn load_config_file<T: DeserializeOwned>(path: impl AsRef<Path>, default: T) -> Result<T> {
    let path = path.as_ref();
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(default);
    }

    info!("Loading configuration from {}", path.display());
    load_config(path)
}

/// Load and validate in one step; any validation failure is fatal to startup
pub fn load_validated_config<T>(path: impl AsRef<Path>, default: T) -> Result<T::Validated>
where
    T: StrategyConfig + DeserializeOwned,
{
    let config = load_config_file(path, default)?;
    config.validate().context("Configuration rejected at startup")
}
