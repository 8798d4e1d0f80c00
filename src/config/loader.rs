// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files and the environment.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::ConsoleConfig;

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".mcp-console";

/// Global config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &["config.json", "config.yaml", "config.yml"];

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "MCP_CONSOLE_DATA_DIR";

/// Environment variable holding the GitHub token.
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";

/// Environment variable overriding the probe timeout in seconds.
pub const ENV_PROBE_TIMEOUT: &str = "MCP_CONSOLE_PROBE_TIMEOUT";

/// Get the global config directory path.
pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR))
}

/// Find the global config file, if one exists.
pub fn get_global_config_path() -> Option<PathBuf> {
    let dir = get_global_config_dir()?;
    find_config_file(&dir)
}

/// First existing config file in `dir`.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Load global configuration from `~/.mcp-console/config.{json,yaml,yml}`.
pub fn load_global_config() -> Result<Option<ConsoleConfig>, ConfigError> {
    match get_global_config_path() {
        Some(path) => load_config_file(&path).map(Some),
        None => Ok(None),
    }
}

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<ConsoleConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

/// Save configuration to a file, creating parent directories.
pub fn save_config_file(path: &Path, config: &ConsoleConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::to_string(config)?,
        _ => serde_json::to_string_pretty(config)?,
    };
    std::fs::write(path, content)?;
    Ok(())
}

/// Write an example config file at `path` unless one already exists.
pub fn init_config(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.exists() {
        return Err(ConfigError::invalid(
            "path",
            format!("{} already exists", path.display()),
        ));
    }
    save_config_file(path, &get_example_config())?;
    Ok(path.to_path_buf())
}

/// Read overrides from the process environment.
pub fn load_env_config() -> Result<ConsoleConfig, ConfigError> {
    env_config_from(|key| std::env::var(key).ok())
}

/// Build overrides from an environment lookup.
pub fn env_config_from<F>(lookup: F) -> Result<ConsoleConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let probe_timeout_sec = match non_empty(ENV_PROBE_TIMEOUT) {
        Some(value) => Some(
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_PROBE_TIMEOUT, format!("'{}' is not a number", value)))?,
        ),
        None => None,
    };

    Ok(ConsoleConfig {
        data_dir: non_empty(ENV_DATA_DIR).map(PathBuf::from),
        github_token: non_empty(ENV_GITHUB_TOKEN),
        probe_timeout_sec,
        ..Default::default()
    })
}

/// Get an example configuration.
pub fn get_example_config() -> ConsoleConfig {
    ConsoleConfig {
        probe_timeout_sec: Some(30),
        autostart: Some(true),
        persist: Some(true),
        ..Default::default()
    }
}
