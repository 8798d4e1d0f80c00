// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for mcp-console.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.mcp-console/config.json (or .yaml/.yml)
//! - Environment: MCP_CONSOLE_DATA_DIR, GITHUB_TOKEN, MCP_CONSOLE_PROBE_TIMEOUT
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > env > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    env_config_from, find_config_file, get_example_config, get_global_config_dir,
    get_global_config_path, init_config, load_config_file, load_env_config, load_global_config,
    save_config_file, CONFIG_FILES, ENV_DATA_DIR, ENV_GITHUB_TOKEN, ENV_PROBE_TIMEOUT,
    GLOBAL_CONFIG_DIR,
};

pub use merger::{default_config, merge_config, validate_config, CliOptions};

pub use types::{
    default_data_dir, ConsoleConfig, ResolvedConfig, APP_DIR_NAME, DOCUMENT_FILE, REGISTRY_FILE,
    TOOLS_DIR_NAME,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge all configuration sources.
///
/// `config_file` replaces the global config file when given.
pub fn load_config(
    config_file: Option<&Path>,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let file = match config_file {
        Some(path) => Some(load_config_file(path)?),
        None => load_global_config()?,
    };
    let env = load_env_config()?;

    let config = merge_config(file, Some(env), cli_options);
    validate_config(&config)?;
    Ok(config)
}
