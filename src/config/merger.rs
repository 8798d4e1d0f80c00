// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::path::PathBuf;

use crate::error::ConfigError;

use super::types::{default_data_dir, ConsoleConfig, ResolvedConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub data_dir: Option<PathBuf>,
    pub github_token: Option<String>,
    pub probe_timeout_sec: Option<u64>,
    pub autostart: Option<bool>,
    pub persist: Option<bool>,
}

impl From<CliOptions> for ConsoleConfig {
    fn from(cli: CliOptions) -> Self {
        Self {
            data_dir: cli.data_dir,
            github_token: cli.github_token,
            probe_timeout_sec: cli.probe_timeout_sec,
            autostart: cli.autostart,
            persist: cli.persist,
            ..Default::default()
        }
    }
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Environment variables
/// 3. Global config file (~/.mcp-console/config.json)
/// 4. Default values
///
/// Paths derived from the data directory (registry, document, tools dir) are
/// resolved after all layers are applied, so moving the data directory moves
/// them too unless they were set explicitly.
pub fn merge_config(
    global: Option<ConsoleConfig>,
    env: Option<ConsoleConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut merged = ConsoleConfig::default();

    for layer in [global, env, Some(cli.into())].into_iter().flatten() {
        apply_layer(&mut merged, layer);
    }

    let data_dir = merged.data_dir.clone().unwrap_or_else(default_data_dir);
    let mut result = ResolvedConfig::with_data_dir(data_dir);

    if let Some(tools_dir) = merged.tools_dir {
        result.tools_dir = tools_dir;
    }
    if let Some(document_path) = merged.document_path {
        result.document_path = document_path;
    }
    if let Some(url) = merged.github_api_url {
        result.github_api_url = url;
    }
    if merged.github_token.is_some() {
        result.github_token = merged.github_token;
    }
    if let Some(timeout) = merged.probe_timeout_sec {
        result.probe_timeout_sec = timeout;
    }
    if let Some(autostart) = merged.autostart {
        result.autostart = autostart;
    }
    if let Some(persist) = merged.persist {
        result.persist = persist;
    }

    result
}

fn apply_layer(result: &mut ConsoleConfig, layer: ConsoleConfig) {
    if layer.data_dir.is_some() {
        result.data_dir = layer.data_dir;
    }
    if layer.tools_dir.is_some() {
        result.tools_dir = layer.tools_dir;
    }
    if layer.document_path.is_some() {
        result.document_path = layer.document_path;
    }
    if layer.github_api_url.is_some() {
        result.github_api_url = layer.github_api_url;
    }
    if layer.github_token.is_some() {
        result.github_token = layer.github_token;
    }
    if layer.probe_timeout_sec.is_some() {
        result.probe_timeout_sec = layer.probe_timeout_sec;
    }
    if layer.autostart.is_some() {
        result.autostart = layer.autostart;
    }
    if layer.persist.is_some() {
        result.persist = layer.persist;
    }
}

/// Reject values the rest of the application cannot work with.
pub fn validate_config(config: &ResolvedConfig) -> Result<(), ConfigError> {
    if config.probe_timeout_sec == 0 {
        return Err(ConfigError::invalid("probeTimeoutSec", "must be greater than zero"));
    }
    if !config.github_api_url.starts_with("http://") && !config.github_api_url.starts_with("https://") {
        return Err(ConfigError::invalid(
            "githubApiUrl",
            format!("'{}' is not an http(s) URL", config.github_api_url),
        ));
    }
    Ok(())
}
