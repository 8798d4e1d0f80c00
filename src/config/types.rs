// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of the config file and the resolved configuration,
//! supporting JSON and YAML formats.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::github::DEFAULT_API_URL;
use crate::mcp::client::DEFAULT_PROBE_TIMEOUT_SECS;

/// Application directory name under the platform data dir.
pub const APP_DIR_NAME: &str = "mcp-console";

/// Registry file name inside the data directory.
pub const REGISTRY_FILE: &str = "tools.json";

/// Configuration document file name inside the data directory.
pub const DOCUMENT_FILE: &str = "mcp-config.json";

/// Connector working directories live under this name inside the data directory.
pub const TOOLS_DIR_NAME: &str = "tools";

/// Configuration file contents. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleConfig {
    /// Directory holding the registry and configuration document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Parent directory of connector working directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools_dir: Option<PathBuf>,

    /// Override the configuration document path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_path: Option<PathBuf>,

    /// GitHub API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_api_url: Option<String>,

    /// GitHub API token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    /// Seconds allowed for connect and probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_timeout_sec: Option<u64>,

    /// Start active connectors on startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autostart: Option<bool>,

    /// Write the registry and document to disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist: Option<bool>,
}

/// Fully resolved configuration with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub tools_dir: PathBuf,
    pub registry_path: PathBuf,
    pub document_path: PathBuf,
    pub github_api_url: String,
    #[serde(skip)]
    pub github_token: Option<String>,
    pub probe_timeout_sec: u64,
    pub autostart: bool,
    pub persist: bool,
}

impl ResolvedConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            tools_dir: data_dir.join(TOOLS_DIR_NAME),
            registry_path: data_dir.join(REGISTRY_FILE),
            document_path: data_dir.join(DOCUMENT_FILE),
            data_dir,
            github_api_url: DEFAULT_API_URL.to_string(),
            github_token: None,
            probe_timeout_sec: DEFAULT_PROBE_TIMEOUT_SECS,
            autostart: false,
            persist: true,
        }
    }

    /// Whether a GitHub token is configured.
    pub fn has_github_token(&self) -> bool {
        self.github_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Platform data directory for the application, e.g. `~/.local/share/mcp-console`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}
