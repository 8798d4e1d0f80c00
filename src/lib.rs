// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! mcp-console - lifecycle management for MCP tool connectors.
//!
//! Installs tool connectors from GitHub or local paths, runs and health-checks
//! their processes, assigns them to spaces, and writes the `mcpServers`
//! configuration document a chat host launches them from.
//!
//! # Architecture
//!
//! - [`mcp`] - Connector records, registry, process control and the [`mcp::ToolManager`]
//! - [`github`] - Repository metadata and search
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Tracing and metrics
//! - [`error`] - Configuration errors and result alias
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_console::config::{load_config, CliOptions};
//! use mcp_console::mcp::{InstallOptions, ToolManager};
//!
//! let config = load_config(None, CliOptions::default())?;
//! let manager = ToolManager::from_config(&config)?;
//! manager.init().await;
//!
//! let record = manager
//!     .install("https://github.com/acme/search-tool", InstallOptions::new())
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod github;
pub mod mcp;
pub mod telemetry;

pub use error::{ConfigError, Result};
pub use mcp::{
    ConnectorId, ConnectorRecord, ConnectorStatus, HealthReport, InstallOptions, McpError,
    ToolManager,
};

/// mcp-console version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
