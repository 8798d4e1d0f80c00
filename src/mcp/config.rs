// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration document emitted for the chat host.
//!
//! Every active connector becomes one entry in an `mcpServers` map, keyed by
//! its client id, describing how to launch its process.
//!
//! # Example Document
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "brave-search": {
//!       "command": "npx",
//!       "args": ["-y", "@modelcontextprotocol/server-brave-search"],
//!       "env": { "BRAVE_API_KEY": "..." }
//!     },
//!     "time": {
//!       "command": "uvx",
//!       "args": ["mcp-server-time"]
//!     }
//!   }
//! }
//! ```
//!
//! The document is a pure function of the records it is rendered from:
//! servers and environment are kept in ordered maps so the same input always
//! produces byte-identical JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::error::McpError;
use super::locator::locate;
use super::types::{ConnectorRecord, SourceKind};

/// How to launch one connector process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Executable to run.
    pub command: String,

    /// Command arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables for the process.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    /// Create a spec with no arguments or environment.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Add command arguments.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Set environment variables.
    pub fn with_env(
        mut self,
        env: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.env = env
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Render as a single shell line: `KEY=VALUE ... command args...`.
    pub fn shell_command(&self) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
            .collect();
        parts.push(shell_quote(&self.command));
        parts.extend(self.args.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@=+,".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Runtime used to launch an official catalog server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launcher {
    /// `npx -y @modelcontextprotocol/server-<name>`
    Node,

    /// `uvx mcp-server-<name>`
    Python,
}

/// Official servers and the runtime they ship for. Anything not listed
/// launches with [`Launcher::Node`].
pub const OFFICIAL_LAUNCHERS: &[(&str, Launcher)] = &[
    ("aws-kb-retrieval-server", Launcher::Node),
    ("brave-search", Launcher::Node),
    ("everything", Launcher::Node),
    ("fetch", Launcher::Python),
    ("filesystem", Launcher::Node),
    ("gdrive", Launcher::Node),
    ("git", Launcher::Python),
    ("github", Launcher::Node),
    ("gitlab", Launcher::Node),
    ("google-maps", Launcher::Node),
    ("memory", Launcher::Node),
    ("postgres", Launcher::Node),
    ("puppeteer", Launcher::Node),
    ("redis", Launcher::Node),
    ("sentry", Launcher::Python),
    ("sequentialthinking", Launcher::Node),
    ("slack", Launcher::Node),
    ("sqlite", Launcher::Python),
    ("time", Launcher::Python),
];

/// Look up the launcher for an official server name.
pub fn launcher_for(server: &str) -> Launcher {
    OFFICIAL_LAUNCHERS
        .iter()
        .find(|(name, _)| *name == server)
        .map(|(_, launcher)| *launcher)
        .unwrap_or(Launcher::Node)
}

/// The `{ "mcpServers": { ... } }` document consumed by the chat host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpConfigDocument {
    /// Map of client id to launch spec.
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, LaunchSpec>,
}

impl McpConfigDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from JSON.
    pub fn from_json(json: &str) -> Result<Self, McpError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a document from a file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, McpError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| McpError::Persistence(format!("Failed to read config document: {}", e)))?;
        Self::from_json(&content)
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, McpError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Write the whole document to `path`, replacing any previous content.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), McpError> {
        write_atomic(path.as_ref(), self.to_json()?.as_bytes())
    }

    /// Get a server entry by client id.
    pub fn get(&self, client_id: &str) -> Option<&LaunchSpec> {
        self.mcp_servers.get(client_id)
    }

    pub fn len(&self) -> usize {
        self.mcp_servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mcp_servers.is_empty()
    }
}

/// Replace `path` with `contents` through a temp file in the same directory.
///
/// Readers see either the old file or the new one, never a partial write.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), McpError> {
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    let dir = parent.unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .map_err(|e| McpError::Persistence(format!("Failed to create directory {}: {}", dir.display(), e)))?;

    let mut temp_file = NamedTempFile::new_in(dir)
        .map_err(|e| McpError::Persistence(format!("Failed to create temp file in {}: {}", dir.display(), e)))?;
    temp_file
        .write_all(contents)
        .and_then(|()| temp_file.as_file_mut().sync_all())
        .map_err(|e| McpError::Persistence(format!("Failed to write {}: {}", path.display(), e)))?;
    temp_file
        .persist(path)
        .map_err(|e| McpError::Persistence(format!("Failed to replace {}: {}", path.display(), e.error)))?;
    Ok(())
}

/// Derives launch specs from records and renders the document.
#[derive(Debug, Clone)]
pub struct ConfigEmitter {
    /// Where local connectors' working directories live.
    tools_dir: PathBuf,
}

impl ConfigEmitter {
    pub fn new(tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: tools_dir.into(),
        }
    }

    /// Working directory for a connector.
    pub fn working_dir(&self, record: &ConnectorRecord) -> PathBuf {
        self.tools_dir.join(record.id.to_string())
    }

    /// Launch spec for a record, or `None` when its source cannot be launched.
    pub fn launch_spec(&self, record: &ConnectorRecord) -> Option<LaunchSpec> {
        let spec = match record.source {
            SourceKind::Repository => {
                let location = locate(&record.source_url)?;
                match location.official_server() {
                    Some(server) => match launcher_for(server) {
                        Launcher::Node => LaunchSpec::new("npx").with_args([
                            "-y".to_string(),
                            format!("@modelcontextprotocol/server-{}", server),
                        ]),
                        Launcher::Python => {
                            LaunchSpec::new("uvx").with_args([format!("mcp-server-{}", server)])
                        }
                    },
                    None => LaunchSpec::new("npx").with_args([
                        "-y".to_string(),
                        format!("github:{}", location.slug()),
                    ]),
                }
            }
            SourceKind::LocalPath => {
                let entry = self.working_dir(record).join("index.js");
                LaunchSpec::new("node").with_args([entry.to_string_lossy().into_owned()])
            }
        };

        Some(spec.with_env(record.config.clone()))
    }

    /// Render the document for all active, addressable records.
    pub fn render(&self, records: &[ConnectorRecord]) -> McpConfigDocument {
        let mut document = McpConfigDocument::new();

        for record in records.iter().filter(|r| r.status.is_active()) {
            let Some(client_id) = record.client_id.as_deref() else {
                continue;
            };
            match self.launch_spec(record) {
                Some(spec) => {
                    document.mcp_servers.insert(client_id.to_string(), spec);
                }
                None => {
                    tracing::debug!(id = %record.id, source = %record.source_url, "skipping connector without launch command");
                }
            }
        }

        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::{ConnectorId, ConnectorStatus};

    fn repo_record(id: u64, url: &str, client_id: &str) -> ConnectorRecord {
        let mut record = ConnectorRecord::new(client_id, SourceKind::Repository, url)
            .with_status(ConnectorStatus::Active)
            .with_client_id(client_id);
        record.id = ConnectorId(id);
        record
    }

    #[test]
    fn test_official_launchers() {
        let emitter = ConfigEmitter::new("/var/tools");

        let node = repo_record(1, "https://github.com/modelcontextprotocol/servers/tree/main/src/brave-search", "brave");
        let spec = emitter.launch_spec(&node).unwrap();
        assert_eq!(spec.command, "npx");
        assert_eq!(spec.args, vec!["-y", "@modelcontextprotocol/server-brave-search"]);

        let python = repo_record(2, "https://github.com/modelcontextprotocol/servers/tree/main/src/time", "time");
        let spec = emitter.launch_spec(&python).unwrap();
        assert_eq!(spec.command, "uvx");
        assert_eq!(spec.args, vec!["mcp-server-time"]);

        let unknown = repo_record(3, "https://github.com/modelcontextprotocol/servers/tree/main/src/brand-new", "new");
        assert_eq!(emitter.launch_spec(&unknown).unwrap().command, "npx");
    }

    #[test]
    fn test_generic_repository_launcher() {
        let emitter = ConfigEmitter::new("/var/tools");
        let record = repo_record(1, "https://github.com/acme/search-tool", "search-tool")
            .with_config([("API_KEY", "k")]);

        let spec = emitter.launch_spec(&record).unwrap();
        assert_eq!(spec.command, "npx");
        assert_eq!(spec.args, vec!["-y", "github:acme/search-tool"]);
        assert_eq!(spec.env.get("API_KEY").map(String::as_str), Some("k"));
    }

    #[test]
    fn test_local_launcher_uses_working_dir() {
        let emitter = ConfigEmitter::new("/var/tools");
        let mut record = ConnectorRecord::new("Local", SourceKind::LocalPath, "/home/me/tool")
            .with_status(ConnectorStatus::Active)
            .with_client_id("local");
        record.id = ConnectorId(99);

        let spec = emitter.launch_spec(&record).unwrap();
        assert_eq!(spec.command, "node");
        assert!(spec.args[0].ends_with("99/index.js"), "{}", spec.args[0]);
    }

    #[test]
    fn test_render_filters_inactive_and_unaddressable() {
        let emitter = ConfigEmitter::new("/var/tools");
        let active = repo_record(1, "https://github.com/acme/a", "a");
        let inactive = repo_record(2, "https://github.com/acme/b", "b").with_status(ConnectorStatus::Inactive);
        let errored = repo_record(3, "https://github.com/acme/c", "c").with_status(ConnectorStatus::Error);
        let mut no_client = repo_record(4, "https://github.com/acme/d", "d");
        no_client.client_id = None;
        let bad_url = repo_record(5, "not a repository", "e");

        let doc = emitter.render(&[active, inactive, errored, no_client, bad_url]);
        assert_eq!(doc.len(), 1);
        assert!(doc.get("a").is_some());
    }

    #[test]
    fn test_render_is_deterministic() {
        let emitter = ConfigEmitter::new("/var/tools");
        let records = vec![
            repo_record(2, "https://github.com/acme/zeta", "zeta").with_config([("Z", "1"), ("A", "2")]),
            repo_record(1, "https://github.com/acme/alpha", "alpha"),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let first = emitter.render(&records).to_json().unwrap();
        let second = emitter.render(&records).to_json().unwrap();
        let third = emitter.render(&reversed).to_json().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert!(first.find("\"alpha\"").unwrap() < first.find("\"zeta\"").unwrap());
    }

    #[test]
    fn test_document_file_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nested").join("mcp-config.json");

        let mut doc = McpConfigDocument::new();
        doc.mcp_servers.insert(
            "time".to_string(),
            LaunchSpec::new("uvx").with_args(["mcp-server-time"]),
        );
        doc.write_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"mcpServers\""));
        assert!(!content.contains("\"env\""));
        assert_eq!(McpConfigDocument::load_from_file(&path).unwrap(), doc);
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp_files() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("mcp-config.json");
        std::fs::write(&path, "{ \"mcpServers\": { \"old\": { \"command\": \"x\" } } }").unwrap();

        McpConfigDocument::new().write_to_file(&path).unwrap();

        assert!(McpConfigDocument::load_from_file(&path).unwrap().is_empty());
        let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_write_atomic_reports_unwritable_target() {
        let temp = tempfile::TempDir::new().unwrap();
        // The target is a non-empty directory, so the final rename fails.
        let path = temp.path().join("mcp-config.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let err = write_atomic(&path, b"{}").unwrap_err();
        assert!(matches!(err, McpError::Persistence(_)));
        assert!(path.join("occupied").is_dir());
    }

    #[test]
    fn test_shell_command() {
        let spec = LaunchSpec::new("npx")
            .with_args(["-y", "@modelcontextprotocol/server-slack"])
            .with_env([("SLACK_TEAM_ID", "T01"), ("SLACK_BOT_TOKEN", "xoxb 1")]);

        assert_eq!(
            spec.shell_command(),
            "SLACK_BOT_TOKEN='xoxb 1' SLACK_TEAM_ID=T01 npx -y @modelcontextprotocol/server-slack"
        );
    }

    #[test]
    fn test_launcher_default() {
        assert_eq!(launcher_for("sqlite"), Launcher::Python);
        assert_eq!(launcher_for("filesystem"), Launcher::Node);
        assert_eq!(launcher_for("never-heard-of-it"), Launcher::Node);
    }
}
