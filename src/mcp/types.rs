// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Connector records and the small value types that travel with them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Stable identifier of an installed connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorId(pub u64);

impl ConnectorId {
    /// Placeholder id; the registry assigns a real one on `add`.
    pub const UNASSIGNED: ConnectorId = ConnectorId(0);

    /// Whether the registry still needs to assign an id.
    pub fn is_unassigned(&self) -> bool {
        *self == Self::UNASSIGNED
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConnectorId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ConnectorId)
    }
}

/// Where a connector's code comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// A hosted source repository (GitHub).
    #[serde(alias = "github")]
    Repository,

    /// A directory on the local filesystem.
    LocalPath,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repository => write!(f, "repository"),
            Self::LocalPath => write!(f, "local-path"),
        }
    }
}

/// Lifecycle status persisted with each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStatus {
    Active,
    Inactive,
    Error,
}

impl ConnectorStatus {
    pub fn is_active(&self) -> bool {
        *self == Self::Active
    }
}

impl fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for ConnectorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// Runtime state of a connector's process, as tracked by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    #[default]
    Stopped,
    Starting,
    Running,
    Error,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of a live process attached to a record.
///
/// The owned OS handle stays inside the registry slot; records only carry
/// this read-only view so they can be cloned freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// OS process id from the process host, when it reports one.
    ///
    /// This is the process the host spawned and later kills. The protocol
    /// client launches its own transport child from the same launch spec for
    /// health checks and tool listing, so this pid is not the process that
    /// answers protocol requests.
    pub pid: Option<u32>,

    /// When the process was spawned.
    pub started_at: DateTime<Utc>,
}

/// One installed tool connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorRecord {
    /// Unique identifier.
    pub id: ConnectorId,

    /// Display name.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Source kind.
    pub source: SourceKind,

    /// Repository URL or filesystem path.
    pub source_url: String,

    /// Lifecycle status.
    pub status: ConnectorStatus,

    /// Assigned space names.
    #[serde(default)]
    pub spaces: Vec<String>,

    /// Free-form configuration, passed to the process as environment.
    #[serde(default)]
    pub config: BTreeMap<String, String>,

    /// Key of this connector in the configuration document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Live process, if running.
    #[serde(skip)]
    pub process: Option<ProcessInfo>,
}

impl ConnectorRecord {
    /// Create an unassigned record with default fields.
    pub fn new(name: impl Into<String>, source: SourceKind, source_url: impl Into<String>) -> Self {
        Self {
            id: ConnectorId::UNASSIGNED,
            name: name.into(),
            description: String::new(),
            source,
            source_url: source_url.into(),
            status: ConnectorStatus::Inactive,
            spaces: Vec::new(),
            config: BTreeMap::new(),
            client_id: None,
            process: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: ConnectorStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the assigned spaces.
    pub fn with_spaces(mut self, spaces: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.spaces = normalize_spaces(spaces);
        self
    }

    /// Set the configuration map.
    pub fn with_config(
        mut self,
        config: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.config = config
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Set the client id.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Whether a live process is attached.
    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    /// Whether this record is assigned to a space.
    pub fn in_space(&self, space: &str) -> bool {
        self.spaces.iter().any(|s| s == space)
    }

    /// Config map with secret-looking values masked, for display.
    pub fn masked_config(&self) -> BTreeMap<String, String> {
        self.config
            .iter()
            .map(|(k, v)| {
                let value = if looks_secret(k) {
                    "*".repeat(v.len().clamp(4, 16))
                } else {
                    v.clone()
                };
                (k.clone(), value)
            })
            .collect()
    }
}

fn looks_secret(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    ["KEY", "TOKEN", "SECRET", "PASSWORD"]
        .iter()
        .any(|marker| key.contains(marker))
}

/// Sort and de-duplicate space names; space assignment is a set.
pub fn normalize_spaces(spaces: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    let mut spaces: Vec<String> = spaces
        .into_iter()
        .map(Into::into)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    spaces.sort();
    spaces.dedup();
    spaces
}

/// Caller overrides for `install`.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Display name; defaults to the source's own name.
    pub name: Option<String>,

    /// Spaces to assign.
    pub spaces: Vec<String>,

    /// Initial configuration.
    pub config: BTreeMap<String, String>,
}

impl InstallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the spaces.
    pub fn with_spaces(mut self, spaces: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.spaces = spaces.into_iter().map(Into::into).collect();
        self
    }

    /// Set configuration values.
    pub fn with_config(
        mut self,
        config: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.config = config
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }
}

/// What a successful probe learned about the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Server name from the initialize handshake.
    pub server_name: Option<String>,

    /// Server version from the initialize handshake.
    pub server_version: Option<String>,

    /// Number of tools the server advertised.
    pub tool_count: usize,
}

impl ProbeReport {
    /// One-line summary for health output.
    pub fn summary(&self) -> String {
        match (&self.server_name, &self.server_version) {
            (Some(name), Some(version)) => {
                format!("{} {} ({} tools)", name, version, self.tool_count)
            }
            (Some(name), None) => format!("{} ({} tools)", name, self.tool_count),
            _ => format!("{} tools", self.tool_count),
        }
    }
}

/// A tool advertised by a connector's server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolInfo {
    /// Tool name.
    pub name: String,

    /// Tool description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for tool input.
    pub input_schema: serde_json::Value,
}

impl McpToolInfo {
    pub fn new(name: impl Into<String>, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Tools listed from one active connector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectorTools {
    pub id: ConnectorId,
    pub name: String,
    pub tools: Vec<McpToolInfo>,
}

impl ConnectorTools {
    /// The tools in the chat API's tool format.
    pub fn to_chat_tools(&self) -> Vec<ChatTool> {
        self.tools
            .iter()
            .map(|tool| ChatTool {
                name: tool.name.clone(),
                description: tool
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("MCP tool from {}", self.name)),
                input_schema: tool.input_schema.clone(),
            })
            .collect()
    }
}

/// One tool as the chat API expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Flatten per-connector listings into one chat tool list.
pub fn to_chat_tools(listings: &[ConnectorTools]) -> Vec<ChatTool> {
    listings.iter().flat_map(ConnectorTools::to_chat_tools).collect()
}

/// Health-check result for one connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub id: ConnectorId,
    pub name: String,

    /// `None` when the check does not apply (connector not active).
    pub healthy: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthReport {
    /// Report for a connector that was not evaluated.
    pub fn not_applicable(record: &ConnectorRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            healthy: None,
            detail: Some(format!("status is {}", record.status)),
        }
    }
}

/// Slugify a name into a configuration-document key.
pub fn derive_client_id(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "connector".to_string()
    } else {
        slug
    }
}

/// Derive a client id that does not collide with any in `taken`.
pub fn unique_client_id<'a>(name: &str, taken: impl IntoIterator<Item = &'a str>) -> String {
    let base = derive_client_id(name);
    let taken: Vec<&str> = taken.into_iter().collect();

    if !taken.contains(&base.as_str()) {
        return base;
    }

    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or(base)
}
