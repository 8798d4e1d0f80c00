// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP connector error types.

use thiserror::Error;

use super::types::ConnectorId;

/// Errors that can occur while managing MCP tool connectors.
#[derive(Debug, Error)]
pub enum McpError {
    /// No connector with this id exists in the registry.
    #[error("MCP tool with ID {0} not found")]
    NotFound(ConnectorId),

    /// The source location could not be interpreted.
    #[error("Invalid source location: {0}")]
    InvalidSource(String),

    /// A caller-supplied id collides with an existing record.
    #[error("MCP tool with ID {0} already exists")]
    DuplicateId(ConnectorId),

    /// The connector process could not be started.
    #[error("Failed to start '{name}' (ID {id}): {message}")]
    SpawnFailed {
        id: ConnectorId,
        name: String,
        message: String,
    },

    /// The process started but the health probe failed.
    #[error("Health check failed for '{name}' (ID {id}): {message}")]
    ProbeFailed {
        id: ConnectorId,
        name: String,
        message: String,
    },

    /// The connector is not active, so it has no tools to offer.
    #[error("MCP tool '{name}' (ID {id}) is not active")]
    NotActive { id: ConnectorId, name: String },

    /// The server did not answer a tool listing.
    #[error("Failed to list tools for '{name}' (ID {id}): {message}")]
    ToolListFailed {
        id: ConnectorId,
        name: String,
        message: String,
    },

    /// Registry or document storage could not be read or written.
    #[error("Storage error: {0}")]
    Persistence(String),

    /// The source repository API returned an error.
    #[error("Source repository error: {0}")]
    Upstream(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Create a spawn failure error.
    pub fn spawn_failed(id: ConnectorId, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SpawnFailed {
            id,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a probe failure error.
    pub fn probe_failed(id: ConnectorId, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProbeFailed {
            id,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a tool listing failure error.
    pub fn tool_list_failed(id: ConnectorId, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolListFailed {
            id,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an upstream error from any displayable cause.
    pub fn upstream(message: impl std::fmt::Display) -> Self {
        Self::Upstream(message.to_string())
    }

    /// Whether this failure left the connector's status set to `error`.
    pub fn marks_error_status(&self) -> bool {
        matches!(self, Self::SpawnFailed { .. } | Self::ProbeFailed { .. })
    }

    /// The connector this error refers to, if any.
    pub fn connector_id(&self) -> Option<ConnectorId> {
        match self {
            Self::NotFound(id) | Self::DuplicateId(id) => Some(*id),
            Self::SpawnFailed { id, .. } | Self::ProbeFailed { id, .. } => Some(*id),
            Self::NotActive { id, .. } | Self::ToolListFailed { id, .. } => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = McpError::NotFound(ConnectorId(42));
        assert_eq!(err.to_string(), "MCP tool with ID 42 not found");

        let err = McpError::InvalidSource("ftp://nowhere".to_string());
        assert!(err.to_string().contains("ftp://nowhere"));

        let err = McpError::probe_failed(ConnectorId(7), "Search", "connection closed");
        assert!(err.to_string().contains("Search"));
        assert!(err.to_string().contains("connection closed"));
    }

    #[test]
    fn test_error_helpers() {
        let err = McpError::spawn_failed(ConnectorId(1), "fs", "No such file or directory");
        assert!(matches!(err, McpError::SpawnFailed { .. }));
        assert!(err.marks_error_status());
        assert_eq!(err.connector_id(), Some(ConnectorId(1)));

        let err = McpError::tool_list_failed(ConnectorId(2), "fs", "timed out after 30s");
        assert!(!err.marks_error_status());
        assert_eq!(err.connector_id(), Some(ConnectorId(2)));

        let err = McpError::upstream("404 Not Found");
        assert!(!err.marks_error_status());
        assert_eq!(err.connector_id(), None);
    }
}
