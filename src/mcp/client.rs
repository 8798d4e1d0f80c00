// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Protocol client used for connector health probes.
//!
//! A [`ProtocolClient`] connects to a connector from its launch spec and
//! hands back a [`ClientSession`]. The session is probed by listing the
//! server's tools, serves full tool listings for the chat host, and is closed
//! when the connector stops.
//!
//! [`RmcpClient`] is the production implementation on top of the rmcp SDK's
//! child-process transport. Tests substitute their own implementations.

use std::time::Duration;

use async_trait::async_trait;
use rmcp::service::{RunningService, ServiceExt};
use rmcp::transport::TokioChildProcess;
use rmcp::RoleClient;
use thiserror::Error;
use tokio::process::Command;

use super::config::LaunchSpec;
use super::types::{McpToolInfo, ProbeReport};

/// Default time allowed for connect and probe.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

/// Errors from the protocol client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport could not be established or the handshake failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The server did not answer in time.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// The server answered with an error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session was already closed.
    #[error("session closed")]
    Closed,
}

/// A connected protocol session.
#[async_trait]
pub trait ClientSession: Send + Sync {
    /// Verify the server responds by listing its tools.
    async fn probe(&mut self) -> Result<ProbeReport, ClientError>;

    /// Every tool the server advertises.
    async fn list_tools(&mut self) -> Result<Vec<McpToolInfo>, ClientError>;

    /// Close the session and its transport.
    async fn close(self: Box<Self>) -> Result<(), ClientError>;
}

/// Opens protocol sessions from a launch spec.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn connect(&self, spec: &LaunchSpec) -> Result<Box<dyn ClientSession>, ClientError>;
}

/// rmcp-backed client over a child-process stdio transport.
#[derive(Debug, Clone)]
pub struct RmcpClient {
    timeout: Duration,
}

impl Default for RmcpClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS))
    }
}

impl RmcpClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn build_command(spec: &LaunchSpec) -> Command {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd
    }
}

#[async_trait]
impl ProtocolClient for RmcpClient {
    async fn connect(&self, spec: &LaunchSpec) -> Result<Box<dyn ClientSession>, ClientError> {
        let transport = TokioChildProcess::new(Self::build_command(spec))
            .map_err(|e| ClientError::Connect(e.to_string()))?;

        let service = tokio::time::timeout(self.timeout, ().serve(transport))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| ClientError::Connect(e.to_string()))?;

        tracing::debug!(command = %spec.command, "protocol session established");

        Ok(Box::new(RmcpSession {
            service: Some(service),
            timeout: self.timeout,
        }))
    }
}

/// A live rmcp client session.
struct RmcpSession {
    service: Option<RunningService<RoleClient, ()>>,
    timeout: Duration,
}

impl RmcpSession {
    async fn fetch_tools(&self) -> Result<Vec<rmcp::model::Tool>, ClientError> {
        let service = self.service.as_ref().ok_or(ClientError::Closed)?;
        tokio::time::timeout(self.timeout, service.list_all_tools())
            .await
            .map_err(|_| ClientError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| ClientError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl ClientSession for RmcpSession {
    async fn probe(&mut self) -> Result<ProbeReport, ClientError> {
        let tools = self.fetch_tools().await?;

        let info = self.service.as_ref().and_then(|service| service.peer_info());
        Ok(ProbeReport {
            server_name: info.map(|i| i.server_info.name.clone()),
            server_version: info.map(|i| i.server_info.version.clone()),
            tool_count: tools.len(),
        })
    }

    async fn list_tools(&mut self) -> Result<Vec<McpToolInfo>, ClientError> {
        let tools = self.fetch_tools().await?;
        Ok(tools
            .into_iter()
            .map(|tool| McpToolInfo {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                input_schema: serde_json::Value::Object(tool.input_schema.as_ref().clone()),
            })
            .collect())
    }

    async fn close(mut self: Box<Self>) -> Result<(), ClientError> {
        let service = self.service.take().ok_or(ClientError::Closed)?;
        service
            .cancel()
            .await
            .map(|reason| tracing::debug!(?reason, "protocol session closed"))
            .map_err(|e| ClientError::Protocol(e.to_string()))
    }
}
