// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Connector process lifecycle.
//!
//! The [`ProcessController`] spawns a connector's process through a
//! [`ProcessHost`], connects a protocol session through a
//! [`ProtocolClient`], and probes it. Everything it starts is returned as a
//! single owned [`RunningConnector`]; the registry slot holds it until the
//! connector stops.
//!
//! Failures never leave half-started state behind: if the probe fails, the
//! session is closed and the process killed before the error is returned.

use std::fmt;
use std::io;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::{Child, Command};

#[cfg(feature = "telemetry")]
use std::time::Instant;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::client::{ClientSession, ProtocolClient};
use super::config::LaunchSpec;
use super::error::McpError;
use super::types::{ConnectorRecord, McpToolInfo, ProbeReport, ProcessInfo};

/// Handle to a spawned connector process.
#[async_trait]
pub trait ProcessHandle: Send + Sync + fmt::Debug {
    /// OS process id, if known.
    fn id(&self) -> Option<u32>;

    /// Terminate the process.
    async fn kill(&mut self) -> io::Result<()>;
}

/// Spawns connector processes.
#[async_trait]
pub trait ProcessHost: Send + Sync {
    async fn spawn(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Spawns real child processes with tokio.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessHost;

impl TokioProcessHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessHost for TokioProcessHost {
    async fn spawn(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessHandle>> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        // Stdio servers exit on EOF, so keep stdin open for the process lifetime.
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd.kill_on_drop(true);

        let child = cmd.spawn()?;
        tracing::debug!(command = %spec.command, pid = ?child.id(), "spawned connector process");
        Ok(Box::new(ChildHandle { child }))
    }
}

#[derive(Debug)]
struct ChildHandle {
    child: Child,
}

#[async_trait]
impl ProcessHandle for ChildHandle {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn kill(&mut self) -> io::Result<()> {
        match self.child.kill().await {
            Ok(()) => Ok(()),
            // Already exited.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Everything a running connector owns.
pub struct RunningConnector {
    process: Box<dyn ProcessHandle>,
    session: Option<Box<dyn ClientSession>>,
    info: ProcessInfo,
}

impl RunningConnector {
    pub fn new(process: Box<dyn ProcessHandle>, session: Option<Box<dyn ClientSession>>) -> Self {
        let info = ProcessInfo {
            pid: process.id(),
            started_at: Utc::now(),
        };
        Self {
            process,
            session,
            info,
        }
    }

    /// Read-only view stored on the record.
    pub fn info(&self) -> &ProcessInfo {
        &self.info
    }
}

impl fmt::Debug for RunningConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningConnector")
            .field("process", &self.process)
            .field("session", &self.session.is_some())
            .field("info", &self.info)
            .finish()
    }
}

/// Starts, probes and stops connector processes.
#[derive(Clone)]
pub struct ProcessController {
    host: Arc<dyn ProcessHost>,
    client: Arc<dyn ProtocolClient>,
}

impl ProcessController {
    pub fn new(host: Arc<dyn ProcessHost>, client: Arc<dyn ProtocolClient>) -> Self {
        Self { host, client }
    }

    /// Spawn the process, connect a session and probe it.
    ///
    /// On success the process and open session are returned together. On
    /// failure everything that was started has been torn down.
    pub async fn launch(
        &self,
        record: &ConnectorRecord,
        spec: &LaunchSpec,
    ) -> Result<(RunningConnector, ProbeReport), McpError> {
        let mut process = self
            .host
            .spawn(spec)
            .await
            .map_err(|e| McpError::spawn_failed(record.id, &record.name, e.to_string()))?;

        let session = match self.client.connect(spec).await {
            Ok(session) => session,
            Err(e) => {
                kill_quietly(process.as_mut(), &record.name).await;
                return Err(McpError::probe_failed(record.id, &record.name, e.to_string()));
            }
        };

        let mut runtime = RunningConnector::new(process, Some(session));
        match self.probe_running(record, &mut runtime).await {
            Ok(report) => {
                tracing::info!(
                    id = %record.id,
                    name = %record.name,
                    pid = ?runtime.info.pid,
                    server = %report.summary(),
                    "connector started"
                );
                Ok((runtime, report))
            }
            Err(e) => {
                self.shutdown(runtime, &record.name).await;
                Err(e)
            }
        }
    }

    /// Probe a running connector over its open session.
    pub async fn probe_running(
        &self,
        record: &ConnectorRecord,
        runtime: &mut RunningConnector,
    ) -> Result<ProbeReport, McpError> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let result = match runtime.session.as_mut() {
            Some(session) => session
                .probe()
                .await
                .map_err(|e| McpError::probe_failed(record.id, &record.name, e.to_string())),
            None => Err(McpError::probe_failed(record.id, &record.name, "no open session")),
        };

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_probe(&record.name, start.elapsed(), result.is_ok());

        result
    }

    /// Connect, probe and disconnect without touching any running process.
    pub async fn probe_once(
        &self,
        record: &ConnectorRecord,
        spec: &LaunchSpec,
    ) -> Result<ProbeReport, McpError> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let result = async {
            let mut session = self
                .client
                .connect(spec)
                .await
                .map_err(|e| McpError::probe_failed(record.id, &record.name, e.to_string()))?;
            let report = session.probe().await;
            if let Err(e) = session.close().await {
                tracing::warn!(id = %record.id, error = %e, "failed to close probe session");
            }
            report.map_err(|e| McpError::probe_failed(record.id, &record.name, e.to_string()))
        }
        .await;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_probe(&record.name, start.elapsed(), result.is_ok());

        result
    }

    /// List tools over a running connector's open session.
    pub async fn list_running(
        &self,
        record: &ConnectorRecord,
        runtime: &mut RunningConnector,
    ) -> Result<Vec<McpToolInfo>, McpError> {
        match runtime.session.as_mut() {
            Some(session) => session
                .list_tools()
                .await
                .map_err(|e| McpError::tool_list_failed(record.id, &record.name, e.to_string())),
            None => Err(McpError::tool_list_failed(record.id, &record.name, "no open session")),
        }
    }

    /// Connect, list tools and disconnect.
    pub async fn list_once(
        &self,
        record: &ConnectorRecord,
        spec: &LaunchSpec,
    ) -> Result<Vec<McpToolInfo>, McpError> {
        let mut session = self
            .client
            .connect(spec)
            .await
            .map_err(|e| McpError::tool_list_failed(record.id, &record.name, e.to_string()))?;
        let tools = session.list_tools().await;
        if let Err(e) = session.close().await {
            tracing::warn!(id = %record.id, error = %e, "failed to close listing session");
        }
        tools.map_err(|e| McpError::tool_list_failed(record.id, &record.name, e.to_string()))
    }

    /// Close the session, then kill the process. Failures are logged only.
    pub async fn shutdown(&self, mut runtime: RunningConnector, name: &str) {
        if let Some(session) = runtime.session.take() {
            if let Err(e) = session.close().await {
                tracing::warn!(name = %name, error = %e, "failed to close connector session");
            }
        }
        kill_quietly(runtime.process.as_mut(), name).await;
        tracing::info!(name = %name, pid = ?runtime.info.pid, "connector stopped");
    }
}

async fn kill_quietly(process: &mut dyn ProcessHandle, name: &str) {
    if let Err(e) = process.kill().await {
        tracing::warn!(name = %name, pid = ?process.id(), error = %e, "failed to kill connector process");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let host = TokioProcessHost::new();
        let spec = LaunchSpec::new("/nonexistent/mcp-console-test-binary");
        assert!(host.spawn(&spec).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_and_kill() {
        let host = TokioProcessHost::new();
        let spec = LaunchSpec::new("sleep").with_args(["30"]);

        let mut handle = host.spawn(&spec).await.unwrap();
        assert!(handle.id().is_some());
        handle.kill().await.unwrap();
        // Killing twice is harmless.
        handle.kill().await.unwrap();
    }
}
