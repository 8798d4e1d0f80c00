// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use tempfile::TempDir;
use tokio::sync::Notify;

use mcp_console::github::{ContentEntry, ContentKind, RepoInfo, RepoSummary, RepositorySource};
use mcp_console::mcp::{
    ClientError, ClientSession, ConnectorRegistry, LaunchSpec, McpError, McpToolInfo, ProbeReport,
    ProcessHandle, ProcessHost, ProtocolClient, ToolManager, ToolManagerOptions, ToolStore,
};

mock! {
    pub Source {}

    #[async_trait]
    impl RepositorySource for Source {
        async fn repo_info(&self, owner: &str, repo: &str) -> Result<RepoInfo, McpError>;
        async fn contents(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<ContentEntry>, McpError>;
        async fn search_repositories(&self, query: &str) -> Result<Vec<RepoSummary>, McpError>;
    }
}

pub fn file_entry(name: &str) -> ContentEntry {
    ContentEntry {
        name: name.to_string(),
        path: name.to_string(),
        kind: ContentKind::File,
        html_url: None,
    }
}

pub fn dir_entry(path: &str) -> ContentEntry {
    let name = path.rsplit('/').next().unwrap_or(path);
    ContentEntry {
        name: name.to_string(),
        path: path.to_string(),
        kind: ContentKind::Dir,
        html_url: None,
    }
}

/// A source that knows every repository: name is the repo, description is fixed.
pub fn any_repo_source() -> MockSource {
    let mut source = MockSource::new();
    source.expect_repo_info().returning(|_, repo| {
        Ok(RepoInfo {
            name: repo.to_string(),
            description: Some(format!("{} connector", repo)),
            html_url: None,
        })
    });
    source
        .expect_contents()
        .returning(|_, _, _| Ok(vec![file_entry("package.json"), file_entry("README.md")]));
    source
}

#[derive(Debug)]
pub struct FakeHandle {
    pid: u32,
    kills: Arc<AtomicUsize>,
}

#[async_trait]
impl ProcessHandle for FakeHandle {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Pauses spawns until the test releases them.
#[derive(Default)]
pub struct SpawnGate {
    pub entered: Notify,
    pub release: Notify,
}

/// Process host that never starts a real process.
#[derive(Default)]
pub struct FakeProcessHost {
    pub fail_spawn: AtomicBool,
    pub spawned: AtomicUsize,
    pub kills: Arc<AtomicUsize>,
    next_pid: AtomicU32,
    gate: std::sync::Mutex<Option<Arc<SpawnGate>>>,
}

impl FakeProcessHost {
    /// Make the next spawns wait on the returned gate.
    pub fn hold_spawns(&self) -> Arc<SpawnGate> {
        let gate = Arc::new(SpawnGate::default());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessHost for FakeProcessHost {
    async fn spawn(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessHandle>> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: command not found", spec.command),
            ));
        }
        self.spawned.fetch_add(1, Ordering::SeqCst);
        let pid = 1000 + self.next_pid.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeHandle {
            pid,
            kills: self.kills.clone(),
        }))
    }
}

/// Protocol client whose probes succeed until `fail_probe` is set.
#[derive(Default)]
pub struct FakeProtocolClient {
    pub fail_connect: AtomicBool,
    pub fail_probe: Arc<AtomicBool>,
    pub fail_list: Arc<AtomicBool>,
    pub connects: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub last_spec: std::sync::Mutex<Option<LaunchSpec>>,
}

impl FakeProtocolClient {
    pub fn set_probe_failing(&self, failing: bool) {
        self.fail_probe.store(failing, Ordering::SeqCst);
    }

    pub fn set_list_failing(&self, failing: bool) {
        self.fail_list.store(failing, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn last_spec(&self) -> Option<LaunchSpec> {
        self.last_spec.lock().unwrap().clone()
    }
}

/// Tool prefix for a launch spec: the last path segment of its last argument.
pub fn tool_prefix(spec: &LaunchSpec) -> String {
    let last = spec.args.last().map(String::as_str).unwrap_or(spec.command.as_str());
    last.rsplit(['/', ':']).next().unwrap_or(last).to_string()
}

/// The two tools every fake server advertises.
pub fn fake_tools(prefix: &str) -> Vec<McpToolInfo> {
    vec![
        McpToolInfo::new(
            format!("{}_search", prefix),
            serde_json::json!({
                "type": "object",
                "properties": { "query": { "type": "string", "description": "Search query" } },
                "required": ["query"]
            }),
        )
        .with_description(format!("Search using {}", prefix)),
        McpToolInfo::new(format!("{}_status", prefix), serde_json::json!({ "type": "object" })),
    ]
}

struct FakeSession {
    prefix: String,
    fail_probe: Arc<AtomicBool>,
    fail_list: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl ClientSession for FakeSession {
    async fn probe(&mut self) -> Result<ProbeReport, ClientError> {
        if self.fail_probe.load(Ordering::SeqCst) {
            return Err(ClientError::Protocol("tools/list rejected".to_string()));
        }
        Ok(ProbeReport {
            server_name: Some("fake-server".to_string()),
            server_version: Some("1.0.0".to_string()),
            tool_count: 2,
        })
    }

    async fn list_tools(&mut self) -> Result<Vec<McpToolInfo>, ClientError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ClientError::Timeout(30));
        }
        Ok(fake_tools(&self.prefix))
    }

    async fn close(self: Box<Self>) -> Result<(), ClientError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ProtocolClient for FakeProtocolClient {
    async fn connect(&self, spec: &LaunchSpec) -> Result<Box<dyn ClientSession>, ClientError> {
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ClientError::Connect("connection refused".to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            prefix: tool_prefix(spec),
            fail_probe: self.fail_probe.clone(),
            fail_list: self.fail_list.clone(),
            closes: self.closes.clone(),
        }))
    }
}

/// A manager wired to fakes, with its files under a temp dir.
pub struct Harness {
    pub manager: ToolManager,
    pub host: Arc<FakeProcessHost>,
    pub client: Arc<FakeProtocolClient>,
    pub dir: TempDir,
}

impl Harness {
    /// In-memory registry; the document is still written to the temp dir.
    pub fn new(source: MockSource) -> Self {
        let dir = TempDir::new().unwrap();
        let registry = ConnectorRegistry::in_memory();
        Self::build(dir, registry, source, false)
    }

    /// Registry backed by `tools.json` in a fresh temp dir.
    pub fn persistent(source: MockSource) -> Self {
        let dir = TempDir::new().unwrap();
        let registry = ConnectorRegistry::open(ToolStore::new(dir.path().join("tools.json")));
        Self::build(dir, registry, source, false)
    }

    /// Reopen the same files with a new manager and fresh fakes.
    pub fn reopen(self, source: MockSource, autostart: bool) -> Self {
        let Harness { manager, dir, .. } = self;
        drop(manager);
        let registry = ConnectorRegistry::open(ToolStore::new(dir.path().join("tools.json")));
        Self::build(dir, registry, source, autostart)
    }

    fn build(dir: TempDir, registry: ConnectorRegistry, source: MockSource, autostart: bool) -> Self {
        let host = Arc::new(FakeProcessHost::default());
        let client = Arc::new(FakeProtocolClient::default());
        let manager = ToolManager::new(ToolManagerOptions {
            registry,
            process_host: host.clone(),
            protocol_client: client.clone(),
            source: Arc::new(source),
            tools_dir: dir.path().join("tools"),
            document_path: Some(dir.path().join("mcp-config.json")),
            autostart,
        });
        Self {
            manager,
            host,
            client,
            dir,
        }
    }

    pub fn document_path(&self) -> PathBuf {
        self.dir.path().join("mcp-config.json")
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.dir.path().join("tools")
    }

    /// A record whose status is not active never holds a process.
    pub async fn assert_invariants(&self) {
        for record in self.manager.list().await {
            if !record.status.is_active() {
                assert!(
                    record.process.is_none(),
                    "{} has status {} but a process",
                    record.name,
                    record.status
                );
            }
        }
    }
}
