// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool lifecycle orchestration.
//!
//! [`ToolManager`] is the single entry point for changing connectors. It
//! composes the registry, the process controller, the configuration emitter
//! and the repository source, and keeps three things in step on every
//! operation: the record list, the live processes, and the configuration
//! document on disk.
//!
//! Operations on the same connector id are serialized through a per-id lock
//! held for the whole operation. A new connector's lock is taken in the same
//! registry critical section that adds its record, so no other operation can
//! observe a half-finished install. The registry lock is only held for short
//! critical sections and never across a spawn, connect or close. File writes
//! run on the blocking pool while the registry lock is held, so they land in
//! mutation order.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_console::config::load_config;
//! use mcp_console::mcp::{InstallOptions, ToolManager};
//!
//! let config = load_config(None, Default::default())?;
//! let manager = ToolManager::from_config(&config)?;
//! manager.init().await;
//!
//! let record = manager
//!     .install("https://github.com/acme/search-tool", InstallOptions::new().with_spaces(["Eng"]))
//!     .await?;
//! println!("installed {} as {}", record.name, record.id);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

#[cfg(feature = "telemetry")]
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard};
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::config::ResolvedConfig;
use crate::github::{ContentEntry, GitHubClient, RepositorySource};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::catalog::display_name;
use super::client::{ProtocolClient, RmcpClient};
use super::config::{ConfigEmitter, McpConfigDocument};
use super::error::McpError;
use super::locator::{locate, validate_repository, RepoLocation};
use super::process::{ProcessController, ProcessHost, TokioProcessHost};
use super::registry::{ConnectorRegistry, ToolStore};
use super::types::{
    to_chat_tools, unique_client_id, ChatTool, ConnectorId, ConnectorRecord, ConnectorStatus,
    ConnectorTools, HealthReport, InstallOptions, ProcessState, SourceKind,
};

/// Collaborators and settings for a [`ToolManager`].
pub struct ToolManagerOptions {
    pub registry: ConnectorRegistry,
    pub process_host: Arc<dyn ProcessHost>,
    pub protocol_client: Arc<dyn ProtocolClient>,
    pub source: Arc<dyn RepositorySource>,

    /// Parent of each connector's working directory.
    pub tools_dir: PathBuf,

    /// Where the configuration document is written; `None` keeps it in memory.
    pub document_path: Option<PathBuf>,

    /// Start every active connector from `init()`.
    pub autostart: bool,
}

/// Per-connector operation locks, one entry per registered id.
#[derive(Default)]
struct LockTable {
    locks: std::sync::Mutex<HashMap<ConnectorId, Arc<Mutex<()>>>>,
}

impl LockTable {
    fn with_ids(ids: impl IntoIterator<Item = ConnectorId>) -> Self {
        let locks = ids.into_iter().map(|id| (id, Arc::default())).collect();
        Self {
            locks: std::sync::Mutex::new(locks),
        }
    }

    /// Register a new id and lock it in the same step.
    ///
    /// A fresh mutex is always free; `Err` hands it back to be awaited.
    fn claim(&self, id: ConnectorId) -> Result<OwnedMutexGuard<()>, Arc<Mutex<()>>> {
        let lock: Arc<Mutex<()>> = Arc::default();
        self.entries().insert(id, lock.clone());
        lock.clone().try_lock_owned().map_err(|_| lock)
    }

    /// Wait for an id's lock. Unknown ids are `NotFound` and leave no entry.
    async fn acquire(&self, id: ConnectorId) -> Result<OwnedMutexGuard<()>, McpError> {
        let lock = self.entries().get(&id).cloned().ok_or(McpError::NotFound(id))?;
        Ok(lock.lock_owned().await)
    }

    fn forget(&self, id: ConnectorId) {
        self.entries().remove(&id);
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectorId, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries().len()
    }
}

/// Orchestrates install, configuration, start/stop and health of connectors.
pub struct ToolManager {
    registry: Mutex<ConnectorRegistry>,
    controller: ProcessController,
    source: Arc<dyn RepositorySource>,
    emitter: ConfigEmitter,
    document_path: Option<PathBuf>,
    autostart: bool,
    locks: LockTable,
}

impl ToolManager {
    pub fn new(options: ToolManagerOptions) -> Self {
        let locks = LockTable::with_ids(options.registry.list().iter().map(|r| r.id));
        Self {
            registry: Mutex::new(options.registry),
            controller: ProcessController::new(options.process_host, options.protocol_client),
            source: options.source,
            emitter: ConfigEmitter::new(options.tools_dir),
            document_path: options.document_path,
            autostart: options.autostart,
            locks,
        }
    }

    /// Build a manager with the production collaborators.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, McpError> {
        let registry = if config.persist {
            ConnectorRegistry::open(ToolStore::new(&config.registry_path))
        } else {
            ConnectorRegistry::in_memory()
        };
        let source = GitHubClient::new(&config.github_api_url, config.github_token.clone())?;

        Ok(Self::new(ToolManagerOptions {
            registry,
            process_host: Arc::new(TokioProcessHost::new()),
            protocol_client: Arc::new(RmcpClient::new(Duration::from_secs(config.probe_timeout_sec))),
            source: Arc::new(source),
            tools_dir: config.tools_dir.clone(),
            document_path: config.persist.then(|| config.document_path.clone()),
            autostart: config.autostart,
        }))
    }

    /// The repository source used for metadata and catalog browsing.
    pub fn source(&self) -> &dyn RepositorySource {
        self.source.as_ref()
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document_path.as_deref()
    }

    /// Startup hook: optionally start active connectors, then write the document.
    ///
    /// Start failures mark the connector `error` and are returned, not raised.
    pub async fn init(&self) -> Vec<Result<ConnectorRecord, McpError>> {
        let mut outcomes = Vec::new();

        if self.autostart {
            let active: Vec<ConnectorId> = self
                .list()
                .await
                .into_iter()
                .filter(|r| r.status.is_active())
                .map(|r| r.id)
                .collect();

            for id in active {
                let Ok(_guard) = self.locks.acquire(id).await else {
                    continue;
                };
                let outcome = self.start(id).await;
                if let Err(e) = &outcome {
                    tracing::warn!(id = %id, error = %e, "autostart failed");
                }
                outcomes.push(outcome);
            }
        }

        let mut registry = self.registry.lock().await;
        self.commit(&mut registry).await;
        tracing::info!(
            connectors = registry.len(),
            started = outcomes.iter().filter(|o| o.is_ok()).count(),
            "tool manager ready"
        );
        outcomes
    }

    /// Stop every running connector without changing its persisted status.
    pub async fn shutdown(&self) {
        let runtimes = self.registry.lock().await.take_all_runtimes();
        for (name, runtime) in runtimes {
            self.controller.shutdown(runtime, &name).await;
        }
    }

    /// Install a connector from a repository URL or local path and start it.
    ///
    /// If the process fails to start or answer the probe, the record stays in
    /// the registry with status `error` and the error carries its id.
    #[cfg_attr(feature = "telemetry", instrument(skip(self, source, options), fields(source = %source, id)))]
    pub async fn install(
        &self,
        source: &str,
        options: InstallOptions,
    ) -> Result<ConnectorRecord, McpError> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let source = source.trim();
        let draft = self.draft_record(source, &options).await?;

        let (record, claimed) = {
            let mut registry = self.registry.lock().await;
            let taken = registry.client_ids(None);
            let client_id = unique_client_id(&draft.client_base, taken.iter().map(String::as_str));
            let record = registry.add(draft.record.with_client_id(client_id))?;
            let claimed = self.locks.claim(record.id);
            self.commit(&mut registry).await;
            (record, claimed)
        };
        let _guard = match claimed {
            Ok(guard) => guard,
            Err(lock) => lock.lock_owned().await,
        };

        #[cfg(feature = "telemetry")]
        tracing::Span::current().record("id", record.id.0);

        if record.source == SourceKind::LocalPath {
            let dir = self.emitter.working_dir(&record);
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                tracing::warn!(path = %dir.display(), error = %e, "failed to create working directory");
            }
        }

        tracing::info!(id = %record.id, name = %record.name, client_id = ?record.client_id, "installed connector");

        let result = self.start(record.id).await;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("mcp.install", start.elapsed());

        result
    }

    /// Stop and remove a connector; returns the removed record.
    #[cfg_attr(feature = "telemetry", instrument(skip(self, id), fields(id = %id)))]
    pub async fn uninstall(&self, id: ConnectorId) -> Result<ConnectorRecord, McpError> {
        let _guard = self.locks.acquire(id).await?;
        self.stop_runtime(id).await?;

        let mut removed = {
            let mut registry = self.registry.lock().await;
            let removed = registry.remove(id)?;
            self.commit(&mut registry).await;
            removed
        };
        removed.status = ConnectorStatus::Inactive;

        let dir = self.emitter.working_dir(&removed);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::debug!(path = %dir.display(), "removed working directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %dir.display(), error = %e, "failed to remove working directory"),
        }

        self.locks.forget(id);
        tracing::info!(id = %id, name = %removed.name, "uninstalled connector");
        Ok(removed)
    }

    /// Move a connector to `target`, starting or stopping it as needed.
    #[cfg_attr(feature = "telemetry", instrument(skip(self, id, target), fields(id = %id, target = %target)))]
    pub async fn update_status(
        &self,
        id: ConnectorId,
        target: ConnectorStatus,
    ) -> Result<ConnectorRecord, McpError> {
        let _guard = self.locks.acquire(id).await?;
        let current = self.registry.lock().await.get(id)?;

        if current.status == target {
            let mut registry = self.registry.lock().await;
            let updated = registry.update(id, |_| {})?;
            self.commit(&mut registry).await;
            return Ok(updated);
        }

        if target.is_active() {
            return self.start(id).await;
        }

        if current.status.is_active() {
            self.stop_runtime(id).await?;
        }

        let mut registry = self.registry.lock().await;
        let updated = registry.update(id, |r| r.status = target)?;
        self.commit(&mut registry).await;
        Ok(updated)
    }

    /// Merge `partial` into the connector's config, restarting it if active.
    #[cfg_attr(feature = "telemetry", instrument(skip(self, id, partial), fields(id = %id, keys = partial.len())))]
    pub async fn update_config(
        &self,
        id: ConnectorId,
        partial: BTreeMap<String, String>,
    ) -> Result<ConnectorRecord, McpError> {
        let _guard = self.locks.acquire(id).await?;

        let running = {
            let registry = self.registry.lock().await;
            let current = registry.get(id)?;
            current.status.is_active() || registry.has_runtime(id)
        };

        if running {
            self.stop_runtime(id).await?;
        }

        let updated = {
            let mut registry = self.registry.lock().await;
            let updated = registry.update(id, |r| r.config.extend(partial))?;
            self.commit(&mut registry).await;
            updated
        };

        if running {
            self.start(id).await
        } else {
            Ok(updated)
        }
    }

    /// Replace the connector's space assignments.
    #[cfg_attr(feature = "telemetry", instrument(skip(self, id, spaces), fields(id = %id)))]
    pub async fn update_spaces(
        &self,
        id: ConnectorId,
        spaces: Vec<String>,
    ) -> Result<ConnectorRecord, McpError> {
        let _guard = self.locks.acquire(id).await?;
        let mut registry = self.registry.lock().await;
        let updated = registry.update(id, |r| r.spaces = spaces)?;
        self.commit(&mut registry).await;
        Ok(updated)
    }

    /// Probe every active connector; one report per record.
    ///
    /// A connector that fails its probe is stopped and marked `error`.
    #[cfg_attr(feature = "telemetry", instrument(skip(self)))]
    pub async fn health_check_all(&self) -> Vec<HealthReport> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let records = self.list().await;
        let mut reports = Vec::with_capacity(records.len());

        for record in records {
            if !record.status.is_active() {
                reports.push(HealthReport::not_applicable(&record));
                continue;
            }

            let Ok(_guard) = self.locks.acquire(record.id).await else {
                continue;
            };
            if let Some(report) = self.check_health(record.id).await {
                reports.push(report);
            }
        }

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("mcp.health_check_all", start.elapsed());

        reports
    }

    /// Snapshot of all records.
    pub async fn list(&self) -> Vec<ConnectorRecord> {
        self.registry.lock().await.list()
    }

    pub async fn find(&self, id: ConnectorId) -> Option<ConnectorRecord> {
        self.registry.lock().await.find(id)
    }

    pub async fn get(&self, id: ConnectorId) -> Result<ConnectorRecord, McpError> {
        self.registry.lock().await.get(id)
    }

    /// Active connectors assigned to `space`.
    pub async fn tools_for_space(&self, space: &str) -> Vec<ConnectorRecord> {
        self.list()
            .await
            .into_iter()
            .filter(|r| r.status.is_active() && r.in_space(space))
            .collect()
    }

    /// Tools advertised by one active connector.
    ///
    /// Uses the open session when the connector holds one, otherwise a
    /// short-lived session. A failed listing does not change the status.
    #[cfg_attr(feature = "telemetry", instrument(skip(self, id), fields(id = %id)))]
    pub async fn list_tools(&self, id: ConnectorId) -> Result<ConnectorTools, McpError> {
        let _guard = self.locks.acquire(id).await?;
        self.fetch_tools(id).await
    }

    /// Tool listings of every active connector in `space`.
    ///
    /// Connectors whose listing fails are logged and left out.
    #[cfg_attr(feature = "telemetry", instrument(skip(self)))]
    pub async fn tool_listings_for_space(&self, space: &str) -> Vec<ConnectorTools> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let mut listings = Vec::new();
        for record in self.tools_for_space(space).await {
            let Ok(_guard) = self.locks.acquire(record.id).await else {
                continue;
            };
            match self.fetch_tools(record.id).await {
                Ok(listing) => listings.push(listing),
                Err(e) => tracing::warn!(id = %record.id, error = %e, "skipping connector tools"),
            }
        }

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("mcp.tool_listings", start.elapsed());

        listings
    }

    /// Tools of a space's active connectors in the chat API's tool format.
    pub async fn chat_tools_for_space(&self, space: &str) -> Vec<ChatTool> {
        to_chat_tools(&self.tool_listings_for_space(space).await)
    }

    /// Controller state of a connector.
    pub async fn process_state(&self, id: ConnectorId) -> Result<ProcessState, McpError> {
        self.registry.lock().await.state(id)
    }

    /// Render the configuration document for the current records.
    pub async fn render_document(&self) -> McpConfigDocument {
        self.emitter.render(&self.list().await)
    }

    /// Start a connector. The caller holds its operation lock.
    async fn start(&self, id: ConnectorId) -> Result<ConnectorRecord, McpError> {
        let (record, spec) = {
            let mut registry = self.registry.lock().await;
            let record = registry.get(id)?;
            if registry.has_runtime(id) {
                return Ok(record);
            }
            registry.set_state(id, ProcessState::Starting)?;
            let spec = self.emitter.launch_spec(&record);
            (record, spec)
        };

        let Some(spec) = spec else {
            let err = McpError::spawn_failed(id, &record.name, "no launch command for this source");
            return self.fail_start(id, err).await;
        };

        let runtime = match self.controller.launch(&record, &spec).await {
            Ok((runtime, _report)) => runtime,
            Err(e) => return self.fail_start(id, e).await,
        };

        let mut registry = self.registry.lock().await;
        if let Err((e, runtime)) = registry.attach_runtime(id, runtime) {
            drop(registry);
            self.controller.shutdown(runtime, &record.name).await;
            return Err(e);
        }
        let updated = registry.update(id, |r| r.status = ConnectorStatus::Active)?;
        self.commit(&mut registry).await;
        Ok(updated)
    }

    async fn fail_start(&self, id: ConnectorId, err: McpError) -> Result<ConnectorRecord, McpError> {
        tracing::warn!(id = %id, error = %err, "connector failed to start");
        self.mark_error(id).await;
        Err(err)
    }

    /// Record a failed connector: status `error`, no process.
    async fn mark_error(&self, id: ConnectorId) {
        let mut registry = self.registry.lock().await;
        if registry.set_state(id, ProcessState::Error).is_err() {
            return;
        }
        if let Err(e) = registry.update(id, |r| r.status = ConnectorStatus::Error) {
            tracing::warn!(id = %id, error = %e, "failed to record error status");
        }
        self.commit(&mut registry).await;
    }

    /// Stop a connector's process if it has one. The caller holds its operation lock.
    async fn stop_runtime(&self, id: ConnectorId) -> Result<(), McpError> {
        let (name, runtime) = {
            let mut registry = self.registry.lock().await;
            let name = registry.get(id)?.name;
            (name, registry.detach_runtime(id))
        };

        if let Some(runtime) = runtime {
            self.controller.shutdown(runtime, &name).await;
        }
        Ok(())
    }

    async fn check_health(&self, id: ConnectorId) -> Option<HealthReport> {
        let (record, runtime) = {
            let mut registry = self.registry.lock().await;
            let record = registry.find(id)?;
            if !record.status.is_active() {
                return Some(HealthReport::not_applicable(&record));
            }
            let runtime = registry.take_runtime(id);
            (record, runtime)
        };

        let result = match runtime {
            Some(mut runtime) => {
                let result = self.controller.probe_running(&record, &mut runtime).await;
                if result.is_ok() {
                    let restored = self.registry.lock().await.restore_runtime(id, runtime);
                    if let Err(runtime) = restored {
                        self.controller.shutdown(runtime, &record.name).await;
                    }
                } else {
                    self.registry.lock().await.detach_runtime(id);
                    self.controller.shutdown(runtime, &record.name).await;
                }
                result
            }
            None => match self.emitter.launch_spec(&record) {
                Some(spec) => self.controller.probe_once(&record, &spec).await,
                None => Err(McpError::probe_failed(id, &record.name, "no launch command for this source")),
            },
        };

        Some(match result {
            Ok(report) => HealthReport {
                id,
                name: record.name,
                healthy: Some(true),
                detail: Some(report.summary()),
            },
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "health check failed");
                self.mark_error(id).await;
                HealthReport {
                    id,
                    name: record.name,
                    healthy: Some(false),
                    detail: Some(e.to_string()),
                }
            }
        })
    }

    /// List a connector's tools. The caller holds its operation lock.
    async fn fetch_tools(&self, id: ConnectorId) -> Result<ConnectorTools, McpError> {
        let (record, runtime) = {
            let mut registry = self.registry.lock().await;
            let record = registry.get(id)?;
            if !record.status.is_active() {
                return Err(McpError::NotActive {
                    id,
                    name: record.name,
                });
            }
            let runtime = registry.take_runtime(id);
            (record, runtime)
        };

        let tools = match runtime {
            Some(mut runtime) => {
                let result = self.controller.list_running(&record, &mut runtime).await;
                let restored = self.registry.lock().await.restore_runtime(id, runtime);
                if let Err(runtime) = restored {
                    self.controller.shutdown(runtime, &record.name).await;
                }
                result
            }
            None => match self.emitter.launch_spec(&record) {
                Some(spec) => self.controller.list_once(&record, &spec).await,
                None => Err(McpError::tool_list_failed(id, &record.name, "no launch command for this source")),
            },
        }?;

        tracing::debug!(id = %id, count = tools.len(), "listed connector tools");
        Ok(ConnectorTools {
            id,
            name: record.name,
            tools,
        })
    }

    async fn draft_record(&self, source: &str, options: &InstallOptions) -> Result<Draft, McpError> {
        let (kind, name, description, base) = if let Some(location) = locate(source) {
            let (name, description) = self.describe_repository(&location).await?;
            let base = location.source_name().to_string();
            (SourceKind::Repository, name, description, base)
        } else if is_local_path(source) {
            let name = Path::new(source)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "local-tool".to_string());
            let description = format!("Local MCP tool at {}", source);
            (SourceKind::LocalPath, name.clone(), description, name)
        } else {
            return Err(McpError::InvalidSource(source.to_string()));
        };

        let name = options.name.clone().filter(|n| !n.trim().is_empty()).unwrap_or(name);
        let base = if kind == SourceKind::LocalPath { name.clone() } else { base };

        let record = ConnectorRecord::new(name, kind, source)
            .with_description(description)
            .with_status(ConnectorStatus::Active)
            .with_spaces(options.spaces.iter().cloned())
            .with_config(options.config.clone());

        Ok(Draft {
            record,
            client_base: base,
        })
    }

    /// Fetch display name and description for a repository source.
    async fn describe_repository(&self, location: &RepoLocation) -> Result<(String, String), McpError> {
        match location.subpath.as_deref() {
            Some(subpath) => {
                let entries = self.source.contents(&location.owner, &location.repo, subpath).await?;
                warn_if_invalid(location, &entries);

                let dir = location.source_name();
                let description = match location.official_server() {
                    Some(server) => format!("Official MCP server for {}", server),
                    None => format!("MCP tool from {}/{}", location.slug(), subpath),
                };
                Ok((display_name(dir), description))
            }
            None => {
                let info = self.source.repo_info(&location.owner, &location.repo).await?;
                match self.source.contents(&location.owner, &location.repo, "").await {
                    Ok(entries) => warn_if_invalid(location, &entries),
                    Err(e) => tracing::debug!(repo = %location.slug(), error = %e, "skipping repository layout check"),
                }
                Ok((info.name, info.description.unwrap_or_default()))
            }
        }
    }

    /// Save pending registry changes and rewrite the document.
    ///
    /// The caller holds the registry lock across this call. Failures are
    /// logged; the in-memory state stays authoritative.
    async fn commit(&self, registry: &mut ConnectorRegistry) {
        let pending = registry.take_pending_save();
        let document = self
            .document_path
            .clone()
            .map(|path| (path, self.emitter.render(&registry.list())));
        if pending.is_none() && document.is_none() {
            return;
        }

        let written = tokio::task::spawn_blocking(move || {
            if let Some(pending) = pending {
                let path = pending.path().to_path_buf();
                if let Err(e) = pending.write() {
                    tracing::warn!(path = %path.display(), error = %e, "failed to persist tool registry");
                }
            }
            if let Some((path, document)) = document {
                if let Err(e) = document.write_to_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to write configuration document");
                }
            }
        })
        .await;

        if let Err(e) = written {
            tracing::warn!(error = %e, "file write task failed");
        }
    }
}

struct Draft {
    record: ConnectorRecord,
    client_base: String,
}

fn warn_if_invalid(location: &RepoLocation, entries: &[ContentEntry]) {
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    let validation = validate_repository(&names);
    for error in &validation.errors {
        tracing::warn!(repo = %location.slug(), "{}", error);
    }
}

/// Whether `source` should be treated as a filesystem path.
fn is_local_path(source: &str) -> bool {
    !source.is_empty()
        && !source.contains("://")
        && (Path::new(source).is_absolute() || source.starts_with('.') || source.starts_with('~'))
}
