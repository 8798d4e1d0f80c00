// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Connector registry.
//!
//! Holds every installed connector record together with its runtime state.
//! When a [`ToolStore`] is attached, every mutation leaves a [`PendingSave`]
//! of the full record list behind. The owner writes it with
//! [`flush`](ConnectorRegistry::flush), or takes it with
//! [`take_pending_save`](ConnectorRegistry::take_pending_save) to write it
//! off the async runtime. Without a store the registry is purely in memory.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::config::write_atomic;
use super::error::McpError;
use super::process::RunningConnector;
use super::types::{normalize_spaces, ConnectorId, ConnectorRecord, ProcessState};

/// On-disk layout of the registry file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    tools: Vec<ConnectorRecord>,
}

/// JSON file storage for connector records: `{ "tools": [...] }`.
#[derive(Debug, Clone)]
pub struct ToolStore {
    path: PathBuf,
}

impl ToolStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records. A missing file is an empty registry.
    pub fn load(&self) -> Result<Vec<ConnectorRecord>, McpError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| McpError::Persistence(format!("Failed to read {}: {}", self.path.display(), e)))?;
        let file: StoreFile = serde_json::from_str(&content)
            .map_err(|e| McpError::Persistence(format!("Failed to parse {}: {}", self.path.display(), e)))?;
        Ok(file.tools)
    }

    /// Replace the stored records.
    pub fn save(&self, records: &[ConnectorRecord]) -> Result<(), McpError> {
        let file = StoreFile {
            tools: records.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.path, json.as_bytes())
    }
}

/// A record list waiting to be written to its store.
#[derive(Debug)]
pub struct PendingSave {
    store: ToolStore,
    records: Vec<ConnectorRecord>,
}

impl PendingSave {
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Blocking write of the snapshot.
    pub fn write(self) -> Result<(), McpError> {
        self.store.save(&self.records)
    }
}

/// A record plus what the controller knows about its process.
#[derive(Debug)]
struct Slot {
    record: ConnectorRecord,
    state: ProcessState,
    runtime: Option<RunningConnector>,
}

impl Slot {
    fn new(mut record: ConnectorRecord) -> Self {
        record.process = None;
        Self {
            record,
            state: ProcessState::Stopped,
            runtime: None,
        }
    }
}

/// In-memory list of connector records with optional file persistence.
#[derive(Debug, Default)]
pub struct ConnectorRegistry {
    slots: Vec<Slot>,
    store: Option<ToolStore>,
    last_id: u64,
    dirty: bool,
}

impl ConnectorRegistry {
    /// A registry that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a registry backed by `store`.
    ///
    /// A missing or unreadable file yields an empty registry; the error is
    /// logged and the next mutation overwrites the file.
    pub fn open(store: ToolStore) -> Self {
        let records = match store.load() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(path = %store.path().display(), error = %e, "starting with empty tool registry");
                Vec::new()
            }
        };

        let mut registry = Self {
            slots: Vec::with_capacity(records.len()),
            store: Some(store),
            last_id: 0,
            dirty: false,
        };
        for record in records {
            if registry.contains(record.id) {
                tracing::warn!(id = %record.id, "dropping duplicate record from tool registry");
                continue;
            }
            registry.last_id = registry.last_id.max(record.id.0);
            registry.slots.push(Slot::new(record));
        }

        tracing::debug!(count = registry.slots.len(), "loaded tool registry");
        registry
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: ConnectorId) -> bool {
        self.slot(id).is_some()
    }

    /// Add a record, assigning an id when it has none.
    pub fn add(&mut self, mut record: ConnectorRecord) -> Result<ConnectorRecord, McpError> {
        if record.id.is_unassigned() {
            record.id = self.next_id();
        } else if self.contains(record.id) {
            return Err(McpError::DuplicateId(record.id));
        }
        self.last_id = self.last_id.max(record.id.0);
        record.spaces = normalize_spaces(std::mem::take(&mut record.spaces));

        let slot = Slot::new(record);
        let snapshot = slot.record.clone();
        self.slots.push(slot);
        self.dirty = true;

        tracing::debug!(id = %snapshot.id, name = %snapshot.name, "added connector");
        Ok(snapshot)
    }

    /// Remove a record.
    ///
    /// Callers stop the connector first; a runtime still attached here is
    /// dropped, which kills its process.
    pub fn remove(&mut self, id: ConnectorId) -> Result<ConnectorRecord, McpError> {
        let index = self
            .slots
            .iter()
            .position(|s| s.record.id == id)
            .ok_or(McpError::NotFound(id))?;

        let slot = self.slots.remove(index);
        if slot.runtime.is_some() {
            tracing::warn!(id = %id, "removed connector while its process was attached");
        }
        self.dirty = true;
        Ok(slot.record)
    }

    /// Snapshot of one record.
    pub fn find(&self, id: ConnectorId) -> Option<ConnectorRecord> {
        self.slot(id).map(|s| s.record.clone())
    }

    /// Snapshot of one record, or `NotFound`.
    pub fn get(&self, id: ConnectorId) -> Result<ConnectorRecord, McpError> {
        self.find(id).ok_or(McpError::NotFound(id))
    }

    /// Snapshot of all records in insertion order.
    pub fn list(&self) -> Vec<ConnectorRecord> {
        self.slots.iter().map(|s| s.record.clone()).collect()
    }

    /// Mutate a record in place and persist.
    ///
    /// The id and process view cannot be changed through here.
    pub fn update<F>(&mut self, id: ConnectorId, mutate: F) -> Result<ConnectorRecord, McpError>
    where
        F: FnOnce(&mut ConnectorRecord),
    {
        let slot = self.slot_mut(id)?;
        let mut record = slot.record.clone();
        mutate(&mut record);
        record.id = slot.record.id;
        record.process = slot.record.process.clone();
        record.spaces = normalize_spaces(std::mem::take(&mut record.spaces));
        slot.record = record;

        let snapshot = slot.record.clone();
        self.dirty = true;
        Ok(snapshot)
    }

    /// Client ids in use, optionally ignoring one record.
    pub fn client_ids(&self, except: Option<ConnectorId>) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| Some(s.record.id) != except)
            .filter_map(|s| s.record.client_id.clone())
            .collect()
    }

    /// Controller state of a connector.
    pub fn state(&self, id: ConnectorId) -> Result<ProcessState, McpError> {
        self.slot(id).map(|s| s.state).ok_or(McpError::NotFound(id))
    }

    pub fn set_state(&mut self, id: ConnectorId, state: ProcessState) -> Result<(), McpError> {
        self.slot_mut(id)?.state = state;
        Ok(())
    }

    /// Whether a runtime is held for this connector.
    pub fn has_runtime(&self, id: ConnectorId) -> bool {
        self.slot(id).is_some_and(|s| s.runtime.is_some())
    }

    /// Hand a started runtime to the slot; the record gets its process view.
    ///
    /// On `NotFound` the runtime is given back so the caller can stop it.
    pub fn attach_runtime(
        &mut self,
        id: ConnectorId,
        runtime: RunningConnector,
    ) -> Result<ConnectorRecord, (McpError, RunningConnector)> {
        let Some(slot) = self.slots.iter_mut().find(|s| s.record.id == id) else {
            return Err((McpError::NotFound(id), runtime));
        };
        slot.record.process = Some(runtime.info().clone());
        slot.state = ProcessState::Running;
        slot.runtime = Some(runtime);
        Ok(slot.record.clone())
    }

    /// Take the runtime out of the slot and mark the connector stopped.
    pub fn detach_runtime(&mut self, id: ConnectorId) -> Option<RunningConnector> {
        let slot = self.slots.iter_mut().find(|s| s.record.id == id)?;
        slot.record.process = None;
        slot.state = ProcessState::Stopped;
        slot.runtime.take()
    }

    /// Borrow the runtime out of the slot for a probe, leaving the record as is.
    pub fn take_runtime(&mut self, id: ConnectorId) -> Option<RunningConnector> {
        self.slots
            .iter_mut()
            .find(|s| s.record.id == id)
            .and_then(|s| s.runtime.take())
    }

    /// Put back a runtime taken with [`take_runtime`](Self::take_runtime).
    pub fn restore_runtime(
        &mut self,
        id: ConnectorId,
        runtime: RunningConnector,
    ) -> Result<(), RunningConnector> {
        match self.slots.iter_mut().find(|s| s.record.id == id) {
            Some(slot) => {
                slot.runtime = Some(runtime);
                Ok(())
            }
            None => Err(runtime),
        }
    }

    /// Detach every runtime, returning them with their connector names.
    pub fn take_all_runtimes(&mut self) -> Vec<(String, RunningConnector)> {
        self.slots
            .iter_mut()
            .filter_map(|slot| {
                let runtime = slot.runtime.take()?;
                slot.record.process = None;
                slot.state = ProcessState::Stopped;
                Some((slot.record.name.clone(), runtime))
            })
            .collect()
    }

    fn slot(&self, id: ConnectorId) -> Option<&Slot> {
        self.slots.iter().find(|s| s.record.id == id)
    }

    fn slot_mut(&mut self, id: ConnectorId) -> Result<&mut Slot, McpError> {
        self.slots
            .iter_mut()
            .find(|s| s.record.id == id)
            .ok_or(McpError::NotFound(id))
    }

    /// Milliseconds since epoch, bumped past the last id handed out.
    fn next_id(&mut self) -> ConnectorId {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let mut candidate = now.max(self.last_id + 1);
        while self.contains(ConnectorId(candidate)) {
            candidate += 1;
        }
        self.last_id = candidate;
        ConnectorId(candidate)
    }

    /// Snapshot of the records if they changed since the last save.
    ///
    /// Taking the snapshot clears the change flag; a failed write is retried
    /// by the next mutation's save, which carries the full list.
    pub fn take_pending_save(&mut self) -> Option<PendingSave> {
        if !std::mem::take(&mut self.dirty) {
            return None;
        }
        let store = self.store.clone()?;
        Some(PendingSave {
            store,
            records: self.list(),
        })
    }

    /// Write pending changes now. Failures are logged and the records stay
    /// in memory.
    pub fn flush(&mut self) {
        let Some(pending) = self.take_pending_save() else {
            return;
        };
        let path = pending.path().to_path_buf();
        if let Err(e) = pending.write() {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist tool registry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::{ConnectorStatus, SourceKind};
    use tempfile::TempDir;

    fn record(name: &str) -> ConnectorRecord {
        ConnectorRecord::new(name, SourceKind::Repository, format!("https://github.com/acme/{}", name))
    }

    #[test]
    fn test_add_assigns_monotonic_ids() {
        let mut registry = ConnectorRegistry::in_memory();
        let a = registry.add(record("a")).unwrap();
        let b = registry.add(record("b")).unwrap();
        let c = registry.add(record("c")).unwrap();

        assert!(!a.id.is_unassigned());
        assert!(a.id < b.id && b.id < c.id);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let mut registry = ConnectorRegistry::in_memory();
        let mut first = record("a");
        first.id = ConnectorId(5);
        registry.add(first).unwrap();

        let mut second = record("b");
        second.id = ConnectorId(5);
        let err = registry.add(second).unwrap_err();
        assert!(matches!(err, McpError::DuplicateId(ConnectorId(5))));
        assert_eq!(registry.len(), 1);

        // Generated ids skip past supplied ones.
        let next = registry.add(record("c")).unwrap();
        assert!(next.id.0 > 5);
    }

    #[test]
    fn test_remove_and_find() {
        let mut registry = ConnectorRegistry::in_memory();
        let a = registry.add(record("a")).unwrap();

        assert_eq!(registry.find(a.id).unwrap().name, "a");
        assert_eq!(registry.remove(a.id).unwrap().id, a.id);
        assert!(registry.find(a.id).is_none());
        assert!(matches!(registry.remove(a.id), Err(McpError::NotFound(_))));
    }

    #[test]
    fn test_update_preserves_id() {
        let mut registry = ConnectorRegistry::in_memory();
        let a = registry.add(record("a")).unwrap();

        let updated = registry
            .update(a.id, |r| {
                r.id = ConnectorId(1);
                r.status = ConnectorStatus::Error;
                r.spaces = vec!["Sales".into(), "Eng".into(), "Sales".into()];
            })
            .unwrap();

        assert_eq!(updated.id, a.id);
        assert_eq!(updated.status, ConnectorStatus::Error);
        assert_eq!(updated.spaces, vec!["Eng", "Sales"]);
        assert!(registry.update(ConnectorId(1), |_| {}).is_err());
    }

    #[test]
    fn test_client_ids_except() {
        let mut registry = ConnectorRegistry::in_memory();
        let a = registry.add(record("a").with_client_id("a")).unwrap();
        registry.add(record("b").with_client_id("b")).unwrap();
        registry.add(record("c")).unwrap();

        assert_eq!(registry.client_ids(None), vec!["a", "b"]);
        assert_eq!(registry.client_ids(Some(a.id)), vec!["b"]);
    }

    #[test]
    fn test_store_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tools.json");

        let id = {
            let mut registry = ConnectorRegistry::open(ToolStore::new(&path));
            assert!(registry.is_empty());
            let a = registry.add(record("a").with_spaces(["Eng"])).unwrap();
            registry.add(record("b")).unwrap();
            registry.update(a.id, |r| r.status = ConnectorStatus::Active).unwrap();
            registry.flush();
            a.id
        };

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"tools\""));

        let registry = ConnectorRegistry::open(ToolStore::new(&path));
        assert_eq!(registry.len(), 2);
        let a = registry.find(id).unwrap();
        assert_eq!(a.status, ConnectorStatus::Active);
        assert_eq!(a.spaces, vec!["Eng"]);
        assert_eq!(registry.state(id).unwrap(), ProcessState::Stopped);
    }

    #[test]
    fn test_reopened_registry_keeps_ids_increasing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tools.json");

        let mut far_future = record("a");
        far_future.id = ConnectorId(u64::MAX / 2);
        let mut first = ConnectorRegistry::open(ToolStore::new(&path));
        first.add(far_future).unwrap();
        first.flush();

        let mut registry = ConnectorRegistry::open(ToolStore::new(&path));
        let next = registry.add(record("b")).unwrap();
        assert_eq!(next.id.0, u64::MAX / 2 + 1);
    }

    #[test]
    fn test_corrupt_store_falls_back_to_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tools.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut registry = ConnectorRegistry::open(ToolStore::new(&path));
        assert!(registry.is_empty());

        registry.add(record("a")).unwrap();
        registry.flush();
        assert_eq!(ToolStore::new(&path).load().unwrap().len(), 1);
    }

    #[test]
    fn test_persist_failure_keeps_mutation() {
        let temp = TempDir::new().unwrap();
        // A plain file where the data directory should be makes every save fail.
        let blocker = temp.path().join("data");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("tools.json");

        let mut registry = ConnectorRegistry::open(ToolStore::new(&path));
        let a = registry.add(record("a")).unwrap();
        let pending = registry.take_pending_save().unwrap();
        assert!(matches!(pending.write(), Err(McpError::Persistence(_))));

        registry.update(a.id, |r| r.status = ConnectorStatus::Active).unwrap();
        registry.flush();
        assert_eq!(registry.find(a.id).unwrap().status, ConnectorStatus::Active);
    }

    #[test]
    fn test_stale_temp_file_does_not_block_saves() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tools.json");
        std::fs::create_dir_all(path.with_extension("json.tmp")).unwrap();
        std::fs::write(temp.path().join("tools.json.tmp.1"), "{ partial").unwrap();

        let mut registry = ConnectorRegistry::open(ToolStore::new(&path));
        registry.add(record("a")).unwrap();
        registry.flush();

        assert_eq!(ToolStore::new(&path).load().unwrap().len(), 1);
    }

    #[test]
    fn test_pending_save_is_deferred_until_written() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tools.json");

        let mut registry = ConnectorRegistry::open(ToolStore::new(&path));
        registry.add(record("a")).unwrap();
        registry.add(record("b")).unwrap();
        assert!(!path.exists());

        let pending = registry.take_pending_save().unwrap();
        assert_eq!(pending.path(), path.as_path());
        assert!(registry.take_pending_save().is_none());
        pending.write().unwrap();
        assert_eq!(ToolStore::new(&path).load().unwrap().len(), 2);

        // Reads and runtime bookkeeping do not dirty the store.
        let id = registry.list()[0].id;
        assert!(registry.detach_runtime(id).is_none());
        assert!(registry.take_pending_save().is_none());
    }

    #[test]
    fn test_in_memory_registry_has_nothing_to_save() {
        let mut registry = ConnectorRegistry::in_memory();
        registry.add(record("a")).unwrap();
        assert!(registry.take_pending_save().is_none());
    }
}
