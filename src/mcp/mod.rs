// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP tool connector management.
//!
//! Connectors are external MCP servers installed from a repository or a local
//! path. This module tracks them, runs their processes, and emits the
//! configuration document a chat host uses to launch them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       ToolManager                         │
//! │  ┌────────────┐  ┌─────────────────┐  ┌───────────────┐  │
//! │  │ Connector  │  │    Process      │  │    Config     │  │
//! │  │ Registry   │  │   Controller    │  │    Emitter    │  │
//! │  └─────┬──────┘  └───┬─────────┬───┘  └───────┬───────┘  │
//! └────────┼─────────────┼─────────┼──────────────┼──────────┘
//!          │             │         │              │
//!    ┌─────▼─────┐ ┌─────▼────┐ ┌──▼────────┐ ┌───▼──────────┐
//!    │tools.json │ │ Process  │ │ Protocol  │ │mcp-config.json│
//!    │           │ │  Host    │ │  Client   │ │              │
//!    └───────────┘ └──────────┘ └───────────┘ └──────────────┘
//! ```
//!
//! The manager is the only writer. Readers get cloned snapshots of records.

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod locator;
pub mod manager;
pub mod process;
pub mod registry;
pub mod types;

pub use catalog::{builtin_catalog, official_catalog, search_catalog, CatalogEntry};
pub use client::{ClientError, ClientSession, ProtocolClient, RmcpClient};
pub use config::{ConfigEmitter, LaunchSpec, McpConfigDocument};
pub use error::McpError;
pub use locator::{locate, validate_repository, RepoLocation};
pub use manager::{ToolManager, ToolManagerOptions};
pub use process::{ProcessController, ProcessHandle, ProcessHost, RunningConnector, TokioProcessHost};
pub use registry::{ConnectorRegistry, PendingSave, ToolStore};
pub use types::*;
