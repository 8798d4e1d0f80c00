// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing and metrics.
//!
//! - **Tracing**: structured logs to stderr, filtered by `RUST_LOG` or the
//!   CLI verbosity flags.
//! - **Metrics**: operation timings and per-connector probe outcomes,
//!   recorded when the `telemetry` feature is enabled.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mcp_console::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! ```
//!
//! Public async operations carry `#[instrument]`, with connector ids and
//! sources as fields. Config values are never recorded since they may hold
//! secrets.

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{Metrics, MetricsSnapshot, OperationMetrics, ProbeMetrics, GLOBAL_METRICS};
