// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process metrics for connector operations.
//!
//! Two kinds of measurement are kept: timings for named orchestrator
//! operations (`mcp.install`, `github.request`, ...) and probe outcomes per
//! connector. Both are cheap enough to record on every call.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Latency bucket upper bounds in milliseconds; the last bucket is open.
const BUCKETS_MS: [u64; 6] = [10, 100, 500, 1_000, 5_000, 30_000];

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    operations: RwLock<BTreeMap<String, OperationMetrics>>,
    probes: RwLock<BTreeMap<String, ProbeMetrics>>,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(BTreeMap::new()),
            probes: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a timed operation.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        let mut ops = self.operations.write().unwrap_or_else(PoisonError::into_inner);
        ops.entry(name.to_string()).or_default().record(duration);
    }

    /// Record a health probe against a connector.
    pub fn record_probe(&self, connector: &str, duration: Duration, healthy: bool) {
        let mut probes = self.probes.write().unwrap_or_else(PoisonError::into_inner);
        probes
            .entry(connector.to_string())
            .or_default()
            .record(duration, healthy);
    }

    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn probe_metrics(&self, connector: &str) -> Option<ProbeMetrics> {
        self.probes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(connector)
            .cloned()
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations: self
                .operations
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            probes: self.probes.read().unwrap_or_else(PoisonError::into_inner).clone(),
            uptime: self.uptime(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.probes.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing of one named operation.
#[derive(Debug, Clone, Default)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,

    /// Counts per latency bucket, see `BUCKETS_MS`.
    pub buckets: [u64; BUCKETS_MS.len() + 1],
}

impl OperationMetrics {
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);

        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let idx = BUCKETS_MS
            .iter()
            .position(|&bound| millis <= bound)
            .unwrap_or(BUCKETS_MS.len());
        self.buckets[idx] += 1;
    }

    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        u32::try_from(self.count)
            .map(|n| self.total_duration / n)
            .unwrap_or(Duration::ZERO)
    }
}

/// Probe outcomes for one connector.
#[derive(Debug, Clone, Default)]
pub struct ProbeMetrics {
    pub probes: u64,
    pub healthy: u64,
    pub unhealthy: u64,
    pub last_duration: Duration,
    pub last_healthy: Option<bool>,
}

impl ProbeMetrics {
    pub fn record(&mut self, duration: Duration, healthy: bool) {
        self.probes += 1;
        if healthy {
            self.healthy += 1;
        } else {
            self.unhealthy += 1;
        }
        self.last_duration = duration;
        self.last_healthy = Some(healthy);
    }

    /// Fraction of healthy probes, 1.0 when none ran.
    pub fn success_rate(&self) -> f64 {
        if self.probes == 0 {
            1.0
        } else {
            self.healthy as f64 / self.probes as f64
        }
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub operations: BTreeMap<String, OperationMetrics>,
    pub probes: BTreeMap<String, ProbeMetrics>,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = format!("Uptime: {:.2?}\n", self.uptime);

        if !self.operations.is_empty() {
            report.push_str("\nOperations:\n");
            for (name, metrics) in &self.operations {
                report.push_str(&format!(
                    "  {}: {} calls, avg {:.2?}, max {:.2?}\n",
                    name,
                    metrics.count,
                    metrics.avg_duration(),
                    metrics.max_duration
                ));
            }
        }

        if !self.probes.is_empty() {
            report.push_str("\nProbes:\n");
            for (name, metrics) in &self.probes {
                report.push_str(&format!(
                    "  {}: {} probes, {:.0}% healthy, last {:.2?}\n",
                    name,
                    metrics.probes,
                    metrics.success_rate() * 100.0,
                    metrics.last_duration
                ));
            }
        }

        report
    }
}

/// Record an operation to global metrics.
pub fn record_operation(name: &str, duration: Duration) {
    GLOBAL_METRICS.record_operation(name, duration);
}
