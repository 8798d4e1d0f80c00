// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for the MCP module.
//!
//! These benchmarks measure:
//! - Source URL parsing
//! - Document rendering for a full registry
//! - Registry persistence format

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use mcp_console::mcp::{
    locate, unique_client_id, ConfigEmitter, ConnectorId, ConnectorRecord, ConnectorStatus,
    McpConfigDocument, SourceKind,
};

fn records(count: u64) -> Vec<ConnectorRecord> {
    (1..=count)
        .map(|i| {
            let url = if i % 3 == 0 {
                "https://github.com/modelcontextprotocol/servers/tree/main/src/brave-search".to_string()
            } else {
                format!("https://github.com/acme/tool-{}", i)
            };
            let status = if i % 4 == 0 {
                ConnectorStatus::Inactive
            } else {
                ConnectorStatus::Active
            };
            let mut record = ConnectorRecord::new(format!("Tool {}", i), SourceKind::Repository, url)
                .with_status(status)
                .with_spaces(["Eng", "Ops"])
                .with_config([("API_KEY", "secret"), ("REGION", "eu")])
                .with_client_id(format!("tool-{}", i));
            record.id = ConnectorId(i);
            record
        })
        .collect()
}

/// Benchmark source URL parsing.
fn bench_locate(c: &mut Criterion) {
    let urls = [
        "https://github.com/acme/search-tool",
        "https://github.com/modelcontextprotocol/servers/tree/main/src/brave-search",
        "github.com/acme/search-tool.git",
        "https://gitlab.com/acme/search-tool",
    ];

    c.bench_function("mcp_locate", |b| {
        b.iter(|| {
            for url in &urls {
                black_box(locate(black_box(url)));
            }
        });
    });
}

/// Benchmark document rendering as the registry grows.
fn bench_render(c: &mut Criterion) {
    let emitter = ConfigEmitter::new("/var/lib/mcp-console/tools");
    let mut group = c.benchmark_group("mcp_render");

    for count in [10u64, 100, 500] {
        let records = records(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| emitter.render(black_box(records)).to_json().unwrap());
        });
    }

    group.finish();
}

/// Benchmark parsing a written document back.
fn bench_document_parse(c: &mut Criterion) {
    let emitter = ConfigEmitter::new("/var/lib/mcp-console/tools");
    let json = emitter.render(&records(100)).to_json().unwrap();

    c.bench_function("mcp_document_parse", |b| {
        b.iter(|| McpConfigDocument::from_json(black_box(&json)).unwrap());
    });
}

/// Benchmark client id assignment against many taken ids.
fn bench_unique_client_id(c: &mut Criterion) {
    let taken: Vec<String> = std::iter::once("search-tool".to_string())
        .chain((2..200).map(|n| format!("search-tool-{}", n)))
        .collect();

    c.bench_function("mcp_unique_client_id", |b| {
        b.iter(|| unique_client_id(black_box("Search Tool"), taken.iter().map(String::as_str)));
    });
}

criterion_group!(
    benches,
    bench_locate,
    bench_render,
    bench_document_parse,
    bench_unique_client_id,
);
criterion_main!(benches);
