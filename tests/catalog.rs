// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Catalog browsing against a mocked repository source.

mod common;

use common::{dir_entry, file_entry, MockSource};
use mcp_console::github::{RepoSummary, DEFAULT_SEARCH_QUERY};
use mcp_console::mcp::{builtin_catalog, locate, official_catalog, search_catalog, McpError};

#[tokio::test]
async fn test_official_catalog_lists_server_directories() {
    let mut source = MockSource::new();
    source
        .expect_contents()
        .withf(|owner, repo, path| owner == "modelcontextprotocol" && repo == "servers" && path == "src")
        .times(1)
        .returning(|_, _, _| {
            Ok(vec![
                dir_entry("src/brave-search"),
                dir_entry("src/time"),
                file_entry("README.md"),
            ])
        });

    let entries = official_catalog(&source).await;

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "Brave search");
    assert_eq!(entries[0].description, "Official MCP server for brave-search");
    assert!(entries.iter().all(|e| e.official));

    // Every entry installs as the official server it names.
    let location = locate(&entries[1].source_url).unwrap();
    assert_eq!(location.official_server(), Some("time"));
}

#[tokio::test]
async fn test_official_catalog_falls_back_to_builtin() {
    let mut source = MockSource::new();
    source
        .expect_contents()
        .times(1)
        .returning(|_, _, _| Err(McpError::upstream("GitHub API returned 403 Forbidden: rate limited")));

    let entries = official_catalog(&source).await;

    assert_eq!(entries, builtin_catalog());
    assert_eq!(entries.len(), 8);
}

#[tokio::test]
async fn test_search_catalog_default_query() {
    let mut source = MockSource::new();
    source
        .expect_search_repositories()
        .withf(|query| query == DEFAULT_SEARCH_QUERY)
        .times(2)
        .returning(|_| {
            Ok(vec![RepoSummary {
                name: "search-tool".to_string(),
                description: "Full-text search".to_string(),
                url: "https://github.com/acme/search-tool".to_string(),
                owner: "acme".to_string(),
                stars: 12,
                updated_at: None,
            }])
        });

    let repos = search_catalog(&source, None).await.unwrap();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].owner, "acme");

    search_catalog(&source, Some("   ")).await.unwrap();
}

#[tokio::test]
async fn test_search_catalog_query_and_errors() {
    let mut source = MockSource::new();
    source
        .expect_search_repositories()
        .withf(|query| query == "weather")
        .times(1)
        .returning(|_| Err(McpError::upstream("GitHub API returned 422")));

    let err = search_catalog(&source, Some(" weather ")).await.unwrap_err();
    assert!(matches!(err, McpError::Upstream(_)));
}
