// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Browsable connector catalog.
//!
//! Official servers are listed from the `src/` directory of the official
//! monorepo. When the repository host is unreachable a built-in list is
//! returned instead, so the catalog never comes back empty because of the
//! network.

use serde::Serialize;

use crate::github::{RepoSummary, RepositorySource, DEFAULT_SEARCH_QUERY};

use super::error::McpError;
use super::locator::{OFFICIAL_OWNER, OFFICIAL_REPO, OFFICIAL_SERVERS_DIR};

/// One installable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub source_url: String,
    pub official: bool,
    pub category: String,
}

impl CatalogEntry {
    fn official(name: &str, description: &str, server: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            source_url: official_source_url(server),
            official: true,
            category: category.to_string(),
        }
    }
}

/// Tree URL of an official server directory.
pub fn official_source_url(server: &str) -> String {
    format!(
        "https://github.com/{}/{}/tree/main/{}/{}",
        OFFICIAL_OWNER, OFFICIAL_REPO, OFFICIAL_SERVERS_DIR, server
    )
}

/// Display name for a server directory: `brave-search` -> `Brave search`.
pub fn display_name(dir: &str) -> String {
    let mut chars = dir.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>().replace('-', " "),
        None => String::new(),
    }
}

/// Entries returned when the official listing cannot be fetched.
pub fn builtin_catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::official(
            "Postgres Database",
            "Read-only database access with schema inspection capabilities",
            "postgres",
            "Database",
        ),
        CatalogEntry::official(
            "Brave Search",
            "Web and local search using Brave's Search API",
            "brave-search",
            "Search",
        ),
        CatalogEntry::official(
            "Google Drive",
            "File access and search capabilities for Google Drive",
            "gdrive",
            "File Storage",
        ),
        CatalogEntry::official(
            "Filesystem",
            "Secure file operations with configurable access controls",
            "filesystem",
            "File Storage",
        ),
        CatalogEntry::official(
            "Slack",
            "Channel management and messaging capabilities",
            "slack",
            "Communications",
        ),
        CatalogEntry::official(
            "GitHub",
            "Repository management, file operations, and GitHub API integration",
            "github",
            "Development",
        ),
        CatalogEntry::official(
            "Memory",
            "Knowledge graph-based persistent memory system",
            "memory",
            "AI Utility",
        ),
        CatalogEntry::official(
            "Time",
            "Time and timezone conversion capabilities",
            "time",
            "Utility",
        ),
    ]
}

/// List official servers, falling back to [`builtin_catalog`] on upstream errors.
pub async fn official_catalog(source: &dyn RepositorySource) -> Vec<CatalogEntry> {
    match source
        .contents(OFFICIAL_OWNER, OFFICIAL_REPO, OFFICIAL_SERVERS_DIR)
        .await
    {
        Ok(entries) => entries
            .iter()
            .filter(|e| e.is_dir())
            .map(|dir| CatalogEntry {
                name: display_name(&dir.name),
                description: format!("Official MCP server for {}", dir.name),
                source_url: official_source_url(&dir.name),
                official: true,
                category: "Official".to_string(),
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "official catalog unavailable, using built-in list");
            builtin_catalog()
        }
    }
}

/// Search community connectors. An empty query uses the default topic.
pub async fn search_catalog(
    source: &dyn RepositorySource,
    query: Option<&str>,
) -> Result<Vec<RepoSummary>, McpError> {
    let query = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(DEFAULT_SEARCH_QUERY);
    source.search_repositories(query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::locator::locate;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("brave-search"), "Brave search");
        assert_eq!(display_name("time"), "Time");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn test_builtin_catalog_entries_are_official_sources() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.len(), 8);

        for entry in &catalog {
            let location = locate(&entry.source_url).unwrap();
            assert!(location.official_server().is_some(), "{}", entry.source_url);
            assert!(entry.official);
        }
    }
}
