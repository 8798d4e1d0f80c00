// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Source repository API.
//!
//! The orchestrator only needs three read-only calls: repository metadata,
//! a directory listing, and a repository search. They sit behind the
//! [`RepositorySource`] trait; [`GitHubClient`] implements it against the
//! GitHub REST API.

use std::time::Duration;

#[cfg(feature = "telemetry")]
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::mcp::McpError;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Default GitHub API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default query for community connector search.
pub const DEFAULT_SEARCH_QUERY: &str = "topic:mcp-server";

const USER_AGENT: &str = concat!("mcp-console/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const SEARCH_PAGE_SIZE: u32 = 100;

/// Repository metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub html_url: Option<String>,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

/// One entry of a repository directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,

    #[serde(default)]
    pub path: String,

    #[serde(rename = "type")]
    pub kind: ContentKind,

    #[serde(default)]
    pub html_url: Option<String>,
}

impl ContentEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == ContentKind::Dir
    }
}

/// A repository returned by search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSummary {
    pub name: String,
    pub description: String,
    pub url: String,
    pub owner: String,
    pub stars: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Read-only access to a source repository host.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Metadata for `owner/repo`.
    async fn repo_info(&self, owner: &str, repo: &str) -> Result<RepoInfo, McpError>;

    /// Directory listing at `path` (empty for the root).
    async fn contents(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<ContentEntry>, McpError>;

    /// Search repositories, most recently updated first.
    async fn search_repositories(&self, query: &str) -> Result<Vec<RepoSummary>, McpError>;
}

/// GitHub REST API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client for `base_url`, authenticating with `token` when set.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, McpError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(McpError::upstream)?;

        if token.is_none() {
            tracing::debug!("no GitHub token configured, using unauthenticated requests");
        }

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, McpError> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("accept", ACCEPT)
            .query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(McpError::upstream)?;
        let status = response.status();

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("github.request", start.elapsed());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, path, &body));
        }

        response.json().await.map_err(McpError::upstream)
    }
}

fn error_for_status(status: StatusCode, path: &str, body: &str) -> McpError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    match status {
        StatusCode::NOT_FOUND => McpError::Upstream(format!("{} not found", path)),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            McpError::Upstream(format!("GitHub API refused request ({}): {}", status.as_u16(), message))
        }
        _ => McpError::Upstream(format!("GitHub API error {}: {}", status.as_u16(), message)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentEntry>),
    Single(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    name: String,
    #[serde(default)]
    description: Option<String>,
    html_url: String,
    #[serde(default)]
    owner: Option<SearchOwner>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SearchOwner {
    login: String,
}

impl From<SearchItem> for RepoSummary {
    fn from(item: SearchItem) -> Self {
        Self {
            name: item.name,
            description: item.description.unwrap_or_default(),
            url: item.html_url,
            owner: item.owner.map(|o| o.login).unwrap_or_default(),
            stars: item.stargazers_count,
            updated_at: item.updated_at,
        }
    }
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn repo_info(&self, owner: &str, repo: &str) -> Result<RepoInfo, McpError> {
        self.get_json(&format!("/repos/{}/{}", owner, repo), &[]).await
    }

    async fn contents(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<ContentEntry>, McpError> {
        let path = path.trim_matches('/');
        let url = if path.is_empty() {
            format!("/repos/{}/{}/contents", owner, repo)
        } else {
            format!("/repos/{}/{}/contents/{}", owner, repo, path)
        };

        match self.get_json(&url, &[]).await? {
            ContentsResponse::Listing(entries) => Ok(entries),
            ContentsResponse::Single(_) => Err(McpError::Upstream(format!(
                "Expected a directory listing at {}/{}/{}",
                owner, repo, path
            ))),
        }
    }

    async fn search_repositories(&self, query: &str) -> Result<Vec<RepoSummary>, McpError> {
        let query = if query.trim().is_empty() {
            DEFAULT_SEARCH_QUERY
        } else {
            query.trim()
        };

        let response: SearchResponse = self
            .get_json(
                "/search/repositories",
                &[
                    ("q", query.to_string()),
                    ("sort", "updated".to_string()),
                    ("order", "desc".to_string()),
                    ("per_page", SEARCH_PAGE_SIZE.to_string()),
                ],
            )
            .await?;

        Ok(response.items.into_iter().map(RepoSummary::from).collect())
    }
}
