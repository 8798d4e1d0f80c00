// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Repository source parsing.
//!
//! Turns a source URL into an owner/repository pair. This is shape
//! validation only; nothing here touches the network.

use once_cell::sync::Lazy;
use regex::Regex;

/// Owner of the official MCP server monorepo.
pub const OFFICIAL_OWNER: &str = "modelcontextprotocol";

/// Name of the official MCP server monorepo.
pub const OFFICIAL_REPO: &str = "servers";

/// Directory holding the official servers inside the monorepo.
pub const OFFICIAL_SERVERS_DIR: &str = "src";

static REPO_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.)?github\.com/([\w.-]+)/([\w.-]+?)(?:\.git)?(?:/tree/([^/]+)/(.+?))?/?$",
    )
    .expect("repository pattern is valid")
});

/// A parsed repository source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    pub owner: String,
    pub repo: String,

    /// Branch or tag from a `/tree/<ref>/...` URL.
    pub git_ref: Option<String>,

    /// Directory inside the repository from a `/tree/<ref>/...` URL.
    pub subpath: Option<String>,
}

impl RepoLocation {
    /// The name this source goes by: the last subpath segment, or the repo.
    pub fn source_name(&self) -> &str {
        self.subpath
            .as_deref()
            .and_then(|p| p.rsplit('/').next())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.repo)
    }

    /// The official server name, if this points into the official monorepo.
    pub fn official_server(&self) -> Option<&str> {
        if self.owner != OFFICIAL_OWNER || self.repo != OFFICIAL_REPO {
            return None;
        }
        let subpath = self.subpath.as_deref()?;
        let name = subpath
            .strip_prefix(OFFICIAL_SERVERS_DIR)?
            .strip_prefix('/')?;
        (!name.is_empty() && !name.contains('/')).then_some(name)
    }

    /// `owner/repo` identifier.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Parse a source URL into its repository location.
///
/// Returns `None` for anything that is not a recognized repository URL;
/// callers decide whether to treat the input as a path or reject it.
pub fn locate(source: &str) -> Option<RepoLocation> {
    let caps = REPO_PATTERN.captures(source.trim())?;
    let owner = caps.get(1)?.as_str();
    let repo = caps.get(2)?.as_str();

    if matches!(repo, "." | "..") || matches!(owner, "." | "..") {
        return None;
    }

    Some(RepoLocation {
        owner: owner.to_string(),
        repo: repo.to_string(),
        git_ref: caps.get(3).map(|m| m.as_str().to_string()),
        subpath: caps.get(4).map(|m| m.as_str().to_string()),
    })
}

/// Outcome of checking a repository listing for connector files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Check that a file listing looks like a connector: an entry point and a README.
pub fn validate_repository<S: AsRef<str>>(files: &[S]) -> RepoValidation {
    let mut errors = Vec::new();
    let has = |name: &str| files.iter().any(|f| f.as_ref() == name);

    if !has("package.json") && !has("index.js") && !has("pyproject.toml") {
        errors.push("Repository must contain package.json, index.js or pyproject.toml".to_string());
    }

    if !files
        .iter()
        .any(|f| f.as_ref().to_ascii_lowercase().contains("readme"))
    {
        errors.push("Repository should include a README file".to_string());
    }

    RepoValidation {
        valid: errors.is_empty(),
        errors,
    }
}
