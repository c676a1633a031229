//! # Version-Control Capabilities
//!
//! The pipeline never talks to a version-control system directly. It asks
//! capability handles, obtained from a `VcsProvider`, a handful of questions:
//!
//! - **`LocalVcs`**: for a checkout on disk, what branch is checked out, is
//!   the working tree dirty, what is the configured remote, what revision does
//!   a branch point at, what is the remote's default branch and head, and does
//!   the local branch already contain a given revision.
//! - **`RemoteVcs`**: for a repository known only by URL, what is its default
//!   branch and head revision.
//!
//! The traits are object safe and `Send + Sync` so handles can be shared by
//! every worker of a stage. The `git` module provides the system
//! implementation; tests provide in-memory ones.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cancel::Cancellation;
use crate::error::{Error, Result};

/// A version-control system, as detected from a checkout or declared by a
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Hg,
    Bzr,
    Svn,
}

impl VcsKind {
    /// All kinds, in the order checkouts are probed.
    pub const ALL: [VcsKind; 4] = [VcsKind::Git, VcsKind::Hg, VcsKind::Bzr, VcsKind::Svn];

    /// The command name of the version-control tool.
    pub fn name(self) -> &'static str {
        match self {
            VcsKind::Git => "git",
            VcsKind::Hg => "hg",
            VcsKind::Bzr => "bzr",
            VcsKind::Svn => "svn",
        }
    }

    /// The metadata directory that marks the root of a checkout.
    pub fn metadata_dir(self) -> &'static str {
        match self {
            VcsKind::Git => ".git",
            VcsKind::Hg => ".hg",
            VcsKind::Bzr => ".bzr",
            VcsKind::Svn => ".svn",
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VcsKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        VcsKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::UnsupportedVcs { vcs: s.to_string() })
    }
}

/// The default branch of a remote and the revision it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHead {
    pub branch: String,
    pub revision: String,
}

/// Questions about a local checkout.
pub trait LocalVcs: Send + Sync {
    /// The currently checked-out branch.
    fn branch(&self, dir: &Path) -> Result<String>;

    /// A description of uncommitted changes; empty when the tree is clean.
    fn status(&self, dir: &Path) -> Result<String>;

    /// The URL of the configured default remote.
    fn remote_url(&self, dir: &Path) -> Result<String>;

    /// The revision `default_branch` points at locally.
    fn local_revision(&self, dir: &Path, default_branch: &str) -> Result<String>;

    /// The default branch and head revision of the configured remote.
    ///
    /// This is a network operation and should stop early when `cancel` fires.
    fn remote_branch_and_revision(&self, dir: &Path, cancel: &Cancellation) -> Result<RemoteHead>;

    /// Whether local `branch` already contains `revision`.
    fn contains(&self, dir: &Path, revision: &str, branch: &str) -> Result<bool>;
}

/// Questions about a repository known only by its URL.
pub trait RemoteVcs: Send + Sync {
    /// The default branch and head revision of the repository at `url`.
    fn remote_branch_and_revision(&self, url: &str, cancel: &Cancellation) -> Result<RemoteHead>;
}

/// Hands out capability handles for a version-control system.
///
/// Returns `Error::UnsupportedVcs` for kinds it has no backend for.
pub trait VcsProvider: Send + Sync {
    fn local(&self, kind: VcsKind) -> Result<Arc<dyn LocalVcs>>;
    fn remote(&self, kind: VcsKind) -> Result<Arc<dyn RemoteVcs>>;
}

/// Reports whether two repository URLs refer to the same repository.
///
/// The comparison ignores the scheme (`https`, `http`, `git`, `ssh`, scp-like
/// `user@host:path`), user info, a trailing `/` and a trailing `.git`, and
/// compares hosts case-insensitively. URLs that cannot be parsed are compared
/// literally.
pub fn equal_repo_urls(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (normalize_repo_url(a), normalize_repo_url(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Reduces a repository URL to `(host, path)` for comparison.
fn normalize_repo_url(raw: &str) -> Option<(String, String)> {
    let raw = raw.trim();
    let (host, path) = if raw.contains("://") {
        let url = Url::parse(raw).ok()?;
        let mut host = url.host_str()?.to_ascii_lowercase();
        if let Some(port) = url.port() {
            // Standard ports for the scheme are already dropped by `url`.
            host = format!("{}:{}", host, port);
        }
        (host, url.path().to_string())
    } else {
        // scp-like syntax: [user@]host:path
        let (authority, path) = raw.split_once(':')?;
        let host = authority.rsplit('@').next()?.to_ascii_lowercase();
        if host.is_empty() || host.contains('/') {
            return None;
        }
        (host, path.to_string())
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let path = path.trim_start_matches('/');
    Some((host, path.to_string()))
}
