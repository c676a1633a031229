//! # Repository Records
//!
//! A `Repo` describes one repository's local and remote state. It is created
//! by one of the pipeline's input adapters with whatever the input already
//! knows, filled in by the filter stage (remote branch and revision, local
//! revision, remote URLs), and never changed after it is handed to the
//! presentation stage.
//!
//! The `root` is the repository's identity: the import-path-style string for
//! the top of the repository. Two records with the same root are the same
//! repository.
//!
//! How the repository is reached is captured by `RepoVcs`: either a local
//! checkout with a `LocalVcs` handle, or a remote-only repository with a
//! `RemoteVcs` handle and the URL to query. Exactly one of the two always
//! exists.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::vcs::{LocalVcs, RemoteVcs, VcsKind};

/// Local state of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    /// The remote URL as configured in the checkout (or declared by a
    /// subrepo), including scheme. Empty when unknown.
    pub remote_url: String,
    /// The local revision. Empty until resolved.
    pub revision: String,
}

/// Remote state of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteState {
    /// The repository URL, including scheme, as determined dynamically from
    /// the root.
    pub repo_url: String,
    /// Default branch, as reported by the remote.
    pub branch: String,
    pub revision: String,
}

/// How the pipeline reaches a repository's version-control state.
#[derive(Clone)]
pub enum RepoVcs {
    /// A checkout on disk.
    Local {
        path: PathBuf,
        kind: VcsKind,
        vcs: Arc<dyn LocalVcs>,
    },
    /// A repository known only by URL.
    Remote { url: String, vcs: Arc<dyn RemoteVcs> },
}

impl fmt::Debug for RepoVcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoVcs::Local { path, kind, .. } => f
                .debug_struct("Local")
                .field("path", path)
                .field("kind", kind)
                .finish_non_exhaustive(),
            RepoVcs::Remote { url, .. } => f
                .debug_struct("Remote")
                .field("url", url)
                .finish_non_exhaustive(),
        }
    }
}

/// The state of a single repository.
#[derive(Debug, Clone)]
pub struct Repo {
    /// The import path corresponding to the root of the repository.
    pub root: String,
    pub vcs: RepoVcs,
    pub local: LocalState,
    pub remote: RemoteState,
}

impl Repo {
    /// A record for a checkout on disk.
    pub fn local(
        root: impl Into<String>,
        path: impl Into<PathBuf>,
        kind: VcsKind,
        vcs: Arc<dyn LocalVcs>,
    ) -> Self {
        Self {
            root: root.into(),
            vcs: RepoVcs::Local {
                path: path.into(),
                kind,
                vcs,
            },
            local: LocalState::default(),
            remote: RemoteState::default(),
        }
    }

    /// A record for a repository known only by URL.
    pub fn remote(root: impl Into<String>, url: impl Into<String>, vcs: Arc<dyn RemoteVcs>) -> Self {
        Self {
            root: root.into(),
            vcs: RepoVcs::Remote {
                url: url.into(),
                vcs,
            },
            local: LocalState::default(),
            remote: RemoteState::default(),
        }
    }

    /// The local working-tree path, if this is a checkout on disk.
    pub fn path(&self) -> Option<&Path> {
        match &self.vcs {
            RepoVcs::Local { path, .. } => Some(path),
            RepoVcs::Remote { .. } => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.vcs, RepoVcs::Local { .. })
    }

    /// A pattern matching every package under this repository, e.g.
    /// `github.com/owner/repo/...`.
    pub fn import_path_pattern(&self) -> String {
        format!("{}/...", self.root)
    }
}

/// An already-resolved local repository, submitted via `Pipeline::add_repository`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepo {
    /// Local filesystem path to the checkout.
    pub path: PathBuf,
    /// Import path corresponding to the root of the repository.
    pub root: String,
    pub vcs: VcsKind,
}

/// A "virtual" repository nested inside a larger physical repository,
/// submitted via `Pipeline::add_subrepo`.
#[derive(Clone)]
pub struct Subrepo {
    pub root: String,
    /// Answers remote state queries for the subrepo.
    pub remote_vcs: Arc<dyn RemoteVcs>,
    /// The remote URL, including scheme.
    pub remote_url: String,
    /// The pinned revision.
    pub revision: String,
}

impl fmt::Debug for Subrepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subrepo")
            .field("root", &self.root)
            .field("remote_url", &self.remote_url)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}
