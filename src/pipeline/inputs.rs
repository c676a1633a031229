//! Stage 1: input adapters.
//!
//! Each adapter turns one kind of input into a `Repo`. The first adapter to
//! see a root claims it; later inputs for the same root are dropped. Failures
//! are logged and the input is skipped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::repo::{LocalRepo, Repo, Subrepo};
use crate::resolve::Resolver;
use crate::vcs::VcsProvider;

/// An import path pinned to a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImportPathRevision {
    pub import_path: String,
    pub revision: String,
}

/// Shared by every stage-1 worker: the collaborators needed to build
/// records, and the set of roots already claimed.
pub(crate) struct Intake {
    resolver: Arc<dyn Resolver>,
    vcs: Arc<dyn VcsProvider>,
    seen: Mutex<HashSet<String>>,
}

impl Intake {
    pub fn new(resolver: Arc<dyn Resolver>, vcs: Arc<dyn VcsProvider>) -> Self {
        Self {
            resolver,
            vcs,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Claims `root`, returning `false` if another input already did.
    fn claim(&self, root: &str) -> bool {
        // The set is only ever inserted into, so a poisoned lock is still usable.
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let fresh = seen.insert(root.to_string());
        if !fresh {
            debug!("{} already queued, ignoring duplicate", root);
        }
        fresh
    }

    /// A package in the workspace, located on disk.
    pub fn from_import_path(&self, import_path: &str) -> Option<Repo> {
        let package = match self.resolver.import(import_path) {
            Ok(package) => package,
            Err(e) => {
                warn!("{}", e);
                return None;
            }
        };
        if package.std_lib {
            debug!("{} is in the standard library, skipping", import_path);
            return None;
        }
        let vcs_root = match self.resolver.vcs_root(&package.dir, &package.src_root) {
            Ok(vcs_root) => vcs_root,
            Err(e) => {
                debug!("{}", e);
                return None;
            }
        };
        let local = match self.vcs.local(vcs_root.kind) {
            Ok(local) => local,
            Err(e) => {
                warn!("repo {} not supported: {}", vcs_root.root, e);
                return None;
            }
        };

        if !self.claim(&vcs_root.root) {
            return None;
        }
        Some(Repo::local(vcs_root.root, vcs_root.dir, vcs_root.kind, local))
    }

    /// A remote repository whose local copy is pinned at a revision.
    pub fn from_revision(&self, input: &ImportPathRevision) -> Option<Repo> {
        let repo_root = match self.resolver.repo_root(&input.import_path) {
            Ok(repo_root) => repo_root,
            Err(e) => {
                warn!(
                    "failed to dynamically determine repo root for {}: {}",
                    input.import_path, e
                );
                return None;
            }
        };
        let remote = match self.vcs.remote(repo_root.vcs) {
            Ok(remote) => remote,
            Err(e) => {
                warn!("repo {} not supported: {}", repo_root.root, e);
                return None;
            }
        };

        if !self.claim(&repo_root.root) {
            return None;
        }
        let mut repo = Repo::remote(repo_root.root, repo_root.repo_url.clone(), remote);
        repo.local.revision = input.revision.clone();
        repo.remote.repo_url = repo_root.repo_url;
        Some(repo)
    }

    /// A local checkout the caller already located.
    pub fn from_local_repo(&self, input: &LocalRepo) -> Option<Repo> {
        let local = match self.vcs.local(input.vcs) {
            Ok(local) => local,
            Err(e) => {
                warn!("repo {} not supported: {}", input.root, e);
                return None;
            }
        };

        if !self.claim(&input.root) {
            return None;
        }
        Some(Repo::local(
            input.root.clone(),
            input.path.clone(),
            input.vcs,
            local,
        ))
    }

    /// A repository nested inside a larger one, with its own remote.
    pub fn from_subrepo(&self, input: &Subrepo) -> Option<Repo> {
        let repo_root = match self.resolver.repo_root(&input.root) {
            Ok(repo_root) => repo_root,
            Err(e) => {
                warn!(
                    "failed to dynamically determine repo root for {}: {}",
                    input.root, e
                );
                return None;
            }
        };

        if !self.claim(&input.root) {
            return None;
        }
        let mut repo = Repo::remote(
            input.root.clone(),
            input.remote_url.clone(),
            Arc::clone(&input.remote_vcs),
        );
        repo.local.remote_url = input.remote_url.clone();
        repo.local.revision = input.revision.clone();
        repo.remote.repo_url = repo_root.repo_url;
        Some(repo)
    }
}
