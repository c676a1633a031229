//! Shared test utilities for integration and E2E tests.
//!
//! This module provides in-memory stand-ins for the pipeline's backends so
//! the full pipeline can run without touching the network or a real
//! workspace.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let world = World::new().with_remote("https://example.com/foo", "main", "def456");
//!     let pipeline = world.pipeline(PresenterRegistry::new());
//!     // ... test code
//! }
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use package_store::cancel::Cancellation;
use package_store::config::PipelineConfig;
use package_store::error::{Error, Result};
use package_store::pipeline::{Backends, Pipeline, RepoPresentation};
use package_store::presentation::PresenterRegistry;
use package_store::resolve::{Package, RepoRoot, Resolver, VcsRoot};
use package_store::vcs::{LocalVcs, RemoteHead, RemoteVcs, VcsKind, VcsProvider};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    pub use super::{collect, roots, Checkout, World};
}

/// Workspace `src` directory used for simulated checkouts.
pub const SRC_ROOT: &str = "/workspace/src";

/// State of a simulated checkout on disk.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub branch: String,
    pub status: String,
    pub remote_url: String,
    pub local_revision: String,
    pub remote: RemoteHead,
    /// Whether the local branch already contains the remote head.
    pub ahead: bool,
}

impl Checkout {
    /// A clean checkout of `root` on `main` that is behind its remote.
    pub fn behind(root: &str, local_revision: &str, remote_revision: &str) -> Self {
        Self {
            branch: "main".to_string(),
            status: String::new(),
            remote_url: format!("https://{}.git", root),
            local_revision: local_revision.to_string(),
            remote: RemoteHead {
                branch: "main".to_string(),
                revision: remote_revision.to_string(),
            },
            ahead: false,
        }
    }
}

#[derive(Default)]
struct State {
    /// Import path of a package to the root of the repository containing it.
    packages: HashMap<String, String>,
    checkouts: HashMap<PathBuf, Checkout>,
    remotes: HashMap<String, RemoteHead>,
    remote_calls: Vec<String>,
    delay: Duration,
}

/// An in-memory workspace and set of remotes shared by every backend.
#[derive(Clone, Default)]
pub struct World {
    state: Arc<Mutex<State>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a remote repository whose default branch points at `revision`.
    pub fn with_remote(self, url: &str, branch: &str, revision: &str) -> Self {
        self.state.lock().unwrap().remotes.insert(
            url.to_string(),
            RemoteHead {
                branch: branch.to_string(),
                revision: revision.to_string(),
            },
        );
        self
    }

    /// Adds a checkout of `root` containing the package `import_path`.
    pub fn with_checkout(self, root: &str, import_path: &str, checkout: Checkout) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .packages
                .insert(import_path.to_string(), root.to_string());
            state.checkouts.insert(checkout_dir(root), checkout);
        }
        self
    }

    /// Slows every remote query down by `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = delay;
        self
    }

    /// URLs queried remotely so far, in call order.
    pub fn remote_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().remote_calls.clone()
    }

    pub fn backends(&self, presenters: PresenterRegistry) -> Backends {
        Backends {
            resolver: Arc::new(self.clone()),
            vcs: Arc::new(self.clone()),
            presenters,
        }
    }

    pub fn pipeline(&self, presenters: PresenterRegistry) -> Pipeline {
        self.pipeline_with(&PipelineConfig::default(), presenters)
    }

    pub fn pipeline_with(&self, config: &PipelineConfig, presenters: PresenterRegistry) -> Pipeline {
        Pipeline::new(config, self.backends(presenters)).unwrap()
    }

    fn checkout(&self, dir: &Path) -> Result<Checkout> {
        self.state
            .lock()
            .unwrap()
            .checkouts
            .get(dir)
            .cloned()
            .ok_or_else(|| Error::NotUnderVcs {
                dir: dir.display().to_string(),
            })
    }

    fn query_remote(&self, url: &str, cancel: &Cancellation) -> Result<RemoteHead> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.remote_calls.push(url.to_string());
            state.delay
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.state
            .lock()
            .unwrap()
            .remotes
            .get(url)
            .cloned()
            .ok_or_else(|| Error::GitCommand {
                command: "ls-remote --symref".to_string(),
                target: url.to_string(),
                stderr: "Repository not found".to_string(),
            })
    }
}

/// Directory of the simulated checkout of `root`.
pub fn checkout_dir(root: &str) -> PathBuf {
    Path::new(SRC_ROOT).join(root)
}

/// Roots are the first three path elements, served over https with git.
impl Resolver for World {
    fn import(&self, import_path: &str) -> Result<Package> {
        if !import_path.contains('.') {
            return Ok(Package {
                import_path: import_path.to_string(),
                dir: Path::new("/goroot/src").join(import_path),
                src_root: PathBuf::from("/goroot/src"),
                std_lib: true,
            });
        }
        let state = self.state.lock().unwrap();
        if !state.packages.contains_key(import_path) {
            return Err(Error::Resolve {
                import_path: import_path.to_string(),
                message: "cannot find package".to_string(),
            });
        }
        Ok(Package {
            import_path: import_path.to_string(),
            dir: Path::new(SRC_ROOT).join(import_path),
            src_root: PathBuf::from(SRC_ROOT),
            std_lib: false,
        })
    }

    fn vcs_root(&self, dir: &Path, src_root: &Path) -> Result<VcsRoot> {
        let import_path = dir
            .strip_prefix(src_root)
            .ok()
            .and_then(Path::to_str)
            .unwrap_or_default();
        let state = self.state.lock().unwrap();
        let root = state
            .packages
            .get(import_path)
            .ok_or_else(|| Error::NotUnderVcs {
                dir: dir.display().to_string(),
            })?;
        Ok(VcsRoot {
            kind: VcsKind::Git,
            root: root.clone(),
            dir: checkout_dir(root),
        })
    }

    fn repo_root(&self, import_path: &str) -> Result<RepoRoot> {
        let parts: Vec<&str> = import_path.split('/').collect();
        if parts.len() < 3 {
            return Err(Error::Resolve {
                import_path: import_path.to_string(),
                message: "unrecognized import path".to_string(),
            });
        }
        let root = parts[..3].join("/");
        Ok(RepoRoot {
            repo_url: format!("https://{}", root),
            root,
            vcs: VcsKind::Git,
        })
    }
}

impl LocalVcs for World {
    fn branch(&self, dir: &Path) -> Result<String> {
        Ok(self.checkout(dir)?.branch)
    }

    fn status(&self, dir: &Path) -> Result<String> {
        Ok(self.checkout(dir)?.status)
    }

    fn remote_url(&self, dir: &Path) -> Result<String> {
        Ok(self.checkout(dir)?.remote_url)
    }

    fn local_revision(&self, dir: &Path, _default_branch: &str) -> Result<String> {
        Ok(self.checkout(dir)?.local_revision)
    }

    fn remote_branch_and_revision(&self, dir: &Path, cancel: &Cancellation) -> Result<RemoteHead> {
        let checkout = self.checkout(dir)?;
        let _ = self.query_remote(&checkout.remote_url, cancel);
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(checkout.remote)
    }

    fn contains(&self, dir: &Path, _revision: &str, _branch: &str) -> Result<bool> {
        Ok(self.checkout(dir)?.ahead)
    }
}

impl RemoteVcs for World {
    fn remote_branch_and_revision(&self, url: &str, cancel: &Cancellation) -> Result<RemoteHead> {
        self.query_remote(url, cancel)
    }
}

/// Only git is supported.
impl VcsProvider for World {
    fn local(&self, kind: VcsKind) -> Result<Arc<dyn LocalVcs>> {
        match kind {
            VcsKind::Git => Ok(Arc::new(self.clone())),
            other => Err(Error::UnsupportedVcs {
                vcs: other.to_string(),
            }),
        }
    }

    fn remote(&self, kind: VcsKind) -> Result<Arc<dyn RemoteVcs>> {
        match kind {
            VcsKind::Git => Ok(Arc::new(self.clone())),
            other => Err(Error::UnsupportedVcs {
                vcs: other.to_string(),
            }),
        }
    }
}

/// Drains a fresh observer until the pipeline finishes.
pub fn collect(pipeline: &Pipeline) -> Vec<RepoPresentation> {
    pipeline.repo_presentations().unwrap().iter().collect()
}

pub fn roots(list: &[RepoPresentation]) -> Vec<String> {
    list.iter().map(|rp| rp.root().to_string()).collect()
}
