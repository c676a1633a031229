//! # Import Path Resolution
//!
//! Input adapters receive import paths (`github.com/owner/repo/sub/pkg`) and
//! need to turn them into repositories. The `Resolver` trait answers the three
//! questions involved:
//!
//! - **`import`**: where does this package live on disk, and is it part of
//!   the standard library?
//! - **`vcs_root`**: which version-control checkout encloses a package
//!   directory, and what is the import path of its root?
//! - **`repo_root`**: without touching the disk, what repository root,
//!   repository URL and version-control system does an import path map to?
//!
//! `WorkspaceResolver` implements these for GOPATH-style workspaces, where
//! packages live under `<workspace>/src/<import path>`, with a static table
//! of well-known hosting sites for `repo_root`.

use std::path::{Component, Path, PathBuf};

use regex::Regex;

use crate::error::{Error, Result};
use crate::vcs::VcsKind;

/// A package located on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub import_path: String,
    /// Directory containing the package.
    pub dir: PathBuf,
    /// The `src` directory of the workspace the package was found in.
    pub src_root: PathBuf,
    /// Whether the package belongs to the standard library.
    pub std_lib: bool,
}

/// The version-control checkout enclosing a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsRoot {
    pub kind: VcsKind,
    /// Import path of the checkout root.
    pub root: String,
    /// Directory of the checkout root.
    pub dir: PathBuf,
}

/// A repository root determined from an import path alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRoot {
    pub root: String,
    /// Repository URL, including scheme.
    pub repo_url: String,
    pub vcs: VcsKind,
}

/// Resolves import paths to packages and repositories.
pub trait Resolver: Send + Sync {
    /// Locates the package with the given import path on disk.
    fn import(&self, import_path: &str) -> Result<Package>;

    /// Finds the checkout enclosing `dir`, which must lie under `src_root`.
    fn vcs_root(&self, dir: &Path, src_root: &Path) -> Result<VcsRoot> {
        find_vcs_root(dir, src_root)
    }

    /// Determines the repository root for an import path without requiring
    /// the package to be present on disk.
    fn repo_root(&self, import_path: &str) -> Result<RepoRoot>;
}

/// Walks up from `dir` to (but not including) `src_root` looking for a
/// version-control metadata directory.
pub fn find_vcs_root(dir: &Path, src_root: &Path) -> Result<VcsRoot> {
    let not_under_vcs = || Error::NotUnderVcs {
        dir: dir.display().to_string(),
    };
    if !dir.starts_with(src_root) {
        return Err(not_under_vcs());
    }

    let mut current = dir;
    while current != src_root {
        for kind in VcsKind::ALL {
            if current.join(kind.metadata_dir()).is_dir() {
                let root = import_path_of(current, src_root).ok_or_else(not_under_vcs)?;
                return Ok(VcsRoot {
                    kind,
                    root,
                    dir: current.to_path_buf(),
                });
            }
        }
        current = match current.parent() {
            Some(parent) => parent,
            None => break,
        };
    }
    Err(not_under_vcs())
}

/// The slash-separated import path of `dir` relative to `src_root`.
fn import_path_of(dir: &Path, src_root: &Path) -> Option<String> {
    let relative = dir.strip_prefix(src_root).ok()?;
    let parts = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str().map(str::to_string),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// A well-known hosting site and how its import paths map to repositories.
struct Host {
    pattern: Regex,
    vcs: VcsKind,
    /// Builds the repository URL from the matched root.
    repo_url: fn(&regex::Captures<'_>) -> String,
}

/// Resolver for GOPATH-style workspaces.
pub struct WorkspaceResolver {
    wd: PathBuf,
    goroot: Option<PathBuf>,
    workspaces: Vec<PathBuf>,
    hosts: Vec<Host>,
}

impl WorkspaceResolver {
    /// Creates a resolver.
    ///
    /// - `wd` resolves relative import paths (`./pkg`, `../pkg`).
    /// - `goroot`, when set, is searched first; packages found there are
    ///   reported as standard library.
    /// - `workspaces` are searched in order for `src/<import path>`.
    pub fn new(wd: PathBuf, goroot: Option<PathBuf>, workspaces: Vec<PathBuf>) -> Result<Self> {
        let hosts = vec![
            Host {
                pattern: Regex::new(
                    r"^(?P<root>(?:github\.com|bitbucket\.org|gitlab\.com)/[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+)(?:/.*)?$",
                )?,
                vcs: VcsKind::Git,
                repo_url: |c| format!("https://{}", &c["root"]),
            },
            Host {
                pattern: Regex::new(r"^(?P<root>golang\.org/x/(?P<name>[A-Za-z0-9_.\-]+))(?:/.*)?$")?,
                vcs: VcsKind::Git,
                repo_url: |c| format!("https://go.googlesource.com/{}", &c["name"]),
            },
            Host {
                pattern: Regex::new(
                    r"^(?P<root>gopkg\.in/(?:[A-Za-z0-9_\-]+/)?[A-Za-z0-9_\-.]+\.v[0-9]+)(?:/.*)?$",
                )?,
                vcs: VcsKind::Git,
                repo_url: |c| format!("https://{}", &c["root"]),
            },
            Host {
                pattern: Regex::new(
                    r"^(?P<root>[A-Za-z0-9.\-]+\.[A-Za-z]+(?::[0-9]+)?/[A-Za-z0-9_.\-/]*?\.git)(?:/.*)?$",
                )?,
                vcs: VcsKind::Git,
                repo_url: |c| format!("https://{}", &c["root"]),
            },
            Host {
                pattern: Regex::new(
                    r"^(?P<root>[A-Za-z0-9.\-]+\.[A-Za-z]+(?::[0-9]+)?/[A-Za-z0-9_.\-/]*?\.hg)(?:/.*)?$",
                )?,
                vcs: VcsKind::Hg,
                repo_url: |c| format!("https://{}", &c["root"]),
            },
            Host {
                pattern: Regex::new(
                    r"^(?P<root>[A-Za-z0-9.\-]+\.[A-Za-z]+(?::[0-9]+)?/[A-Za-z0-9_.\-/]*?\.bzr)(?:/.*)?$",
                )?,
                vcs: VcsKind::Bzr,
                repo_url: |c| format!("https://{}", &c["root"]),
            },
            Host {
                pattern: Regex::new(
                    r"^(?P<root>[A-Za-z0-9.\-]+\.[A-Za-z]+(?::[0-9]+)?/[A-Za-z0-9_.\-/]*?\.svn)(?:/.*)?$",
                )?,
                vcs: VcsKind::Svn,
                repo_url: |c| format!("https://{}", &c["root"]),
            },
        ];

        Ok(Self {
            wd,
            goroot,
            workspaces,
            hosts,
        })
    }

    fn resolve_error(import_path: &str, message: impl Into<String>) -> Error {
        Error::Resolve {
            import_path: import_path.to_string(),
            message: message.into(),
        }
    }

    /// Resolves a relative import path against the working directory.
    fn import_relative(&self, import_path: &str) -> Result<Package> {
        let dir = self.wd.join(import_path);
        if !dir.is_dir() {
            return Err(Self::resolve_error(import_path, "directory does not exist"));
        }
        let dir = dir.canonicalize()?;

        for (src_root, std_lib) in self.src_roots() {
            let src_root = match src_root.canonicalize() {
                Ok(root) => root,
                Err(_) => continue,
            };
            if let Some(resolved) = import_path_of(&dir, &src_root) {
                return Ok(Package {
                    import_path: resolved,
                    dir,
                    src_root,
                    std_lib,
                });
            }
        }
        Err(Self::resolve_error(
            import_path,
            "directory is outside every workspace",
        ))
    }

    /// `src` directories to search, with whether they hold the standard library.
    fn src_roots(&self) -> impl Iterator<Item = (PathBuf, bool)> + '_ {
        self.goroot
            .iter()
            .map(|root| (root.join("src"), true))
            .chain(self.workspaces.iter().map(|ws| (ws.join("src"), false)))
    }
}

impl Resolver for WorkspaceResolver {
    fn import(&self, import_path: &str) -> Result<Package> {
        if import_path.starts_with("./") || import_path.starts_with("../") || import_path == "." {
            return self.import_relative(import_path);
        }
        if import_path.is_empty() || Path::new(import_path).is_absolute() {
            return Err(Self::resolve_error(import_path, "invalid import path"));
        }

        for (src_root, std_lib) in self.src_roots() {
            let dir = src_root.join(import_path);
            if dir.is_dir() {
                return Ok(Package {
                    import_path: import_path.to_string(),
                    dir,
                    src_root,
                    std_lib,
                });
            }
        }
        Err(Self::resolve_error(
            import_path,
            "cannot find package in any workspace",
        ))
    }

    fn repo_root(&self, import_path: &str) -> Result<RepoRoot> {
        for host in &self.hosts {
            if let Some(captures) = host.pattern.captures(import_path) {
                return Ok(RepoRoot {
                    root: captures["root"].to_string(),
                    repo_url: (host.repo_url)(&captures),
                    vcs: host.vcs,
                });
            }
        }
        Err(Self::resolve_error(
            import_path,
            "unrecognized import path (no known hosting site matches)",
        ))
    }
}
