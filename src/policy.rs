//! Decides whether an enriched repository has an update worth presenting.

use crate::repo::{Repo, RepoVcs};
use crate::vcs::equal_repo_urls;

/// Outcome of `should_present_update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// An update is available and the repository looks normal.
    Present,
    /// Already up to date. Not worth mentioning.
    UpToDate,
    /// Not presentable, for the given reason.
    Skip(String),
}

impl Verdict {
    pub fn is_present(&self) -> bool {
        matches!(self, Verdict::Present)
    }

    /// The reason a repository was skipped, if there is one worth logging.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Skip(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Reports whether `repo` should be presented as an available update.
///
/// A local checkout must be on the remote's default branch, have a clean
/// working tree, point at the repository its root resolves to, and not
/// already contain the remote revision. A remote-only repository only needs
/// its declared remote URL, when it has one, to match.
///
/// The verdict depends only on the record's fields and the answers of its
/// version-control handle.
pub fn should_present_update(repo: &Repo) -> Verdict {
    if repo.remote.repo_url.is_empty() {
        return Verdict::Skip(
            "repository URL (as determined dynamically from the import path) is empty".to_string(),
        );
    }
    if repo.local.revision.is_empty() {
        return Verdict::Skip("local revision is empty".to_string());
    }
    if repo.remote.revision.is_empty() {
        return Verdict::Skip("remote revision is empty".to_string());
    }

    if repo.local.revision == repo.remote.revision {
        return Verdict::UpToDate;
    }

    match &repo.vcs {
        RepoVcs::Local { path, vcs, .. } => {
            let local_branch = match vcs.branch(path) {
                Ok(branch) => branch,
                Err(e) => return Verdict::Skip(format!("error determining local branch:\n{}", e)),
            };
            if local_branch != repo.remote.branch {
                return Verdict::Skip(format!(
                    "local branch {:?} doesn't match remote branch {:?}",
                    local_branch, repo.remote.branch
                ));
            }

            let tree_status = match vcs.status(path) {
                Ok(status) => status,
                Err(e) => {
                    return Verdict::Skip(format!(
                        "error determining if working tree is dirty:\n{}",
                        e
                    ))
                }
            };
            if !tree_status.is_empty() {
                return Verdict::Skip(format!("working tree is dirty:\n{}", tree_status));
            }

            if !equal_repo_urls(&repo.local.remote_url, &repo.remote.repo_url) {
                return Verdict::Skip(url_mismatch(repo));
            }

            match vcs.contains(path, &repo.remote.revision, &repo.remote.branch) {
                Err(e) => Verdict::Skip(format!(
                    "error determining if local commit is contained by remote:\n{}",
                    e
                )),
                // Local work that hasn't been pushed yet; nothing to pull.
                Ok(true) => Verdict::Skip(format!(
                    "local revision {:?} is ahead of remote revision {:?}",
                    repo.local.revision, repo.remote.revision
                )),
                Ok(false) => Verdict::Present,
            }
        }
        RepoVcs::Remote { .. } => {
            if !repo.local.remote_url.is_empty()
                && !equal_repo_urls(&repo.local.remote_url, &repo.remote.repo_url)
            {
                return Verdict::Skip(url_mismatch(repo));
            }
            Verdict::Present
        }
    }
}

fn url_mismatch(repo: &Repo) -> String {
    format!(
        "remote URL ({}) doesn't match repo URL inferred from import path ({})",
        repo.local.remote_url, repo.remote.repo_url
    )
}
