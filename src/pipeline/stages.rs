//! Stages 2 and 3: filter/enrichment and presentation, plus the worker loop
//! every stage runs.

use std::sync::Arc;

use crossbeam_channel as chan;
use log::{debug, info, warn};

use crate::cancel::{forward, Cancellation};
use crate::error::{Error, Result};
use crate::pipeline::results::RepoPresentation;
use crate::policy::{should_present_update, Verdict};
use crate::presentation::PresenterRegistry;
use crate::repo::{Repo, RepoVcs};
use crate::resolve::Resolver;
use crate::vcs::RemoteHead;

/// Drains `input`, forwarding whatever `process` returns to `output`.
///
/// Stops when `input` disconnects, `output` has no receivers left, or
/// `cancel` fires. Dropping `output` on return is what lets the next stage
/// see the end of its input once every worker of this stage has exited.
pub(crate) fn run_worker<I, O, F>(
    input: chan::Receiver<I>,
    output: chan::Sender<O>,
    cancel: Cancellation,
    mut process: F,
) where
    F: FnMut(I, &Cancellation) -> Option<O>,
{
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let item = chan::select! {
            recv(input) -> msg => match msg {
                Ok(item) => item,
                Err(_) => break,
            },
            recv(cancel.signal()) -> _ => break,
        };
        if let Some(out) = process(item, &cancel) {
            if !forward(&output, out, &cancel) {
                break;
            }
        }
    }
}

/// Determines remote (and missing local) state and applies the
/// presentation policy.
pub(crate) struct Filter {
    resolver: Arc<dyn Resolver>,
}

impl Filter {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Returns the enriched repository if it should be presented.
    pub fn process(&self, mut repo: Repo, cancel: &Cancellation) -> Option<Repo> {
        if let Err(e) = self.enrich(&mut repo, cancel) {
            match e {
                Error::Cancelled => debug!("stopped querying {} on cancellation", repo.root),
                e => warn!("skipping {:?} because of remote error:\n\t{}", repo.root, e),
            }
            return None;
        }

        match should_present_update(&repo) {
            Verdict::Present => Some(repo),
            Verdict::UpToDate => {
                debug!("{} is up to date", repo.root);
                None
            }
            Verdict::Skip(reason) => {
                info!("skipping {:?} because:\n\t{}", repo.root, reason);
                None
            }
        }
    }

    /// Fills in remote branch and revision, and for local checkouts the local
    /// revision, configured remote URL and derived repository URL.
    fn enrich(&self, repo: &mut Repo, cancel: &Cancellation) -> Result<()> {
        match &repo.vcs {
            RepoVcs::Local { path, vcs, .. } => {
                let RemoteHead { branch, revision } = vcs.remote_branch_and_revision(path, cancel)?;

                if repo.local.revision.is_empty() {
                    if let Ok(local_revision) = vcs.local_revision(path, &branch) {
                        repo.local.revision = local_revision;
                    }
                }
                if let Ok(remote_url) = vcs.remote_url(path) {
                    repo.local.remote_url = remote_url;
                }
                if let Ok(repo_root) = self.resolver.repo_root(&repo.root) {
                    repo.remote.repo_url = repo_root.repo_url;
                }
                repo.remote.branch = branch;
                repo.remote.revision = revision;
            }
            RepoVcs::Remote { url, vcs } => {
                let head = vcs.remote_branch_and_revision(url, cancel)?;
                repo.remote.branch = head.branch;
                repo.remote.revision = head.revision;
            }
        }
        Ok(())
    }
}

/// Attaches a presentation to every repository that passed the filter.
pub(crate) struct Present {
    registry: PresenterRegistry,
    parallel: bool,
    image_url: String,
}

impl Present {
    pub fn new(registry: PresenterRegistry, parallel: bool, image_url: String) -> Self {
        Self {
            registry,
            parallel,
            image_url,
        }
    }

    pub fn process(&self, repo: Repo, cancel: &Cancellation) -> RepoPresentation {
        let presentation =
            self.registry
                .present_or_generic(&repo, cancel, self.parallel, &self.image_url);
        if let Some(error) = &presentation.error {
            debug!("presentation of {} is partial: {}", repo.root, error);
        }
        RepoPresentation::new(repo, presentation)
    }
}
