//! # Presentations
//!
//! A `Presentation` is the rendering-ready summary of a pending update: where
//! the project lives, an avatar, the changes that would be pulled (most
//! recent first), and an optional error when the presenter could only gather
//! part of the information.
//!
//! Presentations are produced by `Presenter`s, typically backed by a forge
//! API. The `PresenterRegistry` holds presenters in priority order and the
//! first one that returns `Some` wins. When none does, the pipeline uses
//! `Presentation::generic`.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::cancel::Cancellation;
use crate::defaults::DEFAULT_IMAGE_URL;
use crate::repo::Repo;

/// Discussion attached to a change. A count of zero means there is no
/// discussion to link to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Comments {
    pub count: u32,
    pub url: String,
}

/// A single change that an update would bring in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Change {
    /// Commit message, first paragraph only.
    pub message: String,
    /// Canonical URL of the change.
    pub url: String,
    pub comments: Comments,
}

/// Presentation of a repository update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Presentation {
    pub home_url: String,
    pub image_url: String,
    /// Most recent first.
    pub changes: Vec<Change>,
    /// Partial failure encountered while building the presentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Presentation {
    /// The fallback used when no presenter recognises a repository.
    pub fn generic(root: &str, image_url: &str) -> Self {
        Self {
            home_url: format!("https://{}", root),
            image_url: if image_url.is_empty() {
                DEFAULT_IMAGE_URL.to_string()
            } else {
                image_url.to_string()
            },
            changes: Vec::new(),
            error: None,
        }
    }

    /// Truncates every change message to its first paragraph.
    pub fn normalized(mut self) -> Self {
        for change in &mut self.changes {
            let first = first_paragraph(&change.message);
            if first.len() != change.message.len() {
                change.message = first.to_string();
            }
        }
        self
    }
}

/// Returns the text before the first blank line.
pub fn first_paragraph(s: &str) -> &str {
    match s.split_once("\n\n") {
        Some((first, _)) => first,
        None => s,
    }
}

/// Produces presentations for repositories it recognises.
///
/// Presenters are consulted in registration order; returning `None` passes
/// the repository on to the next one. `cancel` fires when the pipeline is
/// shutting down, so long-running API calls can stop early.
pub trait Presenter: Send + Sync {
    fn present(&self, repo: &Repo, cancel: &Cancellation) -> Option<Presentation>;
}

impl<F> Presenter for F
where
    F: Fn(&Repo) -> Option<Presentation> + Send + Sync,
{
    fn present(&self, repo: &Repo, _cancel: &Cancellation) -> Option<Presentation> {
        self(repo)
    }
}

/// Presenters in priority order.
///
/// Built by the caller and handed to `Pipeline::new`; there is no global
/// registration.
#[derive(Clone, Default)]
pub struct PresenterRegistry {
    presenters: Vec<Arc<dyn Presenter>>,
}

impl PresenterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a presenter with lower priority than every presenter already
    /// registered.
    pub fn register<P: Presenter + 'static>(&mut self, presenter: P) -> &mut Self {
        self.presenters.push(Arc::new(presenter));
        self
    }

    pub fn len(&self) -> usize {
        self.presenters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presenters.is_empty()
    }

    /// The presentation from the first presenter, in registration order,
    /// that recognises `repo`.
    ///
    /// With `parallel` set, presenters run concurrently on the rayon pool,
    /// but a later presenter still never wins over an earlier one.
    pub fn present(&self, repo: &Repo, cancel: &Cancellation, parallel: bool) -> Option<Presentation> {
        if parallel && self.presenters.len() > 1 {
            self.presenters
                .par_iter()
                .find_map_first(|p| p.present(repo, cancel))
        } else {
            self.presenters.iter().find_map(|p| p.present(repo, cancel))
        }
    }

    /// Like `present`, falling back to `Presentation::generic`. Change
    /// messages are always truncated to their first paragraph.
    pub fn present_or_generic(
        &self,
        repo: &Repo,
        cancel: &Cancellation,
        parallel: bool,
        image_url: &str,
    ) -> Presentation {
        self.present(repo, cancel, parallel)
            .unwrap_or_else(|| Presentation::generic(&repo.root, image_url))
            .normalized()
    }
}

impl fmt::Debug for PresenterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenterRegistry")
            .field("presenters", &self.presenters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::vcs::{RemoteHead, RemoteVcs};
    use std::thread;
    use std::time::Duration;

    struct Unreachable;

    impl RemoteVcs for Unreachable {
        fn remote_branch_and_revision(&self, _: &str, _: &Cancellation) -> Result<RemoteHead> {
            Err(crate::error::Error::Cancelled)
        }
    }

    fn repo(root: &str) -> Repo {
        Repo::remote(root, format!("https://{}", root), Arc::new(Unreachable))
    }

    fn presentation(home: &str) -> Presentation {
        Presentation {
            home_url: home.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_paragraph() {
        assert_eq!(first_paragraph("line one\n\nline two"), "line one");
        assert_eq!(first_paragraph("single line"), "single line");
        assert_eq!(first_paragraph("title\nbody\n\nmore"), "title\nbody");
        assert_eq!(first_paragraph(""), "");
    }

    #[test]
    fn test_generic_presentation() {
        let p = Presentation::generic("example.com/foo", "");
        assert_eq!(p.home_url, "https://example.com/foo");
        assert_eq!(p.image_url, DEFAULT_IMAGE_URL);
        assert!(p.changes.is_empty());
        assert!(p.error.is_none());
    }

    #[test]
    fn test_generic_presentation_custom_image() {
        let p = Presentation::generic("example.com/foo", "https://img.example/x.png");
        assert_eq!(p.image_url, "https://img.example/x.png");
    }

    #[test]
    fn test_normalized_truncates_messages() {
        let p = Presentation {
            changes: vec![Change {
                message: "Fix bug\n\nLong explanation.".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
        .normalized();
        assert_eq!(p.changes[0].message, "Fix bug");
    }

    #[test]
    fn test_registry_first_match_wins() {
        let mut registry = PresenterRegistry::new();
        registry
            .register(|r: &Repo| (r.root == "skip.example").then(|| presentation("never")))
            .register(|_: &Repo| Some(presentation("first")))
            .register(|_: &Repo| Some(presentation("second")));

        let cancel = Cancellation::new();
        let p = registry.present(&repo("example.com/foo"), &cancel, false).unwrap();
        assert_eq!(p.home_url, "first");
    }

    #[test]
    fn test_registry_parallel_honours_registration_order() {
        let mut registry = PresenterRegistry::new();
        registry
            .register(|_: &Repo| {
                thread::sleep(Duration::from_millis(50));
                Some(presentation("slow but first"))
            })
            .register(|_: &Repo| Some(presentation("fast")));

        let cancel = Cancellation::new();
        let p = registry.present(&repo("example.com/foo"), &cancel, true).unwrap();
        assert_eq!(p.home_url, "slow but first");
    }

    #[test]
    fn test_registry_no_match_falls_back() {
        let mut registry = PresenterRegistry::new();
        registry.register(|_: &Repo| None);
        assert_eq!(registry.len(), 1);

        let cancel = Cancellation::new();
        let p = registry.present_or_generic(&repo("example.com/foo"), &cancel, false, "");
        assert_eq!(p.home_url, "https://example.com/foo");
        assert!(p.changes.is_empty());
    }

    #[test]
    fn test_presentation_json_omits_missing_error() {
        let json = serde_json::to_string(&presentation("https://x")).unwrap();
        assert!(!json.contains("error"));
        assert!(json.contains("\"home_url\":\"https://x\""));
    }
}
