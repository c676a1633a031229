//! # Package Store Library
//!
//! This library finds repositories that provide third-party packages,
//! determines which of them have a newer revision upstream, and presents the
//! pending changes. It is designed to be used by the `package-store`
//! command-line tool but can also be embedded in other front ends, which
//! observe results as a live, stably ordered stream.
//!
//! ## Quick Example
//!
//! ```
//! use package_store::presentation::{first_paragraph, Presentation};
//! use package_store::config::PipelineConfig;
//!
//! // Repositories no presenter recognises get a generic presentation
//! let p = Presentation::generic("example.com/foo", "");
//! assert_eq!(p.home_url, "https://example.com/foo");
//! assert!(p.changes.is_empty());
//!
//! // Only the first paragraph of a commit message is kept
//! assert_eq!(first_paragraph("Fix bug\n\nDetails."), "Fix bug");
//!
//! // Parse a configuration
//! let config = PipelineConfig::parse("workers: 4\n").unwrap();
//! assert_eq!(config.workers, 4);
//! ```
//!
//! ## Core Concepts
//!
//! - **Repository records (`repo`)**: One repository's identity (its root),
//!   local state and remote state.
//! - **Version control (`vcs`, `git`)**: Capability traits the pipeline asks
//!   about branches, revisions and working-tree state, with a system `git`
//!   implementation.
//! - **Resolution (`resolve`)**: Maps import paths to packages on disk and
//!   to repository roots and URLs.
//! - **Presentations (`presentation`, `policy`)**: Decides whether an update
//!   is worth showing and describes it.
//! - **Pipeline (`pipeline`)**: The concurrent stages and the orchestrator
//!   that owns the ordered results.
//! - **Updates (`update`)**: Runs caller-supplied updaters one at a time.
//!
//! ## Execution Flow
//!
//! 1.  **Intake**: Input adapters turn import paths, pinned revisions, local
//!     checkouts and subrepos into repository records, one per root.
//! 2.  **Filter**: Remote state is queried and the presentation policy drops
//!     repositories that are up to date or in an unexpected state.
//! 3.  **Present**: Registered presenters describe each update.
//! 4.  **Collect**: The orchestrator appends results in completion order and
//!     streams them to every observer.

pub mod cancel;
pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod output;
pub mod pipeline;
pub mod policy;
pub mod presentation;
pub mod pseudo_version;
pub mod repo;
pub mod resolve;
pub mod update;
pub mod vcs;

#[cfg(test)]
mod results_proptest;
