//! # Error Handling
//!
//! This module defines the centralized error type for the `package-store`
//! library. It uses the `thiserror` library to create an `Error` enum that
//! covers the failure modes callers can observe, with contextual fields that
//! make the rendered message useful on its own.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum that represents all possible errors. Each
//!   variant corresponds to a specific kind of failure and carries the
//!   repository root, import path, or command that produced it.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`, used
//!   throughout the crate.
//!
//! ## What Is Not An Error
//!
//! Per-repository problems inside the pipeline (an import path that cannot be
//! resolved, a remote that cannot be reached, a checkout on the wrong branch)
//! are logged and the repository is dropped. They never reach callers as
//! `Err`. The variants below that describe such problems are produced by the
//! collaborators (`Resolver`, `VcsProvider`, the `git` backend) and consumed
//! by the pipeline stages, which turn them into log lines.

use thiserror::Error;

use crate::pipeline::UpdateState;

/// Main error type for package-store operations
#[derive(Error, Debug)]
pub enum Error {
    /// The pipeline configuration could not be loaded or failed validation.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A version-control command failed.
    ///
    /// `target` is the working directory or remote URL the command ran
    /// against.
    #[error("Git command failed for {target}: {command} - {stderr}")]
    GitCommand {
        command: String,
        target: String,
        stderr: String,
    },

    /// An import path could not be resolved to a package or repository root.
    #[error("Cannot resolve {import_path}: {message}")]
    Resolve {
        import_path: String,
        message: String,
    },

    /// A directory is not inside any recognised version-control checkout.
    #[error("Directory {dir} is not under version control")]
    NotUnderVcs { dir: String },

    /// The version-control system has no backend in this build.
    #[error("Version control system {vcs} is not supported")]
    UnsupportedVcs { vcs: String },

    /// A status transition named a root that has not been presented.
    #[error("Root {root} not found")]
    UnknownRoot { root: String },

    /// A status transition would move a repository backwards or repeat a
    /// completed step.
    #[error("Root {root} cannot move from {from} to {to}")]
    InvalidTransition {
        root: String,
        from: UpdateState,
        to: UpdateState,
    },

    /// A presented repository was delivered twice.
    #[error("Root {root} was already presented")]
    DuplicateRoot { root: String },

    /// Input was submitted after `done` or after the pipeline stopped.
    #[error("Pipeline no longer accepts input")]
    InputClosed,

    /// `done` was called more than once.
    #[error("Pipeline input was already marked done")]
    AlreadyDone,

    /// The orchestrator is no longer running.
    #[error("Pipeline has stopped")]
    PipelineStopped,

    /// An operation was interrupted by cancellation.
    #[error("Operation cancelled")]
    Cancelled,

    /// One or more stage workers panicked.
    #[error("{count} pipeline worker(s) panicked")]
    WorkerPanicked { count: usize },

    /// The external updater reported a failure.
    #[error("Update of {root} failed: {message}")]
    Update { root: String, message: String },

    /// A mutex guarding shared state has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
