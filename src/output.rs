//! # Terminal and JSON Rendering
//!
//! Presented repositories are printed either as an indented block per
//! repository or as one JSON object per line.
//!
//! Whether color and emoji are used is decided once per run by
//! `OutputConfig` from the `--color` flag. In `auto` mode:
//!
//! - `NO_COLOR` (any value), `CLICOLOR=0` or `TERM=dumb` disable it
//! - `CLICOLOR_FORCE` enables it even when stdout is not a terminal

use std::env;
use std::fmt::Write as _;

use console::style;
use serde::Serialize;

use crate::pipeline::{RepoPresentation, UpdateState};
use crate::presentation::Change;

/// Whether output may use color and emoji.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolves `color_flag` (`always`, `never` or `auto`). Anything other
    /// than `always` or `never` falls back to detection.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_ascii_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::terminal_wants_color(),
        };
        Self { use_color }
    }

    fn terminal_wants_color() -> bool {
        let set_to = |name: &str, value: &str| env::var(name).is_ok_and(|v| v == value);

        if env::var_os("NO_COLOR").is_some() || set_to("CLICOLOR", "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| !v.is_empty() && v != "0") {
            return true;
        }
        !set_to("TERM", "dumb") && console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Picks `decorated` when color is enabled and `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, decorated: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        decorated
    } else {
        plain
    }
}

/// Renders one presented repository as a human-readable block.
///
/// ```text
/// 📦 github.com/owner/repo (abc123 → def456)
///    https://github.com/owner/repo
///    • Fix parsing of empty input (3 comments)
/// ```
pub fn format_presentation(config: &OutputConfig, rp: &RepoPresentation) -> String {
    let repo = &rp.repo;
    let presentation = &rp.presentation;
    let mut out = String::new();

    let marker = match rp.state {
        UpdateState::Available => emoji(config, "📦", "[UPDATE]"),
        UpdateState::Updating => emoji(config, "🔄", "[UPDATING]"),
        UpdateState::Updated => emoji(config, "✅", "[UPDATED]"),
    };
    let root = if config.use_color {
        style(repo.root.as_str()).bold().to_string()
    } else {
        repo.root.clone()
    };
    let _ = writeln!(
        out,
        "{} {} ({} {} {})",
        marker,
        root,
        short_revision(&repo.local.revision),
        emoji(config, "→", "->"),
        short_revision(&repo.remote.revision)
    );
    let _ = writeln!(out, "   {}", presentation.home_url);

    for change in &presentation.changes {
        let _ = writeln!(out, "   {} {}", emoji(config, "•", "-"), format_change(change));
    }
    if let Some(error) = &presentation.error {
        let line = format!("   {} {}", emoji(config, "⚠️ ", "[WARN]"), error);
        if config.use_color {
            let _ = writeln!(out, "{}", style(line).yellow());
        } else {
            let _ = writeln!(out, "{}", line);
        }
    }
    out
}

fn format_change(change: &Change) -> String {
    match change.comments.count {
        0 => change.message.clone(),
        1 => format!("{} (1 comment)", change.message),
        n => format!("{} ({} comments)", change.message, n),
    }
}

/// The first 8 characters of a revision, enough to identify a commit.
fn short_revision(revision: &str) -> &str {
    match revision.char_indices().nth(8) {
        Some((i, _)) => &revision[..i],
        None => revision,
    }
}

/// JSON form of a presented repository, one object per line in `--json`
/// output.
#[derive(Debug, Serialize)]
pub struct PresentationRecord<'a> {
    pub root: &'a str,
    pub state: UpdateState,
    pub local_revision: &'a str,
    pub remote_revision: &'a str,
    pub remote_branch: &'a str,
    pub repo_url: &'a str,
    #[serde(flatten)]
    pub presentation: &'a crate::presentation::Presentation,
}

impl<'a> From<&'a RepoPresentation> for PresentationRecord<'a> {
    fn from(rp: &'a RepoPresentation) -> Self {
        Self {
            root: &rp.repo.root,
            state: rp.state,
            local_revision: &rp.repo.local.revision,
            remote_revision: &rp.repo.remote.revision,
            remote_branch: &rp.repo.remote.branch,
            repo_url: &rp.repo.remote.repo_url,
            presentation: &rp.presentation,
        }
    }
}

/// Renders one presented repository as a single-line JSON object.
pub fn format_json(rp: &RepoPresentation) -> crate::error::Result<String> {
    Ok(serde_json::to_string(&PresentationRecord::from(rp))?)
}
