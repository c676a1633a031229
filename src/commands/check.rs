//! # Check Command Implementation
//!
//! This module implements the `check` subcommand, which finds repositories
//! with updates available upstream and lists them as they are found.
//!
//! ## Inputs
//!
//! - **Import paths**: Packages given on the command line are located in the
//!   workspace and their enclosing checkouts are checked.
//! - **Standard input**: With `--stdin`, newline separated lines of the form
//!   `importpath [revision|version]` are read. Lines with a revision (or a
//!   pseudo-version) are checked remotely against that pin; nothing needs to
//!   be on disk.
//! - **Workspaces**: Without either of the above, every checkout under each
//!   workspace's `src` directory is checked.
//!
//! Results stream as soon as each repository has been presented. This
//! command is a safe, read-only operation that does not modify any files.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use walkdir::WalkDir;

use package_store::config::PipelineConfig;
use package_store::git::SystemVcs;
use package_store::output::{emoji, format_json, format_presentation, OutputConfig};
use package_store::pipeline::{Backends, Pipeline};
use package_store::presentation::PresenterRegistry;
use package_store::pseudo_version;
use package_store::repo::LocalRepo;
use package_store::resolve::WorkspaceResolver;
use package_store::vcs::VcsKind;

/// Check repositories for available updates
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Import paths of packages to check.
    #[arg(value_name = "IMPORT_PATH")]
    pub import_paths: Vec<String>,

    /// Read newline separated `importpath [revision|version]` lines from stdin.
    #[arg(long, conflicts_with = "import_paths")]
    pub stdin: bool,

    /// Workspace directories, separated like PATH.
    ///
    /// Defaults to `~/go` when neither this flag nor `GOPATH` is set.
    #[arg(long, value_name = "DIRS", env = "GOPATH")]
    pub gopath: Option<String>,

    /// Standard library root. Packages found there are never checked.
    #[arg(long, value_name = "DIR", env = "GOROOT")]
    pub goroot: Option<PathBuf>,

    /// Pipeline configuration file.
    ///
    /// Defaults to `package-store/config.yaml` in the platform configuration
    /// directory, when present.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print one JSON object per line instead of a human-readable listing.
    #[arg(long)]
    pub json: bool,
}

/// Where the pipeline's input comes from.
enum Source {
    ImportPaths(Vec<String>),
    Stdin,
    Workspaces(Vec<PathBuf>),
}

/// Execute the `check` command.
pub fn execute(args: CheckArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config = PipelineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let workspaces = workspaces(args.gopath.as_deref());
    let resolver = WorkspaceResolver::new(std::env::current_dir()?, args.goroot.clone(), workspaces.clone())?;
    let pipeline = Pipeline::new(
        &config,
        Backends {
            resolver: Arc::new(resolver),
            vcs: Arc::new(SystemVcs),
            presenters: PresenterRegistry::new(),
        },
    )?;

    let source = if args.stdin {
        Source::Stdin
    } else if !args.import_paths.is_empty() {
        Source::ImportPaths(args.import_paths)
    } else {
        Source::Workspaces(workspaces)
    };

    // Observe before feeding so the listing streams from the first result.
    let results = pipeline.repo_presentations()?;
    let feeder = {
        let pipeline = pipeline.clone();
        thread::Builder::new()
            .name("feeder".to_string())
            .spawn(move || -> Result<()> {
                let fed = feed(&pipeline, source);
                pipeline.done()?;
                fed
            })?
    };

    let spinner = if args.json || !console::Term::stderr().is_term() {
        ProgressBar::hidden()
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_message("Checking for updates...");
        spinner
    };

    let mut count = 0usize;
    for rp in results {
        count += 1;
        if args.json {
            println!("{}", format_json(&rp)?);
        } else {
            spinner.suspend(|| print!("{}", format_presentation(&out, &rp)));
            spinner.set_message(format!("Checking for updates... {} found", count));
        }
    }
    spinner.finish_and_clear();

    feeder
        .join()
        .map_err(|_| anyhow::anyhow!("input reader panicked"))??;
    pipeline.wait()?;

    if !args.json {
        if count == 0 {
            println!("{} All packages are up to date!", emoji(&out, "✅", "[OK]"));
        } else {
            println!(
                "\n{} {} {} with updates available",
                emoji(&out, "📦", "[UPDATES]"),
                count,
                if count == 1 { "repository" } else { "repositories" }
            );
        }
    }
    Ok(())
}

/// The workspaces to search, from `GOPATH`-style `gopath` or `~/go`.
fn workspaces(gopath: Option<&str>) -> Vec<PathBuf> {
    match gopath {
        Some(gopath) if !gopath.is_empty() => std::env::split_paths(gopath).collect(),
        _ => dirs::home_dir()
            .map(|home| vec![home.join("go")])
            .unwrap_or_default(),
    }
}

fn feed(pipeline: &Pipeline, source: Source) -> Result<()> {
    match source {
        Source::ImportPaths(paths) => {
            for path in paths {
                pipeline.add_import_path(path)?;
            }
        }
        Source::Stdin => {
            for line in io::stdin().lock().lines() {
                let line = line.context("Failed to read stdin")?;
                match parse_input_line(&line) {
                    Some(Input::ImportPath(path)) => pipeline.add_import_path(path)?,
                    Some(Input::Pinned(path, revision)) => pipeline.add_revision(path, revision)?,
                    None => {}
                }
            }
        }
        Source::Workspaces(workspaces) => {
            for workspace in workspaces {
                for repo in find_repositories(&workspace.join("src")) {
                    pipeline.add_repository(repo)?;
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    ImportPath(String),
    Pinned(String, String),
}

/// Parses one `importpath [revision|version]` line of standard input.
fn parse_input_line(line: &str) -> Option<Input> {
    let mut fields = line.split_whitespace();
    let import_path = fields.next()?.to_string();
    let Some(pin) = fields.next() else {
        return Some(Input::ImportPath(import_path));
    };

    if let Some(revision) = pseudo_version::revision_from_version(pin) {
        return Some(Input::Pinned(import_path, revision));
    }
    let is_release = pin
        .strip_prefix('v')
        .is_some_and(|v| semver::Version::parse(v).is_ok());
    if is_release {
        warn!(
            "skipping {}: tagged version {} does not name a revision",
            import_path, pin
        );
        return None;
    }
    Some(Input::Pinned(import_path, pin.to_string()))
}

/// Every version-control checkout under `src_root`. Checkouts nested inside
/// another checkout are not reported separately.
fn find_repositories(src_root: &Path) -> Vec<LocalRepo> {
    let mut repos = Vec::new();
    let mut walker = WalkDir::new(src_root).min_depth(1).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || name.starts_with('_') || name == "testdata" {
            walker.skip_current_dir();
            continue;
        }

        let dir = entry.path();
        let Some(kind) = VcsKind::ALL
            .into_iter()
            .find(|kind| dir.join(kind.metadata_dir()).is_dir())
        else {
            continue;
        };
        if let Some(root) = import_path(dir, src_root) {
            repos.push(LocalRepo {
                path: dir.to_path_buf(),
                root,
                vcs: kind,
            });
        }
        walker.skip_current_dir();
    }
    repos
}

fn import_path(dir: &Path, src_root: &Path) -> Option<String> {
    let relative = dir.strip_prefix(src_root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}
