//! System `git` backend for the version-control capability traits.
//!
//! This uses the system git command, which automatically handles:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Any authentication configured in ~/.gitconfig
//!
//! Network commands (`ls-remote`) poll the child process so a cancelled
//! pipeline kills them instead of waiting for a slow remote.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::vcs::{LocalVcs, RemoteHead, RemoteVcs, VcsKind, VcsProvider};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// `VcsProvider` backed by the system `git` binary. Other version-control
/// systems are reported as unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemVcs;

impl VcsProvider for SystemVcs {
    fn local(&self, kind: VcsKind) -> Result<Arc<dyn LocalVcs>> {
        match kind {
            VcsKind::Git => Ok(Arc::new(Git)),
            other => Err(Error::UnsupportedVcs {
                vcs: other.to_string(),
            }),
        }
    }

    fn remote(&self, kind: VcsKind) -> Result<Arc<dyn RemoteVcs>> {
        match kind {
            VcsKind::Git => Ok(Arc::new(Git)),
            other => Err(Error::UnsupportedVcs {
                vcs: other.to_string(),
            }),
        }
    }
}

/// Git capabilities for both local checkouts and remote-only repositories.
#[derive(Debug, Clone, Copy, Default)]
pub struct Git;

impl LocalVcs for Git {
    fn branch(&self, dir: &Path) -> Result<String> {
        run(Some(dir), &["rev-parse", "--abbrev-ref", "HEAD"], None).map(trim_line)
    }

    fn status(&self, dir: &Path) -> Result<String> {
        run(Some(dir), &["status", "--porcelain"], None)
    }

    fn remote_url(&self, dir: &Path) -> Result<String> {
        run(Some(dir), &["ls-remote", "--get-url", "origin"], None).map(trim_line)
    }

    fn local_revision(&self, dir: &Path, default_branch: &str) -> Result<String> {
        let reference = if default_branch.is_empty() {
            "HEAD".to_string()
        } else {
            format!("refs/heads/{}", default_branch)
        };
        run(Some(dir), &["rev-parse", "--verify", &reference], None).map(trim_line)
    }

    fn remote_branch_and_revision(&self, dir: &Path, cancel: &Cancellation) -> Result<RemoteHead> {
        let output = run(
            Some(dir),
            &["ls-remote", "--symref", "origin", "HEAD"],
            Some(cancel),
        )?;
        parse_symref_head(&output, &dir.display().to_string())
    }

    fn contains(&self, dir: &Path, revision: &str, branch: &str) -> Result<bool> {
        match run(
            Some(dir),
            &["branch", "--list", "--contains", revision, branch],
            None,
        ) {
            Ok(output) => Ok(!output.trim().is_empty()),
            // The remote revision has not been fetched, so local can't contain it.
            Err(Error::GitCommand { stderr, .. }) if is_unknown_revision(&stderr) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl RemoteVcs for Git {
    fn remote_branch_and_revision(&self, url: &str, cancel: &Cancellation) -> Result<RemoteHead> {
        let output = run(None, &["ls-remote", "--symref", url, "HEAD"], Some(cancel))?;
        parse_symref_head(&output, url)
    }
}

/// Runs `git` with `args` in `dir` and returns stdout.
///
/// When `cancel` is given the command is polled and killed on cancellation.
fn run(dir: Option<&Path>, args: &[&str], cancel: Option<&Cancellation>) -> Result<String> {
    let target = dir
        .map(|d| d.display().to_string())
        .unwrap_or_else(|| args.get(2).copied().unwrap_or_default().to_string());
    let command_name = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");

    let mut command = Command::new("git");
    command
        .args(args)
        // Never block on an interactive credential prompt.
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let spawn_error = |e: std::io::Error| Error::GitCommand {
        command: command_name.clone(),
        target: target.clone(),
        stderr: e.to_string(),
    };

    let (success, stdout, stderr) = match cancel {
        None => {
            let output = command.output().map_err(spawn_error)?;
            (output.status.success(), output.stdout, output.stderr)
        }
        Some(cancel) => {
            let mut child = command.spawn().map_err(spawn_error)?;
            let stdout = drain(child.stdout.take());
            let stderr = drain(child.stderr.take());
            // On error the drains are not joined: a helper git spawned may
            // still hold the pipes open. They exit once the pipes close.
            let status = wait_or_kill(&mut child, cancel)?;
            (
                status.success(),
                stdout.join().unwrap_or_default(),
                stderr.join().unwrap_or_default(),
            )
        }
    };

    if !success {
        return Err(Error::GitCommand {
            command: command_name,
            target,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

/// Polls `child` until it exits. On cancellation, or when polling itself
/// fails, the child is killed and reaped before the error is returned.
fn wait_or_kill(child: &mut Child, cancel: &Cancellation) -> Result<ExitStatus> {
    let outcome = loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if cancel.is_cancelled() => break Err(Error::Cancelled),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => break Err(Error::Io(e)),
        }
    };
    let _ = child.kill();
    let _ = child.wait();
    outcome
}

/// Reads a child pipe to completion on a helper thread so the child never
/// blocks on a full pipe while it is being polled.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn trim_line(s: String) -> String {
    s.trim().to_string()
}

/// Parses `git ls-remote --symref <remote> HEAD` output.
///
/// The output format is:
///
/// ```text
/// ref: refs/heads/main	HEAD
/// 1c5e8e0f0b6d...	HEAD
/// ```
pub fn parse_symref_head(output: &str, target: &str) -> Result<RemoteHead> {
    let mut branch = None;
    let mut revision = None;

    for line in output.lines() {
        let Some((left, name)) = line.split_once('\t') else {
            continue;
        };
        if name.trim() != "HEAD" {
            continue;
        }
        if let Some(reference) = left.strip_prefix("ref: ") {
            branch = reference
                .strip_prefix("refs/heads/")
                .map(|b| b.to_string());
        } else {
            revision = Some(left.trim().to_string());
        }
    }

    match (branch, revision) {
        (Some(branch), Some(revision)) if !revision.is_empty() => Ok(RemoteHead { branch, revision }),
        _ => Err(Error::GitCommand {
            command: "ls-remote --symref".to_string(),
            target: target.to_string(),
            stderr: "remote did not report a default branch and HEAD revision".to_string(),
        }),
    }
}

/// Whether git's stderr means a revision is not known locally.
fn is_unknown_revision(stderr: &str) -> bool {
    stderr.contains("malformed object name") || stderr.contains("no such commit")
}
