//! # Sequential Updates
//!
//! Applying an update is left to an `Updater` supplied by the caller. The
//! `UpdateWorker` runs updates one at a time on its own thread, since
//! version-control tools generally don't protect a workspace against
//! concurrent modification, and records progress in the pipeline:
//!
//! 1.  The root must be presented and `available`; it is marked `updating`
//!     in the same orchestrator step, so two requests can't both claim it.
//! 2.  The updater runs.
//! 3.  On success it is marked `updated`. On failure it stays `updating`,
//!     since status never moves backwards, and the error is returned.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel as chan;
use log::{info, warn};

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::repo::Repo;

/// Updates the packages contained in a repository to the latest version.
pub trait Updater: Send + Sync {
    fn update(&self, repo: &Repo) -> Result<()>;
}

struct Request {
    root: String,
    reply: chan::Sender<Result<()>>,
}

/// Handle to the update thread. Dropping it lets queued updates finish and
/// then joins the thread.
pub struct UpdateWorker {
    requests: Option<chan::Sender<Request>>,
    handle: Option<JoinHandle<()>>,
}

impl UpdateWorker {
    pub fn start(pipeline: Pipeline, updater: Arc<dyn Updater>) -> Result<Self> {
        let (tx, rx) = chan::unbounded::<Request>();
        let handle = thread::Builder::new()
            .name("update-worker".to_string())
            .spawn(move || {
                for request in rx {
                    let result = run_update(&pipeline, updater.as_ref(), &request.root);
                    let _ = request.reply.send(result);
                }
            })?;
        Ok(Self {
            requests: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queues an update of `root` and returns a channel that yields its
    /// outcome.
    pub fn submit(&self, root: impl Into<String>) -> Result<chan::Receiver<Result<()>>> {
        let (reply, outcome) = chan::bounded(1);
        let request = Request {
            root: root.into(),
            reply,
        };
        self.requests
            .as_ref()
            .ok_or(Error::PipelineStopped)?
            .send(request)
            .map_err(|_| Error::PipelineStopped)?;
        Ok(outcome)
    }

    /// Updates `root`, blocking until the update has run.
    pub fn update(&self, root: impl Into<String>) -> Result<()> {
        self.submit(root)?
            .recv()
            .map_err(|_| Error::PipelineStopped)?
    }
}

impl Drop for UpdateWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("update worker panicked");
            }
        }
    }
}

fn run_update(pipeline: &Pipeline, updater: &dyn Updater, root: &str) -> Result<()> {
    let rp = pipeline.begin_update(root)?;
    match updater.update(&rp.repo) {
        Ok(()) => {
            pipeline.set_updated(root)?;
            info!("updated {}", root);
            Ok(())
        }
        Err(e) => {
            warn!("update of {} failed: {}", root, e);
            Err(e)
        }
    }
}
