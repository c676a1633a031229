//! # Processing Pipeline
//!
//! The pipeline turns repository descriptors into presented updates in four
//! stages, each a pool of worker threads connected by channels:
//!
//! ```text
//! add_import_path ─┐
//! add_revision    ─┤ stage 1: input adapters     ─▶ unique
//! add_repository  ─┤          (dedup by root)
//! add_subrepo     ─┘
//! unique            ─▶ stage 2: filter/enrich    ─▶ filtered
//! filtered          ─▶ stage 3: present          ─▶ presented
//! presented         ─▶ orchestrator: ordered list + observers
//! ```
//!
//! Every worker holds a clone of its downstream `Sender`. When the last
//! worker of a stage exits, the next stage's input disconnects and that stage
//! drains and exits in turn. Calling `done` starts this cascade by dropping
//! the input queues.
//!
//! Results are observed with `repo_presentations`, which can be called any
//! number of times from any thread. Each observer first receives everything
//! presented so far, then every later arrival in the same order, and its
//! channel closes when the pipeline finishes.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use package_store::config::PipelineConfig;
//! use package_store::git::SystemVcs;
//! use package_store::pipeline::{Backends, Pipeline};
//! use package_store::presentation::PresenterRegistry;
//! use package_store::resolve::WorkspaceResolver;
//!
//! # fn main() -> package_store::error::Result<()> {
//! let resolver = WorkspaceResolver::new(std::env::current_dir()?, None, vec!["/home/me/go".into()])?;
//! let pipeline = Pipeline::new(
//!     &PipelineConfig::default(),
//!     Backends {
//!         resolver: Arc::new(resolver),
//!         vcs: Arc::new(SystemVcs),
//!         presenters: PresenterRegistry::new(),
//!     },
//! )?;
//! pipeline.add_revision("github.com/owner/repo", "abc123")?;
//! pipeline.done()?;
//! for rp in pipeline.repo_presentations()? {
//!     println!("{} {}", rp.root(), rp.presentation.home_url);
//! }
//! # Ok(())
//! # }
//! ```

mod inputs;
mod orchestrator;
pub(crate) mod results;
mod stages;

pub use results::{RepoPresentation, UpdateState};

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel as chan;
use log::{debug, error};

use crate::cancel::Cancellation;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::presentation::PresenterRegistry;
use crate::repo::{LocalRepo, Subrepo};
use crate::resolve::Resolver;
use crate::vcs::VcsProvider;

use inputs::{ImportPathRevision, Intake};
use orchestrator::{Control, Orchestrator};
use stages::{run_worker, Filter, Present};

/// External collaborators the pipeline consumes.
pub struct Backends {
    pub resolver: Arc<dyn Resolver>,
    pub vcs: Arc<dyn VcsProvider>,
    /// Presenters in priority order.
    pub presenters: PresenterRegistry,
}

/// Senders behind the `add_*` methods. Dropped by `done`.
struct Inputs {
    import_paths: chan::Sender<String>,
    revisions: chan::Sender<ImportPathRevision>,
    repositories: chan::Sender<LocalRepo>,
    subrepos: chan::Sender<Subrepo>,
    presented: chan::Sender<RepoPresentation>,
}

struct Shared {
    inputs: Mutex<Option<Inputs>>,
    control: chan::Sender<Control>,
    cancel: Cancellation,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Handle to a running pipeline. Cheap to clone; every clone refers to the
/// same pipeline. Dropping the last handle cancels it.
#[derive(Clone)]
pub struct Pipeline {
    shared: Arc<Shared>,
}

/// Cancels the pipeline if the worker holding it panics.
struct PanicGuard(Cancellation);

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(
                "{} panicked, cancelling pipeline",
                thread::current().name().unwrap_or("pipeline worker")
            );
            self.0.cancel();
        }
    }
}

fn spawn<F>(name: String, cancel: &Cancellation, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let cancel = cancel.clone();
    let handle = thread::Builder::new().name(name).spawn(move || {
        let _guard = PanicGuard(cancel);
        f();
    })?;
    Ok(handle)
}

/// Spawns `count` workers named `<stage>-<i>`, each draining `input` into
/// `output` with its own handle on `process`.
fn spawn_pool<I, O, F>(
    stage: &str,
    count: usize,
    input: &chan::Receiver<I>,
    output: &chan::Sender<O>,
    cancel: &Cancellation,
    process: F,
    handles: &mut Vec<JoinHandle<()>>,
) -> Result<()>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I, &Cancellation) -> Option<O> + Clone + Send + 'static,
{
    for i in 0..count {
        let (input, output, worker_cancel, process) =
            (input.clone(), output.clone(), cancel.clone(), process.clone());
        handles.push(spawn(format!("{}-{}", stage, i), cancel, move || {
            run_worker(input, output, worker_cancel, process)
        })?);
    }
    Ok(())
}

impl Pipeline {
    /// Starts a pipeline. Its workers wait for input immediately.
    pub fn new(config: &PipelineConfig, backends: Backends) -> Result<Self> {
        config.validate()?;
        let cancel = Cancellation::new();
        let (control_tx, control_rx) = chan::unbounded();
        let mut handles = Vec::new();

        match Self::start(config, backends, &cancel, control_rx, &mut handles) {
            Ok(inputs) => Ok(Self {
                shared: Arc::new(Shared {
                    inputs: Mutex::new(Some(inputs)),
                    control: control_tx,
                    cancel,
                    workers: Mutex::new(handles),
                }),
            }),
            Err(e) => {
                // Let whatever already started wind down.
                cancel.cancel();
                Err(e)
            }
        }
    }

    fn start(
        config: &PipelineConfig,
        backends: Backends,
        cancel: &Cancellation,
        control: chan::Receiver<Control>,
        handles: &mut Vec<JoinHandle<()>>,
    ) -> Result<Inputs> {
        let workers = config.workers;
        let (import_paths_tx, import_paths_rx) = chan::unbounded::<String>();
        let (revisions_tx, revisions_rx) = chan::unbounded::<ImportPathRevision>();
        let (repositories_tx, repositories_rx) = chan::unbounded::<LocalRepo>();
        let (subrepos_tx, subrepos_rx) = chan::unbounded::<Subrepo>();
        let (unique_tx, unique_rx) = chan::bounded(config.queue_depth);
        let (filtered_tx, filtered_rx) = chan::bounded(config.queue_depth);
        let (presented_tx, presented_rx) = chan::bounded(config.queue_depth);

        let intake = Arc::new(Intake::new(Arc::clone(&backends.resolver), backends.vcs));
        {
            let intake = Arc::clone(&intake);
            let process = move |path: String, _: &Cancellation| intake.from_import_path(&path);
            spawn_pool("import-path", workers, &import_paths_rx, &unique_tx, cancel, process, handles)?;
        }
        {
            let intake = Arc::clone(&intake);
            let process = move |ipr: ImportPathRevision, _: &Cancellation| intake.from_revision(&ipr);
            spawn_pool("revision", workers, &revisions_rx, &unique_tx, cancel, process, handles)?;
        }
        {
            let intake = Arc::clone(&intake);
            let process = move |repo: LocalRepo, _: &Cancellation| intake.from_local_repo(&repo);
            spawn_pool("repository", workers, &repositories_rx, &unique_tx, cancel, process, handles)?;
        }
        {
            let process = move |subrepo: Subrepo, _: &Cancellation| intake.from_subrepo(&subrepo);
            spawn_pool("subrepo", workers, &subrepos_rx, &unique_tx, cancel, process, handles)?;
        }

        let filter = Arc::new(Filter::new(backends.resolver));
        let process = move |repo, cancel: &Cancellation| filter.process(repo, cancel);
        spawn_pool("filter", workers, &unique_rx, &filtered_tx, cancel, process, handles)?;

        let present = Arc::new(Present::new(
            backends.presenters,
            config.parallel_presenters,
            config.generic_image_url.clone(),
        ));
        let process = move |repo, cancel: &Cancellation| Some(present.process(repo, cancel));
        spawn_pool("present", workers, &filtered_rx, &presented_tx, cancel, process, handles)?;

        // The orchestrator outlives the stages; `wait` doesn't join it.
        let orchestrator_cancel = cancel.clone();
        spawn("orchestrator".to_string(), cancel, move || {
            Orchestrator::new().run(presented_rx, control, orchestrator_cancel)
        })?;

        debug!("pipeline started with {} workers per stage", workers);
        Ok(Inputs {
            import_paths: import_paths_tx,
            revisions: revisions_tx,
            repositories: repositories_tx,
            subrepos: subrepos_tx,
            presented: presented_tx,
        })
    }

    fn with_inputs<F>(&self, send: F) -> Result<()>
    where
        F: FnOnce(&Inputs) -> bool,
    {
        let inputs = self.shared.inputs.lock().map_err(|_| Error::LockPoisoned {
            context: "pipeline inputs".to_string(),
        })?;
        // A failed send means the stage already stopped on cancellation.
        let sent = match inputs.as_ref() {
            Some(inputs) => send(inputs),
            None => false,
        };
        if sent {
            Ok(())
        } else {
            Err(Error::InputClosed)
        }
    }

    /// Queues a package import path. The package is located in the
    /// workspace and its enclosing checkout is checked for updates.
    pub fn add_import_path(&self, import_path: impl Into<String>) -> Result<()> {
        let import_path = import_path.into();
        self.with_inputs(|inputs| inputs.import_paths.send(import_path).is_ok())
    }

    /// Queues an import path whose local copy is pinned at `revision`. The
    /// repository is resolved remotely; nothing needs to be on disk.
    pub fn add_revision(&self, import_path: impl Into<String>, revision: impl Into<String>) -> Result<()> {
        let input = ImportPathRevision {
            import_path: import_path.into(),
            revision: revision.into(),
        };
        self.with_inputs(|inputs| inputs.revisions.send(input).is_ok())
    }

    /// Queues an already located local checkout.
    pub fn add_repository(&self, repo: LocalRepo) -> Result<()> {
        self.with_inputs(|inputs| inputs.repositories.send(repo).is_ok())
    }

    /// Queues a repository nested inside a larger one.
    pub fn add_subrepo(&self, subrepo: Subrepo) -> Result<()> {
        self.with_inputs(|inputs| inputs.subrepos.send(subrepo).is_ok())
    }

    /// Injects an already presented repository directly into the results,
    /// bypassing every stage. May block while the result buffer is full.
    pub fn add_presented(&self, rp: RepoPresentation) -> Result<()> {
        let presented = {
            let inputs = self.shared.inputs.lock().map_err(|_| Error::LockPoisoned {
                context: "pipeline inputs".to_string(),
            })?;
            match inputs.as_ref() {
                Some(inputs) => inputs.presented.clone(),
                None => return Err(Error::InputClosed),
            }
        };
        if crate::cancel::forward(&presented, rp, &self.shared.cancel) {
            Ok(())
        } else {
            Err(Error::InputClosed)
        }
    }

    /// Signals that no more input will be added. Must be called exactly once.
    pub fn done(&self) -> Result<()> {
        let mut inputs = self.shared.inputs.lock().map_err(|_| Error::LockPoisoned {
            context: "pipeline inputs".to_string(),
        })?;
        match inputs.take() {
            Some(_) => Ok(()),
            None => Err(Error::AlreadyDone),
        }
    }

    /// A new observer of the ordered results.
    ///
    /// The channel first yields every repository presented so far, then each
    /// new one as it arrives, and closes once the pipeline has finished.
    pub fn repo_presentations(&self) -> Result<chan::Receiver<RepoPresentation>> {
        self.request(Control::Observe)
    }

    /// The results as of now, in display order: pending entries first, then
    /// updated ones.
    pub fn snapshot(&self) -> Result<Vec<RepoPresentation>> {
        self.request(Control::Snapshot)
    }

    pub fn get(&self, root: &str) -> Result<Option<RepoPresentation>> {
        let root = root.to_string();
        self.request(|reply| Control::Get { root, reply })
    }

    /// Marks `root` as being updated and moves it above the updated entries.
    /// A no-op for a repository that is already updated.
    pub fn set_updating(&self, root: &str) -> Result<RepoPresentation> {
        self.transition(root, UpdateState::Updating)
    }

    /// Marks `root` as updated and moves it down to the updated entries.
    pub fn set_updated(&self, root: &str) -> Result<RepoPresentation> {
        self.transition(root, UpdateState::Updated)
    }

    /// Marks `root` as updating only if it is still available, as one step.
    pub(crate) fn begin_update(&self, root: &str) -> Result<RepoPresentation> {
        let root = root.to_string();
        self.request(|reply| Control::BeginUpdate { root, reply })?
    }

    fn transition(&self, root: &str, to: UpdateState) -> Result<RepoPresentation> {
        let root = root.to_string();
        self.request(|reply| Control::Transition { root, to, reply })?
    }

    fn request<T, F>(&self, make: F) -> Result<T>
    where
        F: FnOnce(chan::Sender<T>) -> Control,
    {
        let (reply_tx, reply_rx) = chan::bounded(1);
        self.shared
            .control
            .send(make(reply_tx))
            .map_err(|_| Error::PipelineStopped)?;
        reply_rx.recv().map_err(|_| Error::PipelineStopped)
    }

    /// Stops every stage. Observers are closed with whatever was presented
    /// so far; queries keep working.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Blocks until every stage worker has exited, which happens after `done`
    /// once all input has been processed, or after `cancel`.
    pub fn wait(&self) -> Result<()> {
        let handles = {
            let mut workers = self.shared.workers.lock().map_err(|_| Error::LockPoisoned {
                context: "pipeline workers".to_string(),
            })?;
            std::mem::take(&mut *workers)
        };
        let panicked = handles
            .into_iter()
            .map(JoinHandle::join)
            .filter(|r| r.is_err())
            .count();
        if panicked > 0 {
            return Err(Error::WorkerPanicked { count: panicked });
        }
        Ok(())
    }
}
