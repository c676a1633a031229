//! The orchestrator actor.
//!
//! A single thread owns the ordered result list and the observer set. It
//! appends presented repositories as they arrive, fans them out to observers
//! and answers control requests. Nothing else touches the list, so no lock is
//! needed.
//!
//! Once `presented` disconnects (or the pipeline is cancelled) every observer
//! channel is closed and the actor keeps answering requests from the final
//! list until the last `Pipeline` handle is dropped. Late observers receive
//! the complete list in an already-closed channel.

use crossbeam_channel as chan;
use log::{debug, error};

use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::pipeline::results::{RepoList, RepoPresentation, UpdateState};

/// Requests served by the orchestrator.
pub(crate) enum Control {
    /// Register an observer; replies with its receiving end.
    Observe(chan::Sender<chan::Receiver<RepoPresentation>>),
    Snapshot(chan::Sender<Vec<RepoPresentation>>),
    Get {
        root: String,
        reply: chan::Sender<Option<RepoPresentation>>,
    },
    Transition {
        root: String,
        to: UpdateState,
        reply: chan::Sender<Result<RepoPresentation>>,
    },
    /// Moves an available entry to updating; fails for any other status.
    BeginUpdate {
        root: String,
        reply: chan::Sender<Result<RepoPresentation>>,
    },
}

pub(crate) struct Orchestrator {
    list: RepoList,
    observers: Vec<chan::Sender<RepoPresentation>>,
    streaming: bool,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            list: RepoList::new(),
            observers: Vec::new(),
            streaming: true,
        }
    }

    /// Runs the actor loop until every control sender is gone.
    pub fn run(
        mut self,
        presented: chan::Receiver<RepoPresentation>,
        control: chan::Receiver<Control>,
        cancel: Cancellation,
    ) {
        loop {
            chan::select! {
                recv(presented) -> msg => match msg {
                    Ok(rp) => self.append(rp),
                    Err(_) => break,
                },
                recv(control) -> msg => match msg {
                    Ok(request) => self.handle(request),
                    Err(_) => return,
                },
                recv(cancel.signal()) -> _ => {
                    debug!("orchestrator stopping on cancellation");
                    break;
                }
            }
        }

        self.finish();
        for request in control.iter() {
            self.handle(request);
        }
    }

    fn append(&mut self, rp: RepoPresentation) {
        if let Err(e) = self.list.push(rp.clone()) {
            error!("dropping presented repository: {}", e);
            return;
        }
        self.observers.retain(|tx| tx.send(rp.clone()).is_ok());
    }

    /// Closes every observer channel. No more arrivals will follow.
    fn finish(&mut self) {
        self.streaming = false;
        self.observers.clear();
        debug!(
            "streaming finished with {} presented repositories",
            self.list.len()
        );
    }

    fn handle(&mut self, request: Control) {
        // Replies are best effort: the requester may have given up.
        match request {
            Control::Observe(reply) => {
                let _ = reply.send(self.observe());
            }
            Control::Snapshot(reply) => {
                let _ = reply.send(self.list.ordered());
            }
            Control::Get { root, reply } => {
                let _ = reply.send(self.list.get(&root).cloned());
            }
            Control::Transition { root, to, reply } => {
                let result = match to {
                    UpdateState::Updating => self.list.set_updating(&root),
                    UpdateState::Updated => self.list.set_updated(&root),
                    // Status never moves backwards.
                    UpdateState::Available => match self.list.get(&root) {
                        Some(rp) => Err(Error::InvalidTransition {
                            root: root.clone(),
                            from: rp.state,
                            to,
                        }),
                        None => Err(Error::UnknownRoot { root: root.clone() }),
                    },
                };
                let _ = reply.send(result);
            }
            Control::BeginUpdate { root, reply } => {
                let _ = reply.send(self.list.begin_update(&root));
            }
        }
    }

    /// A new observer channel, pre-filled with everything presented so far
    /// in arrival order.
    fn observe(&mut self) -> chan::Receiver<RepoPresentation> {
        let (tx, rx) = chan::unbounded();
        for rp in self.list.arrivals() {
            // The receiver is held right here, so this can't fail.
            let _ = tx.send(rp.clone());
        }
        if self.streaming {
            self.observers.push(tx);
        }
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::results::tests::presented;
    use std::thread;

    struct Actor {
        presented: chan::Sender<RepoPresentation>,
        control: chan::Sender<Control>,
        cancel: Cancellation,
        handle: thread::JoinHandle<()>,
    }

    fn start() -> Actor {
        let (presented_tx, presented_rx) = chan::bounded(4);
        let (control_tx, control_rx) = chan::unbounded();
        let cancel = Cancellation::new();
        let handle = {
            let cancel = cancel.clone();
            thread::spawn(move || Orchestrator::new().run(presented_rx, control_rx, cancel))
        };
        Actor {
            presented: presented_tx,
            control: control_tx,
            cancel,
            handle,
        }
    }

    fn observe(control: &chan::Sender<Control>) -> chan::Receiver<RepoPresentation> {
        let (tx, rx) = chan::bounded(1);
        control.send(Control::Observe(tx)).unwrap();
        rx.recv().unwrap()
    }

    fn snapshot(control: &chan::Sender<Control>) -> Vec<String> {
        let (tx, rx) = chan::bounded(1);
        control.send(Control::Snapshot(tx)).unwrap();
        rx.recv()
            .unwrap()
            .iter()
            .map(|rp| rp.root().to_string())
            .collect()
    }

    fn transition(control: &chan::Sender<Control>, root: &str, to: UpdateState) -> Result<RepoPresentation> {
        let (tx, rx) = chan::bounded(1);
        control
            .send(Control::Transition {
                root: root.to_string(),
                to,
                reply: tx,
            })
            .unwrap();
        rx.recv().unwrap()
    }

    fn roots(rx: &chan::Receiver<RepoPresentation>) -> Vec<String> {
        rx.iter().map(|rp| rp.root().to_string()).collect()
    }

    #[test]
    fn test_observer_gets_replay_then_live_items() {
        let actor = start();
        actor.presented.send(presented("r1")).unwrap();
        let early = observe(&actor.control);
        actor.presented.send(presented("r2")).unwrap();
        let late = observe(&actor.control);
        actor.presented.send(presented("r3")).unwrap();
        drop(actor.presented);

        assert_eq!(roots(&early), vec!["r1", "r2", "r3"]);
        assert_eq!(roots(&late), vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_observer_after_finish_gets_closed_snapshot() {
        let actor = start();
        actor.presented.send(presented("r1")).unwrap();
        actor.presented.send(presented("r2")).unwrap();
        drop(actor.presented);

        // Wait until the actor has drained `presented`.
        while snapshot(&actor.control).len() < 2 {
            thread::yield_now();
        }
        let rx = observe(&actor.control);
        assert_eq!(roots(&rx), vec!["r1", "r2"]);
    }

    #[test]
    fn test_dropped_observer_is_removed() {
        let actor = start();
        drop(observe(&actor.control));
        let kept = observe(&actor.control);
        actor.presented.send(presented("r1")).unwrap();
        drop(actor.presented);
        assert_eq!(roots(&kept), vec!["r1"]);
    }

    #[test]
    fn test_duplicate_presented_root_is_dropped() {
        let actor = start();
        actor.presented.send(presented("r1")).unwrap();
        actor.presented.send(presented("r1")).unwrap();
        drop(actor.presented);
        let rx = observe(&actor.control);
        assert_eq!(roots(&rx), vec!["r1"]);
    }

    #[test]
    fn test_transitions_after_streaming() {
        let actor = start();
        for root in ["r1", "r2", "r3"] {
            actor.presented.send(presented(root)).unwrap();
        }
        drop(actor.presented);
        while snapshot(&actor.control).len() < 3 {
            thread::yield_now();
        }

        assert_eq!(transition(&actor.control, "r2", UpdateState::Updating).unwrap().state, UpdateState::Updating);
        assert_eq!(transition(&actor.control, "r2", UpdateState::Updated).unwrap().state, UpdateState::Updated);
        assert_eq!(snapshot(&actor.control), vec!["r1", "r3", "r2"]);

        assert!(matches!(
            transition(&actor.control, "r2", UpdateState::Updated),
            Err(Error::InvalidTransition { .. })
        ));
        assert!(matches!(
            transition(&actor.control, "missing", UpdateState::Updating),
            Err(Error::UnknownRoot { .. })
        ));
        assert!(matches!(
            transition(&actor.control, "r1", UpdateState::Available),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_late_observer_replays_arrival_order_after_transitions() {
        let actor = start();
        let early = observe(&actor.control);
        for root in ["r1", "r2", "r3"] {
            actor.presented.send(presented(root)).unwrap();
        }
        while snapshot(&actor.control).len() < 3 {
            thread::yield_now();
        }

        transition(&actor.control, "r1", UpdateState::Updating).unwrap();
        assert_eq!(snapshot(&actor.control), vec!["r2", "r3", "r1"]);
        let late = observe(&actor.control);
        actor.presented.send(presented("r4")).unwrap();
        drop(actor.presented);

        let early = roots(&early);
        assert_eq!(early, vec!["r1", "r2", "r3", "r4"]);
        assert_eq!(roots(&late), early);
    }

    #[test]
    fn test_begin_update_only_from_available() {
        let actor = start();
        actor.presented.send(presented("r1")).unwrap();
        drop(actor.presented);
        while snapshot(&actor.control).len() < 1 {
            thread::yield_now();
        }

        let begin = |root: &str| {
            let (tx, rx) = chan::bounded(1);
            actor
                .control
                .send(Control::BeginUpdate {
                    root: root.to_string(),
                    reply: tx,
                })
                .unwrap();
            rx.recv().unwrap()
        };
        assert_eq!(begin("r1").unwrap().state, UpdateState::Updating);
        transition(&actor.control, "r1", UpdateState::Updated).unwrap();
        assert!(matches!(
            begin("r1"),
            Err(Error::InvalidTransition { from: UpdateState::Updated, .. })
        ));
    }

    #[test]
    fn test_cancel_closes_observers() {
        let actor = start();
        let rx = observe(&actor.control);
        actor.cancel.cancel();
        assert!(rx.recv().is_err());
        drop(actor.control);
        actor.handle.join().unwrap();
    }

    #[test]
    fn test_actor_exits_when_control_senders_drop() {
        let actor = start();
        drop(actor.presented);
        drop(actor.control);
        actor.handle.join().unwrap();
    }
}
