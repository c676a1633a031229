//! Cooperative cancellation shared by pipeline workers and network calls.
//!
//! A `Cancellation` is a cloneable token. Calling `cancel` on any clone flips
//! a flag for polling code and disconnects a signal channel, so code blocked
//! in `crossbeam_channel::select!` wakes up through the `signal()` arm.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel as chan;

/// Cancellation token. The signal channel is never sent on, it only
/// disconnects.
#[derive(Clone)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<chan::Sender<()>>>>,
    signal: chan::Receiver<()>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, rx) = chan::bounded(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Cancels every clone of this token. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // A poisoned lock still holds the sender; drop it either way.
        let mut trigger = match self.trigger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trigger.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// A receiver that becomes ready (disconnected) once cancelled.
    ///
    /// Intended for `select!` arms: `recv(cancel.signal()) -> _ => break`.
    pub fn signal(&self) -> &chan::Receiver<()> {
        &self.signal
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancellation")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Sends `item` on `tx`, giving up if the receiver is gone or `cancel` fires.
///
/// Returns `false` when the caller should stop producing.
pub(crate) fn forward<T>(tx: &chan::Sender<T>, item: T, cancel: &Cancellation) -> bool {
    chan::select! {
        send(tx, item) -> res => res.is_ok(),
        recv(cancel.signal()) -> _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_new_token_is_not_cancelled() {
        let cancel = Cancellation::new();
        assert!(!cancel.is_cancelled());
        assert!(cancel.signal().try_recv().is_err());
    }

    #[test]
    fn test_cancel_is_visible_to_clones() {
        let cancel = Cancellation::new();
        let clone = cancel.clone();
        cancel.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(
            clone.signal().recv_timeout(Duration::from_secs(1)),
            Err(chan::RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let cancel = Cancellation::new();
        cancel.cancel();
        cancel.cancel();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_cancel_wakes_blocked_select() {
        let cancel = Cancellation::new();
        let (_tx, rx) = chan::unbounded::<u32>();
        let waiter = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                chan::select! {
                    recv(rx) -> _ => "item",
                    recv(cancel.signal()) -> _ => "cancelled",
                }
            })
        };
        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        assert_eq!(waiter.join().unwrap(), "cancelled");
    }

    #[test]
    fn test_forward_stops_when_cancelled() {
        let cancel = Cancellation::new();
        let (tx, _rx) = chan::bounded::<u32>(0);
        cancel.cancel();
        assert!(!forward(&tx, 1, &cancel));
    }

    #[test]
    fn test_forward_delivers() {
        let cancel = Cancellation::new();
        let (tx, rx) = chan::bounded::<u32>(1);
        assert!(forward(&tx, 7, &cancel));
        assert_eq!(rx.recv().unwrap(), 7);
    }
}
