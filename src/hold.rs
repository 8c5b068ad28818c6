//! Explicit keep-process-alive primitive.
//!
//! Some deployments park the process after a run instead of exiting, so the
//! surrounding platform controls teardown. Instead of a bare
//! `future::pending().await`, [`Hold`] suspends until its [`HoldHandle`] is
//! released (or dropped), giving the embedder a real cancellation hook.

use tokio::sync::watch;

/// Future side: suspends until released.
pub struct Hold {
    rx: watch::Receiver<bool>,
}

/// Control side: releasing (or dropping) the handle wakes the hold.
pub struct HoldHandle {
    tx: watch::Sender<bool>,
}

impl Hold {
    pub fn new() -> (Hold, HoldHandle) {
        let (tx, rx) = watch::channel(false);
        (Hold { rx }, HoldHandle { tx })
    }

    /// Suspend the current task until the handle releases it.
    pub async fn held(mut self) {
        while !*self.rx.borrow() {
            // A dropped sender counts as release.
            if self.rx.changed().await.is_err() {
                break;
            }
        }
    }
}

impl HoldHandle {
    pub fn release(&self) {
        let _ = self.tx.send(true);
    }
}
