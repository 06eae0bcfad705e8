use tokio::sync::watch;

use crate::model::Snapshot;

/// Publishes full booking snapshots to every live subscription.
///
/// Backed by a `watch` channel: subscribers always see the latest list, and a slow
/// subscriber may skip intermediate snapshots. There is no diff contract.
pub struct NotifyHub {
    tx: watch::Sender<Option<Snapshot>>,
}

impl NotifyHub {
    pub fn new(initial: Snapshot) -> Self {
        let (tx, _rx) = watch::channel(Some(initial));
        Self { tx }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.tx.subscribe())
    }

    /// Replace the current snapshot. Works with or without subscribers.
    pub fn publish(&self, snapshot: Snapshot) {
        self.tx.send_replace(Some(snapshot));
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Owned handle on a live booking list.
///
/// The first `next()` yields the current list as soon as one exists; later calls
/// wait for the next change. Dropping the handle or calling `close()` tears the
/// subscription down.
pub struct Subscription {
    rx: Option<watch::Receiver<Option<Snapshot>>>,
    primed: bool,
}

impl Subscription {
    /// Wrap a receiver. `None` in the channel means "nothing delivered yet".
    pub fn new(rx: watch::Receiver<Option<Snapshot>>) -> Self {
        Self { rx: Some(rx), primed: false }
    }

    /// Latest snapshot without waiting, if any has arrived.
    pub fn current(&self) -> Option<Snapshot> {
        self.rx.as_ref().and_then(|rx| (*rx.borrow()).clone())
    }

    /// Wait for the next full snapshot. Returns `None` once closed or once the
    /// publisher is gone.
    pub async fn next(&mut self) -> Option<Snapshot> {
        let rx = self.rx.as_mut()?;
        if !self.primed {
            self.primed = true;
            let initial = (*rx.borrow_and_update()).clone();
            if initial.is_some() {
                return initial;
            }
        }
        loop {
            rx.changed().await.ok()?;
            let latest = (*rx.borrow_and_update()).clone();
            if latest.is_some() {
                return latest;
            }
        }
    }

    pub fn close(&mut self) {
        self.rx = None;
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_none()
    }
}
