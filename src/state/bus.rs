use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::oneshot;

/// Identifier handed out for every registered waiter.
pub type WaiterId = u64;

/// Per-room fan-out of "state changed" signals.
///
/// Each waiter owns a single-fire channel. A publish drains the waiter set and fires every
/// channel without awaiting the receivers, so a slow or vanished waiter never delays the
/// mutator or the other waiters.
#[derive(Default)]
pub struct ChangeBus {
    next_id: AtomicU64,
    waiters: Mutex<HashMap<WaiterId, oneshot::Sender<()>>>,
}

impl ChangeBus {
    /// Build an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new waiter. Dropping the returned [`Subscription`] unsubscribes it.
    pub fn subscribe(&self) -> Subscription<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.waiters().insert(id, tx);
        Subscription {
            bus: self,
            id,
            signal: rx,
        }
    }

    /// Remove a waiter. Unknown or already-fired identifiers are ignored.
    pub fn unsubscribe(&self, id: WaiterId) {
        self.waiters().remove(&id);
    }

    /// Wake every currently registered waiter and return how many were still listening.
    pub fn publish(&self) -> usize {
        let drained: Vec<_> = self.waiters().drain().collect();
        drained
            .into_iter()
            .filter(|(_, tx)| !tx.is_closed())
            .map(|(_, tx)| tx.send(()))
            .filter(Result::is_ok)
            .count()
    }

    /// Number of waiters currently registered.
    pub fn waiter_count(&self) -> usize {
        self.waiters().len()
    }

    // The map is only ever touched by non-panicking code, so a poisoned guard still holds a
    // consistent set.
    fn waiters(&self) -> MutexGuard<'_, HashMap<WaiterId, oneshot::Sender<()>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle on a single registered waiter.
pub struct Subscription<'a> {
    bus: &'a ChangeBus,
    id: WaiterId,
    signal: oneshot::Receiver<()>,
}

impl Subscription<'_> {
    /// Identifier of this waiter on its bus.
    pub fn id(&self) -> WaiterId {
        self.id
    }

    /// Resolve once a publish reaches this waiter.
    ///
    /// Returns `false` if the bus went away without publishing.
    pub async fn changed(&mut self) -> bool {
        (&mut self.signal).await.is_ok()
    }
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}
