//! Observers of committed stage transitions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ListenerError;
use crate::stage::Stage;

/// Observer notified synchronously after every committed transition.
///
/// Listeners run on whichever thread committed the transition. They must not
/// trigger another transition on the owner that is notifying them.
pub trait StateListener: Send + Sync {
    /// Called with the stages before and after the committed transition.
    fn state_changed(&self, from: Stage, to: Stage) -> Result<(), ListenerError>;
}

impl<F> StateListener for F
where
    F: Fn(Stage, Stage) -> Result<(), ListenerError> + Send + Sync,
{
    fn state_changed(&self, from: Stage, to: Stage) -> Result<(), ListenerError> {
        self(from, to)
    }
}

/// Token identifying one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Entries = Arc<Vec<(ListenerId, Arc<dyn StateListener>)>>;

/// Insertion-ordered, copy-on-write listener list.
///
/// Mutations swap in a new list; a notification pass iterates the snapshot it
/// took when it began, so concurrent adds and removes only affect later passes.
pub(crate) struct ListenerRegistry {
    entries: Mutex<Entries>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn add(&self, listener: Arc<dyn StateListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::with_capacity(entries.len() + 1);
        next.extend(entries.iter().cloned());
        next.push((id, listener));
        *entries = Arc::new(next);
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.iter().any(|(entry, _)| *entry == id) {
            return false;
        }
        let next: Vec<_> = entries
            .iter()
            .filter(|(entry, _)| *entry != id)
            .cloned()
            .collect();
        *entries = Arc::new(next);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot().len()
    }

    fn snapshot(&self) -> Entries {
        Arc::clone(&self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Notifies listeners in registration order, stopping at the first failure.
    pub(crate) fn publish(&self, from: Stage, to: Stage) -> Result<(), ListenerError> {
        for (_, listener) in self.snapshot().iter() {
            listener.state_changed(from, to)?;
        }
        Ok(())
    }
}
