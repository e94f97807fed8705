//! Recording listeners sharing one ordered transition log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{ListenerError, Stage, StateListener};

/// Ordered log of `(listener, from, to)` deliveries shared across listeners.
#[derive(Debug, Clone, Default)]
pub struct TransitionLog {
    entries: Arc<Mutex<Vec<(&'static str, Stage, Stage)>>>,
}

impl TransitionLog {
    /// Every delivery, in the order listeners observed them.
    pub fn entries(&self) -> Vec<(&'static str, Stage, Stage)> {
        self.entries.lock().expect("log mutex poisoned").clone()
    }

    /// Deliveries received by `name`.
    pub fn seen_by(&self, name: &str) -> Vec<(Stage, Stage)> {
        self.entries()
            .into_iter()
            .filter(|(listener, _, _)| *listener == name)
            .map(|(_, from, to)| (from, to))
            .collect()
    }

    fn push(&self, name: &'static str, from: Stage, to: Stage) {
        self.entries
            .lock()
            .expect("log mutex poisoned")
            .push((name, from, to));
    }
}

/// Listener that appends to a [`TransitionLog`] and can be told to fail.
#[derive(Debug)]
pub struct RecordingListener {
    name: &'static str,
    log: TransitionLog,
    failing: AtomicBool,
}

impl RecordingListener {
    /// Builds a listener that records under `name`.
    pub fn new(name: &'static str, log: &TransitionLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: log.clone(),
            failing: AtomicBool::new(false),
        })
    }

    /// Builds a listener that records and then rejects every transition.
    pub fn failing(name: &'static str, log: &TransitionLog) -> Arc<Self> {
        let listener = Self::new(name, log);
        listener.failing.store(true, Ordering::SeqCst);
        listener
    }
}

impl StateListener for RecordingListener {
    fn state_changed(&self, from: Stage, to: Stage) -> Result<(), ListenerError> {
        self.log.push(self.name, from, to);
        if self.failing.load(Ordering::SeqCst) {
            return Err(format!("{} rejected {from} -> {to}", self.name).into());
        }
        Ok(())
    }
}
