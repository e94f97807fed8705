//! Error surface shared by the transition engine and the container.

use std::error::Error;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::stage::{Operation, Stage};

/// Failure reported by a managed component's hook.
pub type HookError = Box<dyn Error + Send + Sync + 'static>;

/// Failure reported by a state listener.
pub type ListenerError = Box<dyn Error + Send + Sync + 'static>;

/// How much of an operation took effect before it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing happened; the stage is unchanged and the call may be retried.
    NotAttempted,
    /// The operation ran and failed; the stage may have partially advanced.
    Failed,
    /// The caller stopped waiting; the operation may still be running.
    Unknown,
}

/// Errors returned by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The owner was not in the operation's required stage.
    #[error("cannot {operation}: expected stage {expected}, found {actual}")]
    IllegalTransition {
        /// Operation that was requested.
        operation: Operation,
        /// Stage the operation required.
        expected: Stage,
        /// Stage observed when the check failed.
        actual: Stage,
    },
    /// The component's hook failed mid-transition.
    #[error("{operation} hook failed, owner left in stage {stage}: {source}")]
    Hook {
        /// Operation whose hook failed.
        operation: Operation,
        /// Stage the owner was left in.
        stage: Stage,
        /// Failure reported by the hook.
        #[source]
        source: HookError,
    },
    /// A listener rejected a committed transition.
    #[error("listener failed on transition {from} -> {to}: {source}")]
    Listener {
        /// Stage before the committed transition.
        from: Stage,
        /// Stage after the committed transition.
        to: Stage,
        /// Failure reported by the listener.
        #[source]
        source: ListenerError,
    },
    /// The owner did not reach the target stage before the deadline.
    #[error("timed out after {waited:?} waiting for {operation} to reach stage {target}")]
    Timeout {
        /// Operation being awaited.
        operation: Operation,
        /// Stage the caller was waiting for.
        target: Stage,
        /// Time spent waiting.
        waited: Duration,
    },
    /// The caller was released from waiting before the operation finished.
    #[error("wait for {operation} to reach stage {target} was cancelled")]
    Cancelled {
        /// Operation being awaited.
        operation: Operation,
        /// Stage the caller was waiting for.
        target: Stage,
    },
    /// The background worker could not be created.
    #[error("failed to spawn {operation} worker: {source}")]
    WorkerSpawn {
        /// Operation the worker would have run.
        operation: Operation,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The hook panicked on the background worker.
    #[error("{operation} worker panicked")]
    WorkerPanicked {
        /// Operation the worker was running.
        operation: Operation,
    },
}

impl LifecycleError {
    /// Classifies the error for callers deciding whether to retry, escalate or wait.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        match self {
            Self::IllegalTransition { .. } | Self::WorkerSpawn { .. } => Outcome::NotAttempted,
            Self::Hook { .. } | Self::Listener { .. } | Self::WorkerPanicked { .. } => {
                Outcome::Failed
            }
            Self::Timeout { .. } | Self::Cancelled { .. } => Outcome::Unknown,
        }
    }

    pub(crate) const fn illegal(operation: Operation, expected: Stage, actual: Stage) -> Self {
        Self::IllegalTransition {
            operation,
            expected,
            actual,
        }
    }
}
